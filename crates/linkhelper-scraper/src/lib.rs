pub mod catalog;
pub mod error;
pub mod format;
pub mod page;
pub mod pattern;
pub mod pipeline;
pub mod redirect;
pub mod source;

pub use catalog::CatalogClient;
pub use error::ScraperError;
pub use format::{format_links, format_outcome};
pub use page::BrowserExtractor;
pub use pipeline::{Discovery, Outcome, Pipeline, Strategy};
pub use redirect::RedirectResolver;
pub use source::{CatalogSource, LinkResolver, PageLinkSource};
