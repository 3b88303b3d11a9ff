//! Command handlers. Pipeline failures are reported on stderr and do not
//! change the exit status; only setup errors in `main` do.

use linkhelper_scraper::{format_outcome, Discovery, Outcome, Pipeline};

pub(crate) async fn discover(pipeline: &Pipeline, url: &str) {
    match render_discovery(&pipeline.discover(url).await) {
        Ok(out) => print!("{out}"),
        Err(reason) => eprintln!("discovery failed: {reason}"),
    }
}

pub(crate) async fn resolve(pipeline: &Pipeline, url: &str, raw: bool) {
    match render_outcome(&pipeline.run(url).await, raw) {
        Ok(out) => println!("{out}"),
        Err(reason) => eprintln!("discovery failed: {reason}"),
    }
}

/// One candidate per line, or the failure reason.
pub(crate) fn render_discovery(discovery: &Discovery) -> Result<String, String> {
    match discovery {
        Discovery::Candidates { strategy, links } => {
            tracing::info!(%strategy, candidates = links.len(), "discovery complete");
            Ok(links.iter().map(|l| format!("{l}\n")).collect())
        }
        Discovery::Failed(e) => Err(e.to_string()),
    }
}

/// With `raw`, bare links one per line; otherwise the chat reply text.
pub(crate) fn render_outcome(outcome: &Outcome, raw: bool) -> Result<String, String> {
    match (outcome, raw) {
        (Outcome::Found(links), true) => Ok(links
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")),
        (Outcome::DiscoveryFailed { reason }, true) => Err(reason.clone()),
        (outcome, false) => Ok(format_outcome(outcome).text),
    }
}
