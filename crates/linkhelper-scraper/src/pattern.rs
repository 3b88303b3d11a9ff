//! URL shape recognition: share links, catalog post identifiers, and
//! turning scraped hrefs into absolute candidate URLs.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Path segment that marks a redirectable share link.
pub const SHARE_MARKER: &str = "/share/";

/// CSS selector matching anchors that carry a share link.
pub const SHARE_LINK_SELECTOR: &str = "a[href*='/share/']";

static POST_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/post/(\d+)(?:[/?#]|$)").expect("valid post id regex"));
static HTTP_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("valid url regex"));

/// Returns `true` when `url` is itself a share link and needs no discovery.
#[must_use]
pub fn is_share_link(url: &str) -> bool {
    Url::parse(url).map_or_else(
        |_| url.contains(SHARE_MARKER),
        |u| u.path().contains(SHARE_MARKER),
    )
}

/// Extracts the catalog post identifier from a storefront URL such as
/// `https://www.wishlink.com/someone/post/1234567`.
#[must_use]
pub fn catalog_id(url: &str) -> Option<String> {
    let path = Url::parse(url).map_or_else(|_| url.to_owned(), |u| u.path().to_owned());
    POST_ID_RE
        .captures(&path)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Finds the first http(s) URL in free-form chat text.
///
/// Trailing punctuation that commonly follows a pasted link is stripped.
#[must_use]
pub fn first_url(text: &str) -> Option<String> {
    let found = HTTP_URL_RE.find(text)?.as_str();
    let trimmed = found.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']']);
    Url::parse(trimmed).ok().map(|_| trimmed.to_owned())
}

/// Resolves raw `href` values against `page_url` and keeps only distinct
/// absolute http(s) URLs, in first-seen order.
///
/// Hrefs that cannot be joined (or resolve to `javascript:`, `mailto:` and
/// similar) are dropped.
#[must_use]
pub fn absolutize_hrefs<I, S>(page_url: &Url, hrefs: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for href in hrefs {
        let href = href.as_ref().trim();
        if href.is_empty() {
            continue;
        }
        let Ok(joined) = page_url.join(href) else {
            tracing::debug!(href, "skipping href that does not join onto page URL");
            continue;
        };
        if !matches!(joined.scheme(), "http" | "https") {
            continue;
        }
        let joined = joined.to_string();
        if seen.insert(joined.clone()) {
            out.push(joined);
        }
    }
    out
}
