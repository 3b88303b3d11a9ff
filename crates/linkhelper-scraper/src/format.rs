//! Chat reply rendering.
//!
//! The discount and title on each line are decoration only; they are drawn
//! at random and have nothing to do with real prices.

use std::fmt::Write as _;

use linkhelper_core::{FormattedReply, ResultSet};
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::pipeline::Outcome;

pub const NOT_FOUND_MESSAGE: &str =
    "Sorry, I couldn't find any links. Please check the URL and try again.";

pub const DISCOVERY_FAILED_MESSAGE: &str =
    "Sorry, I couldn't read that page. The link may be invalid or private.";

pub const JOB_FAILED_MESSAGE: &str =
    "Something went wrong while processing your link. Please try again later.";

pub const DEAL_TITLES: [&str; 14] = [
    "Loot Deal",
    "Price Alert",
    "Super Sale",
    "Budget Deal",
    "Mega Discount",
    "Flash Offer",
    "Hot Pick",
    "Special Savings",
    "Crazy Deal",
    "Limited Time",
    "Best Price",
    "Exclusive Offer",
    "Deal of the Day",
    "Clearance",
];

pub const DISCOUNT_RANGE: std::ops::RangeInclusive<u8> = 10..=70;

/// Renders a pipeline outcome with thread-local randomness.
#[must_use]
pub fn format_outcome(outcome: &Outcome) -> FormattedReply {
    match outcome {
        Outcome::Found(links) => format_links(links),
        Outcome::DiscoveryFailed { .. } => FormattedReply::plain(DISCOVERY_FAILED_MESSAGE),
    }
}

#[must_use]
pub fn format_links(links: &ResultSet) -> FormattedReply {
    format_links_with(links, &mut rand::rng())
}

/// Renders `links` one per line, 1-based, in set order.
pub fn format_links_with<R: Rng + ?Sized>(links: &ResultSet, rng: &mut R) -> FormattedReply {
    if links.is_empty() {
        return FormattedReply::plain(NOT_FOUND_MESSAGE);
    }

    let mut text = format!("<b>Done! ✨</b>\nFound {} link(s):\n", links.len());
    for (i, link) in links.iter().enumerate() {
        let discount = rng.random_range(DISCOUNT_RANGE);
        let title = DEAL_TITLES.choose(rng).copied().unwrap_or("Deal");
        let _ = write!(
            text,
            "\n{}. ({discount}% OFF) {} — {title}",
            i + 1,
            escape_html(link)
        );
    }
    FormattedReply::html(text)
}

/// Escapes the three characters Telegram's HTML mode treats as markup.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
