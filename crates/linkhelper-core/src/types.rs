//! Data shared between the pipeline, the dispatcher and the transport.

use std::collections::HashSet;

/// Opaque chat identifier of the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatRef(pub i64);

/// Opaque handle to a message previously sent by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef(pub i32);

/// One unit of work: resolve `source_url` and reply to `requester`.
///
/// When `placeholder` is set the reply replaces that message instead of
/// being sent as a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionJob {
    pub requester: ChatRef,
    pub source_url: String,
    pub placeholder: Option<MessageRef>,
}

impl ResolutionJob {
    #[must_use]
    pub fn new(requester: ChatRef, source_url: impl Into<String>) -> Self {
        Self {
            requester,
            source_url: source_url.into(),
            placeholder: None,
        }
    }

    #[must_use]
    pub fn with_placeholder(mut self, placeholder: Option<MessageRef>) -> Self {
        self.placeholder = placeholder;
        self
    }
}

/// Ordered, duplicate-free list of resolved links.
///
/// Order is insertion order of the first occurrence; later duplicates are
/// ignored. Never sorted.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    links: Vec<String>,
    seen: HashSet<String>,
}

impl ResultSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `link` unless it is already present. Returns `true` when added.
    pub fn insert(&mut self, link: String) -> bool {
        if self.seen.contains(&link) {
            return false;
        }
        self.seen.insert(link.clone());
        self.links.push(link);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.links
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.links.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        self.links
    }
}

impl PartialEq for ResultSet {
    fn eq(&self, other: &Self) -> bool {
        self.links == other.links
    }
}

impl Eq for ResultSet {}

impl FromIterator<String> for ResultSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = Self::new();
        for link in iter {
            set.insert(link);
        }
        set
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.links.iter()
    }
}

/// Rich-text mode understood by the chat transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMode {
    Html,
}

/// Text ready to hand to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedReply {
    pub text: String,
    pub mode: Option<FormatMode>,
}

impl FormattedReply {
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: None,
        }
    }

    #[must_use]
    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: Some(FormatMode::Html),
        }
    }
}
