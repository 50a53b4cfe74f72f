//! Data models shared by the relay pipeline.
//!
//! - [`Article`]: one homepage entry (title + absolute link)
//! - [`SentSet`]: links that have already been relayed
//! - [`Extraction`]: outcome of pulling the text out of an article page
//! - [`CycleReport`]: per-cycle counters for logging

use crate::error::FetchError;
use std::collections::HashSet;

/// Placeholder produced when an article page has no recognizable content block.
pub const CONTENT_NOT_FOUND: &str = "Текст статьи не найден";

/// A news item listed on the homepage.
///
/// The `link` is the identity key used for deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    /// Visible anchor text with whitespace collapsed.
    pub title: String,
    /// Absolute URL of the article page.
    pub link: String,
}

/// Links already delivered to the channel.
pub type SentSet = HashSet<String>;

/// Result of extracting article text.
#[derive(Debug)]
pub enum Extraction {
    /// Paragraph text joined by blank lines. May be empty when the container
    /// exists but holds no non-empty paragraphs.
    Text(String),
    /// Neither content selector matched.
    NotFound,
    /// The article page could not be retrieved.
    Failed(FetchError),
}

impl Extraction {
    /// The textual form of the outcome: the content, the not-found
    /// placeholder, or an empty string on failure.
    pub fn text(&self) -> &str {
        match self {
            Extraction::Text(text) => text,
            Extraction::NotFound => CONTENT_NOT_FOUND,
            Extraction::Failed(_) => "",
        }
    }

    /// Content worth relaying, if any.
    pub fn deliverable(&self) -> Option<&str> {
        match self {
            Extraction::Text(text) if !text.trim().is_empty() => Some(text),
            _ => None,
        }
    }
}

/// Counters gathered over one poll cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub listed: usize,
    pub new: usize,
    pub relayed: usize,
    pub skipped: usize,
    pub chunks_sent: usize,
    pub chunks_failed: usize,
}
