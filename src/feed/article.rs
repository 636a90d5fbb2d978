//! Article records and their identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Stable article identity: the normalized link URL.
///
/// Two records with the same normalized link are the same article regardless
/// of surface text differences.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    pub fn from_link(link: &str) -> Self {
        Self(normalize_link(link))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a link URL so surface variants of the same article compare
/// equal: lowercased scheme and host, no fragment, no trailing slash.
pub fn normalize_link(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            let mut normalized = url.to_string();
            while normalized.ends_with('/') {
                normalized.pop();
            }
            normalized
        }
        Err(_) => trimmed.trim_end_matches('/').to_string(),
    }
}

/// A normalized article from a syndication source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: ArticleId,
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    /// Label of the feed the article came from.
    pub source: String,
}

impl ArticleRecord {
    /// Display date used in digest entries.
    pub fn display_date(&self) -> String {
        self.published
            .map(|d| d.format("%d %b %Y").to_string())
            .unwrap_or_default()
    }
}
