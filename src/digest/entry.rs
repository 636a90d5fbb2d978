//! Curated reading-list entries.

use serde::{Deserialize, Serialize};

use crate::feed::ArticleId;

/// A curated reading-list entry.
///
/// The canonical markdown rendering is a pure function of this record, so
/// merge-time comparison of entries is value-wise and deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestEntry {
    pub article_id: ArticleId,
    pub title: String,
    pub link: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub source: String,
    pub date: String,
}

impl DigestEntry {
    /// Canonical markdown list-item rendering.
    pub fn render(&self) -> String {
        format!(
            "- [{}]({})  \n{}  \n*{}*  \n{}  \n&ensp;{}  ",
            self.title,
            self.link,
            self.authors.join(", "),
            self.source,
            self.date,
            self.summary
        )
    }
}
