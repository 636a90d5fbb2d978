//! Session state — the one piece of true statefulness in the loop.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::digest::DigestEntry;
use crate::feed::{ArticleId, ArticleRecord};
use crate::llm::ChatMessage;
use crate::triage::TriageDecision;

/// Per-session state: transcript, the addressable article set, the triage
/// cache, and entries queued for publishing.
///
/// Created at session start, mutated by every turn, discarded at process
/// exit. Results produced in turn N stay addressable in turn N+1; nothing
/// here is ever shared between sessions.
pub struct SessionState {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Full turn transcript, replayed to the model each turn.
    pub turns: Vec<ChatMessage>,
    /// Triage decisions made this session, keyed by article identity.
    pub decisions: HashMap<ArticleId, TriageDecision>,
    /// Entries summarized but not yet published.
    pub pending: Vec<DigestEntry>,
    last_seen: Vec<ArticleRecord>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            turns: Vec::new(),
            decisions: HashMap::new(),
            pending: Vec::new(),
            last_seen: Vec::new(),
        }
    }

    /// Replace the addressable article set. Follow-up turns refer to these
    /// by 1-based number ("that one", "the second paper").
    pub fn remember_articles(&mut self, articles: Vec<ArticleRecord>) {
        self.last_seen = articles;
    }

    pub fn last_seen(&self) -> &[ArticleRecord] {
        &self.last_seen
    }

    /// Resolve a 1-based article number from the last listing.
    pub fn article_by_number(&self, number: usize) -> Option<&ArticleRecord> {
        number.checked_sub(1).and_then(|i| self.last_seen.get(i))
    }

    /// Queue entries for publishing, skipping identities already queued.
    /// Returns how many were added.
    pub fn queue_entries(&mut self, entries: Vec<DigestEntry>) -> usize {
        let mut added = 0;
        for entry in entries {
            if self
                .pending
                .iter()
                .any(|p| p.article_id == entry.article_id)
            {
                continue;
            }
            self.pending.push(entry);
            added += 1;
        }
        added
    }

    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
