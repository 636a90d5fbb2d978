//! The merge — deduplicated, order-preserving, idempotent.

use std::collections::HashSet;

use crate::digest::document::{DigestDocument, DocumentBlock, DocumentEntry};
use crate::digest::entry::DigestEntry;
use crate::feed::ArticleId;

/// Merge new candidates into a document.
///
/// - Existing blocks are preserved in place, untouched.
/// - Candidates whose identity already exists anywhere in the document are
///   dropped: first write wins, a later summary never replaces an earlier
///   one.
/// - The remaining candidates are appended in production order under
///   `day_heading`, reusing that heading when it is already the last one in
///   the document.
///
/// Pure function of `(document, candidates, day_heading)`; running it twice
/// with the same candidates yields the same document.
pub fn merge(
    document: &DigestDocument,
    candidates: &[DigestEntry],
    day_heading: &str,
) -> DigestDocument {
    let existing: HashSet<&ArticleId> = document.entry_ids().collect();

    let mut fresh: Vec<DocumentEntry> = Vec::new();
    let mut fresh_ids: HashSet<ArticleId> = HashSet::new();
    for candidate in candidates {
        if existing.contains(&candidate.article_id) || fresh_ids.contains(&candidate.article_id) {
            tracing::debug!(article = %candidate.article_id, "Dropping duplicate candidate");
            continue;
        }
        fresh_ids.insert(candidate.article_id.clone());
        fresh.push(DocumentEntry {
            article_id: candidate.article_id.clone(),
            block: candidate.render(),
        });
    }

    let mut merged = document.clone();
    if fresh.is_empty() {
        return merged;
    }

    if merged.last_heading() != Some(day_heading) {
        merged
            .blocks
            .push(DocumentBlock::Heading(day_heading.to_string()));
    }
    merged
        .blocks
        .extend(fresh.into_iter().map(DocumentBlock::Entry));
    merged
}
