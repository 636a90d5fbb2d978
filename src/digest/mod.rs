//! Digest production — summaries, canonical entries, and the merge.

pub mod document;
pub mod entry;
pub mod merge;
pub mod summarizer;

pub use document::{DigestDocument, DocumentBlock, DocumentEntry, day_heading};
pub use entry::DigestEntry;
pub use merge::merge;
pub use summarizer::Summarizer;
