//! The destination document model.
//!
//! The remote body is a markdown page: a preamble (title line and whatever
//! else precedes the list), then day headings and entry renderings. Parsing
//! keeps entry blocks byte-for-byte so a parse/render roundtrip of a body we
//! produced is stable.

use chrono::{DateTime, Utc};

use crate::feed::ArticleId;

/// One entry as it appears in the document: its identity plus the verbatim
/// markdown block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    pub article_id: ArticleId,
    pub block: String,
}

/// A block of the document body below the preamble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentBlock {
    /// A `## <text>` heading.
    Heading(String),
    /// An entry rendering (starts with `- [`).
    Entry(DocumentEntry),
    /// Any other run of non-blank lines; preserved untouched.
    Text(String),
}

/// Parsed destination document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestDocument {
    pub preamble: String,
    pub blocks: Vec<DocumentBlock>,
}

impl DigestDocument {
    /// Parse a remote body into preamble + blocks.
    pub fn parse(body: &str) -> Self {
        let mut preamble: Vec<&str> = Vec::new();
        let mut blocks: Vec<DocumentBlock> = Vec::new();
        let mut entry_lines: Vec<&str> = Vec::new();
        let mut text_lines: Vec<&str> = Vec::new();
        let mut in_preamble = true;

        fn flush_entry(lines: &mut Vec<&str>, blocks: &mut Vec<DocumentBlock>) {
            if lines.is_empty() {
                return;
            }
            let block = lines.join("\n");
            let link = extract_link(lines[0]).unwrap_or(lines[0]);
            blocks.push(DocumentBlock::Entry(DocumentEntry {
                article_id: ArticleId::from_link(link),
                block,
            }));
            lines.clear();
        }

        fn flush_text(lines: &mut Vec<&str>, blocks: &mut Vec<DocumentBlock>) {
            if lines.is_empty() {
                return;
            }
            blocks.push(DocumentBlock::Text(lines.join("\n")));
            lines.clear();
        }

        for line in body.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("## ") {
                flush_entry(&mut entry_lines, &mut blocks);
                flush_text(&mut text_lines, &mut blocks);
                in_preamble = false;
                blocks.push(DocumentBlock::Heading(
                    trimmed[3..].trim_end().to_string(),
                ));
            } else if trimmed.starts_with("- [") {
                flush_entry(&mut entry_lines, &mut blocks);
                flush_text(&mut text_lines, &mut blocks);
                in_preamble = false;
                entry_lines.push(line);
            } else if !entry_lines.is_empty() {
                if line.trim().is_empty() {
                    flush_entry(&mut entry_lines, &mut blocks);
                } else {
                    entry_lines.push(line);
                }
            } else if in_preamble {
                preamble.push(line);
            } else if line.trim().is_empty() {
                flush_text(&mut text_lines, &mut blocks);
            } else {
                text_lines.push(line);
            }
        }
        flush_entry(&mut entry_lines, &mut blocks);
        flush_text(&mut text_lines, &mut blocks);

        Self {
            preamble: preamble.join("\n").trim_end().to_string(),
            blocks,
        }
    }

    /// Render the document back to a markdown body.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.preamble.is_empty() {
            out.push_str(&self.preamble);
            out.push('\n');
        }
        for block in &self.blocks {
            out.push('\n');
            match block {
                DocumentBlock::Heading(heading) => {
                    out.push_str("## ");
                    out.push_str(heading);
                    out.push_str("  \n");
                }
                DocumentBlock::Entry(entry) => {
                    out.push_str(&entry.block);
                    out.push('\n');
                }
                DocumentBlock::Text(text) => {
                    out.push_str(text);
                    out.push('\n');
                }
            }
        }
        out
    }

    /// Identities of every entry in the document, in order.
    pub fn entry_ids(&self) -> impl Iterator<Item = &ArticleId> {
        self.blocks.iter().filter_map(|block| match block {
            DocumentBlock::Entry(entry) => Some(&entry.article_id),
            _ => None,
        })
    }

    /// The last heading in the document, if any.
    pub fn last_heading(&self) -> Option<&str> {
        self.blocks.iter().rev().find_map(|block| match block {
            DocumentBlock::Heading(heading) => Some(heading.as_str()),
            _ => None,
        })
    }
}

/// Heading used for entries curated on `date`.
pub fn day_heading(date: DateTime<Utc>) -> String {
    date.format("%d %b %Y").to_string()
}

fn extract_link(first_line: &str) -> Option<&str> {
    let start = first_line.find("](")? + 2;
    let end = first_line[start..].find(')')? + start;
    Some(&first_line[start..end])
}
