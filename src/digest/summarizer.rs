//! Summarizer — short natural-language digests of accepted articles.

use std::sync::Arc;

use crate::digest::entry::DigestEntry;
use crate::error::SummaryError;
use crate::feed::ArticleRecord;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

const SUMMARY_PROMPT: &str = "Summarize the following paper from its title and \
abstract. Make sure to highlight any datasets, methods, and results that are \
mentioned. Keep your summary to fewer than 60 words and at most four \
sentences.";

/// Produces the digest text and canonical entry for an accepted article.
pub struct Summarizer {
    llm: Arc<dyn LlmProvider>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Summarize one article. Callers are expected to have triaged it as
    /// relevant first; summarizing a rejected article is wasteful but not
    /// unsafe.
    pub async fn summarize(&self, article: &ArticleRecord) -> Result<DigestEntry, SummaryError> {
        let user = format!(
            "The paper title is {}\nThe abstract is {}",
            article.title, article.abstract_text
        );
        let request = CompletionRequest::new(vec![
            ChatMessage::system(SUMMARY_PROMPT),
            ChatMessage::user(user),
        ]);

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|e| SummaryError::Unavailable {
                article: article.title.clone(),
                reason: e.to_string(),
            })?;

        // Entries are rendered as single markdown list items; internal
        // newlines would break the block structure.
        let summary = response
            .content
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        if summary.is_empty() {
            return Err(SummaryError::Unavailable {
                article: article.title.clone(),
                reason: "model returned an empty summary".to_string(),
            });
        }

        Ok(DigestEntry {
            article_id: article.id.clone(),
            title: article.title.clone(),
            link: article.link.clone(),
            authors: article.authors.clone(),
            summary,
            source: article.source.clone(),
            date: article.display_date(),
        })
    }
}
