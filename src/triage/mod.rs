//! Relevance triage — LLM-backed accept/reject against a preference profile.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TriageError;
use crate::feed::{ArticleId, ArticleRecord};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

/// Opaque, versioned reference to the user's relevance model.
///
/// Owned by configuration; read-only here.
#[derive(Debug, Clone)]
pub struct PreferenceProfile {
    pub version: String,
    pub interests: String,
}

/// Accept/reject verdict for one article. Derived, never persisted beyond
/// the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageDecision {
    pub article_id: ArticleId,
    pub relevant: bool,
    pub confidence: Option<f32>,
}

/// LLM-backed relevance classifier.
///
/// Decisions are not stable across sessions — profile versions or model
/// nondeterminism may flip them. Within one session the caller-owned cache
/// keyed by article identity prevents re-classifying a revisited article.
pub struct RelevanceClassifier {
    llm: Arc<dyn LlmProvider>,
    profile: PreferenceProfile,
}

impl RelevanceClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>, profile: PreferenceProfile) -> Self {
        Self { llm, profile }
    }

    /// Classify a batch of articles, consulting and filling `cache`.
    ///
    /// Cached articles are never sent back to the model. Returns decisions
    /// in input order.
    pub async fn classify_batch(
        &self,
        articles: &[ArticleRecord],
        cache: &mut HashMap<ArticleId, TriageDecision>,
    ) -> Result<Vec<TriageDecision>, TriageError> {
        let mut pending: Vec<&ArticleRecord> = Vec::new();
        for article in articles {
            if !cache.contains_key(&article.id) && !pending.iter().any(|p| p.id == article.id) {
                pending.push(article);
            }
        }

        if !pending.is_empty() {
            tracing::debug!(
                profile = %self.profile.version,
                fresh = pending.len(),
                cached = articles.len() - pending.len(),
                "Classifying batch"
            );
            let verdicts = self.ask_model(&pending).await?;
            for (article, relevant) in pending.iter().zip(verdicts) {
                cache.insert(
                    article.id.clone(),
                    TriageDecision {
                        article_id: article.id.clone(),
                        relevant,
                        confidence: None,
                    },
                );
            }
        }

        let mut decisions = Vec::with_capacity(articles.len());
        for article in articles {
            let decision = cache
                .get(&article.id)
                .cloned()
                .ok_or_else(|| TriageError::Unavailable {
                    scope: article.id.to_string(),
                    reason: "decision missing after classification".to_string(),
                })?;
            decisions.push(decision);
        }
        Ok(decisions)
    }

    async fn ask_model(&self, pending: &[&ArticleRecord]) -> Result<Vec<bool>, TriageError> {
        let titles = pending
            .iter()
            .enumerate()
            .map(|(i, a)| format!("{}. {}", i + 1, a.title))
            .collect::<Vec<_>>()
            .join("\n");

        let system = format!(
            "You judge whether papers are interesting to a reader whose standing \
             interests are: {}. (Preference profile {}.) Answer with one line per \
             paper, in order, formatted exactly as `<number>: True` or \
             `<number>: False`. No other text.",
            self.profile.interests, self.profile.version,
        );
        let user = format!(
            "This is a list of papers, determine whether each paper is interesting:\n{titles}"
        );

        let request =
            CompletionRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)]);

        let response =
            self.llm
                .complete(request)
                .await
                .map_err(|e| TriageError::Unavailable {
                    scope: format!("batch of {}", pending.len()),
                    reason: e.to_string(),
                })?;

        Ok(parse_verdicts(&response.content, pending.len()))
    }
}

/// Parse per-line `<n>: True|False` verdicts.
///
/// Articles whose line is missing or malformed are treated as not relevant;
/// the mismatch is logged, never silent.
fn parse_verdicts(text: &str, expected: usize) -> Vec<bool> {
    let mut verdicts = vec![false; expected];
    let mut parsed = 0usize;

    for line in text.lines() {
        let line = line.trim().trim_start_matches(['-', '*']).trim();
        if line.is_empty() {
            continue;
        }
        let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
        let Ok(index) = digits.parse::<usize>() else {
            continue;
        };
        if index == 0 || index > expected {
            continue;
        }
        let rest = line[digits.len()..]
            .trim_start_matches([':', '.', ')'])
            .trim()
            .to_lowercase();
        if rest.starts_with("true") {
            verdicts[index - 1] = true;
            parsed += 1;
        } else if rest.starts_with("false") {
            verdicts[index - 1] = false;
            parsed += 1;
        }
    }

    if parsed < expected {
        tracing::warn!(
            expected,
            parsed,
            "Classifier returned fewer verdicts than articles; missing ones treated as not relevant"
        );
    }

    verdicts
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::{CompletionResponse, ToolCompletionRequest, ToolCompletionResponse};

    struct ScriptedProvider {
        replies: Mutex<VecDeque<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let content = self.replies.lock().unwrap().pop_front().ok_or(
                LlmError::RequestFailed {
                    provider: "scripted".to_string(),
                    reason: "no scripted reply".to_string(),
                },
            )?;
            Ok(CompletionResponse {
                content,
                input_tokens: 0,
                output_tokens: 0,
            })
        }

        async fn complete_with_tools(
            &self,
            _request: ToolCompletionRequest,
        ) -> Result<ToolCompletionResponse, LlmError> {
            unreachable!("triage only uses plain completions")
        }
    }

    fn article(link: &str, title: &str) -> ArticleRecord {
        ArticleRecord {
            id: ArticleId::from_link(link),
            title: title.to_string(),
            authors: vec![],
            abstract_text: String::new(),
            link: link.to_string(),
            published: None,
            source: "test".to_string(),
        }
    }

    fn classifier(provider: Arc<ScriptedProvider>) -> RelevanceClassifier {
        RelevanceClassifier::new(
            provider,
            PreferenceProfile {
                version: "v1".to_string(),
                interests: "graph neural networks".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_batch_verdicts_in_order() {
        let provider = Arc::new(ScriptedProvider::new(&["1: True\n2: False"]));
        let classifier = classifier(Arc::clone(&provider));
        let articles = vec![
            article("https://example.com/a", "GNNs for molecules"),
            article("https://example.com/b", "Tax law survey"),
        ];
        let mut cache = HashMap::new();

        let decisions = classifier
            .classify_batch(&articles, &mut cache)
            .await
            .unwrap();

        assert!(decisions[0].relevant);
        assert!(!decisions[1].relevant);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cache_prevents_second_external_call() {
        let provider = Arc::new(ScriptedProvider::new(&["1: True"]));
        let classifier = classifier(Arc::clone(&provider));
        let articles = vec![article("https://example.com/a", "GNNs for molecules")];
        let mut cache = HashMap::new();

        let first = classifier
            .classify_batch(&articles, &mut cache)
            .await
            .unwrap();
        let second = classifier
            .classify_batch(&articles, &mut cache)
            .await
            .unwrap();

        assert_eq!(provider.call_count(), 1);
        assert_eq!(first[0].relevant, second[0].relevant);
    }

    #[tokio::test]
    async fn test_partial_cache_only_sends_fresh_articles() {
        let provider = Arc::new(ScriptedProvider::new(&["1: True", "1: False"]));
        let classifier = classifier(Arc::clone(&provider));
        let a = article("https://example.com/a", "GNNs for molecules");
        let b = article("https://example.com/b", "Tax law survey");
        let mut cache = HashMap::new();

        classifier
            .classify_batch(std::slice::from_ref(&a), &mut cache)
            .await
            .unwrap();
        let decisions = classifier
            .classify_batch(&[a, b], &mut cache)
            .await
            .unwrap();

        // Second call classified only `b`; `a` came from the cache.
        assert_eq!(provider.call_count(), 2);
        assert!(decisions[0].relevant);
        assert!(!decisions[1].relevant);
    }

    #[tokio::test]
    async fn test_provider_failure_maps_to_unavailable() {
        let provider = Arc::new(ScriptedProvider::new(&[]));
        let classifier = classifier(provider);
        let articles = vec![article("https://example.com/a", "GNNs")];
        let mut cache = HashMap::new();

        let err = classifier
            .classify_batch(&articles, &mut cache)
            .await
            .unwrap_err();
        assert!(matches!(err, TriageError::Unavailable { .. }));
    }

    #[test]
    fn test_parse_verdicts_formats() {
        assert_eq!(parse_verdicts("1: True\n2: False", 2), vec![true, false]);
        assert_eq!(parse_verdicts("1. true\n2. TRUE", 2), vec![true, true]);
        assert_eq!(parse_verdicts("- 1) False\n- 2) True", 2), vec![false, true]);
    }

    #[test]
    fn test_parse_verdicts_missing_lines_default_to_rejected() {
        assert_eq!(parse_verdicts("2: True", 3), vec![false, true, false]);
        assert_eq!(parse_verdicts("nonsense", 1), vec![false]);
    }

    #[test]
    fn test_parse_verdicts_ignores_out_of_range_indexes() {
        assert_eq!(parse_verdicts("0: True\n5: True\n1: True", 2), vec![true, false]);
    }
}
