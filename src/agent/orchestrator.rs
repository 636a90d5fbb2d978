//! Orchestrator — the tool-dispatch loop and session state machine.
//!
//! Each turn runs `awaiting-request → selecting-capability →
//! executing-capability → awaiting-request`: the model is asked for either a
//! text answer or a capability invocation from the fixed set; invocations
//! execute sequentially and their results feed back into the conversation
//! until the model answers in text or the per-turn iteration bound is hit.
//! `/quit` moves the loop to the terminal `session-closed` state.
//!
//! Per-article failures never abort a turn; they are collected and reported
//! in the final reply. A whole-session abort does not exist: external
//! hiccups become assistant-visible text and the next turn proceeds.

use std::sync::Arc;

use crate::agent::capability::Capability;
use crate::agent::session::SessionState;
use crate::agent::submission::{Submission, SubmissionParser};
use crate::config::Limits;
use crate::digest::Summarizer;
use crate::error::{Error, Result};
use crate::feed::{ArticleRecord, FeedReader};
use crate::llm::{ChatMessage, LlmProvider, ToolCompletionRequest};
use crate::publish::{EmailSink, Publisher};
use crate::triage::RelevanceClassifier;

const HELP_TEXT: &str = "Ask in plain language: read feeds, triage recent \
articles, summarize the interesting ones, update the reading list, or send \
the digest by email. /help shows this text, /quit closes the session.";

/// Dispatch-loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingRequest,
    SelectingCapability,
    ExecutingCapability,
    SessionClosed,
}

/// Core dependencies for the orchestrator.
///
/// Bundles the capability implementations to reduce argument count.
pub struct OrchestratorDeps {
    pub llm: Arc<dyn LlmProvider>,
    pub reader: FeedReader,
    pub classifier: RelevanceClassifier,
    pub summarizer: Summarizer,
    pub publisher: Publisher,
    pub email: Option<EmailSink>,
}

/// Outcome of one turn.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub reply: String,
    /// Failure tally for the turn, each naming the affected article or step.
    pub failures: Vec<String>,
    /// True when this turn closed the session.
    pub closed: bool,
}

/// The tool-dispatch loop over the fixed capability set.
pub struct Orchestrator {
    deps: OrchestratorDeps,
    sources: Vec<String>,
    limits: Limits,
    system_prompt: String,
    state: LoopState,
}

impl Orchestrator {
    pub fn new(
        deps: OrchestratorDeps,
        sources: Vec<String>,
        limits: Limits,
        system_prompt: String,
    ) -> Self {
        Self {
            deps,
            sources,
            limits,
            system_prompt,
            state: LoopState::AwaitingRequest,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Process one user turn. Turns are strictly sequential: the caller
    /// holds `&mut self` and `&mut SessionState`, so no two capability
    /// invocations for the same session can ever run concurrently.
    pub async fn handle_turn(
        &mut self,
        session: &mut SessionState,
        input: &str,
    ) -> Result<TurnReport> {
        if self.state == LoopState::SessionClosed {
            return Err(Error::SessionClosed);
        }

        match SubmissionParser::parse(input) {
            Submission::Quit => {
                self.state = LoopState::SessionClosed;
                Ok(TurnReport {
                    reply: "Session closed.".to_string(),
                    failures: Vec::new(),
                    closed: true,
                })
            }
            Submission::Help => Ok(TurnReport {
                reply: HELP_TEXT.to_string(),
                failures: Vec::new(),
                closed: false,
            }),
            Submission::UserInput { content } => self.process_user_input(session, &content).await,
        }
    }

    async fn process_user_input(
        &mut self,
        session: &mut SessionState,
        content: &str,
    ) -> Result<TurnReport> {
        session.turns.push(ChatMessage::user(content));
        let mut failures: Vec<String> = Vec::new();

        for iteration in 0..self.limits.max_tool_iterations {
            self.state = LoopState::SelectingCapability;

            let mut messages = vec![ChatMessage::system(&self.system_prompt)];
            messages.extend(session.turns.iter().cloned());
            let request = ToolCompletionRequest::new(messages, Capability::definitions());

            let response = match self.deps.llm.complete_with_tools(request).await {
                Ok(response) => response,
                Err(e) => {
                    // The model being down must not end the session.
                    failures.push(format!("model: {e}"));
                    let reply = format!("The language model is unavailable: {e}");
                    session.turns.push(ChatMessage::assistant(reply.clone()));
                    self.state = LoopState::AwaitingRequest;
                    return Ok(TurnReport {
                        reply,
                        failures,
                        closed: false,
                    });
                }
            };

            if response.tool_calls.is_empty() {
                // Answer-from-memory path: no capability needed this round.
                let reply = response.content.unwrap_or_default();
                session.turns.push(ChatMessage::assistant(reply.clone()));
                self.state = LoopState::AwaitingRequest;
                return Ok(TurnReport {
                    reply: compose_reply(reply, &failures),
                    failures,
                    closed: false,
                });
            }

            tracing::debug!(
                session = %session.id,
                iteration,
                calls = response.tool_calls.len(),
                "Dispatching capabilities"
            );
            session.turns.push(ChatMessage::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                self.state = LoopState::ExecutingCapability;
                let result = match Capability::from_tool_call(call) {
                    Ok(capability) => self.execute(session, capability, &mut failures).await,
                    Err(reason) => {
                        failures.push(reason.clone());
                        format!("ERROR: {reason}")
                    }
                };
                session.turns.push(ChatMessage::tool(call.id.clone(), result));
            }
        }

        self.state = LoopState::AwaitingRequest;
        let reply =
            "I stopped after reaching the per-turn capability limit; everything done so far is \
             recorded above."
                .to_string();
        session.turns.push(ChatMessage::assistant(reply.clone()));
        Ok(TurnReport {
            reply: compose_reply(reply, &failures),
            failures,
            closed: false,
        })
    }

    async fn execute(
        &self,
        session: &mut SessionState,
        capability: Capability,
        failures: &mut Vec<String>,
    ) -> String {
        match capability {
            Capability::ListSources => {
                if self.sources.is_empty() {
                    "No feeds configured for this user.".to_string()
                } else {
                    self.sources
                        .iter()
                        .enumerate()
                        .map(|(i, url)| format!("{}. {url}", i + 1))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }

            Capability::ReadFeed { url, max_articles } => {
                match self.deps.reader.fetch(&url, max_articles).await {
                    Ok(articles) => {
                        let listing = render_listing(&articles);
                        let report = format!(
                            "{} articles from {url}:\n{listing}",
                            articles.len()
                        );
                        session.remember_articles(articles);
                        report
                    }
                    Err(e) => {
                        failures.push(format!("read {url}: {e}"));
                        format!("ERROR: {e}")
                    }
                }
            }

            Capability::Triage { url } => self.execute_triage(session, url, failures).await,

            Capability::Summarize { articles } => {
                self.execute_summarize(session, articles, failures).await
            }

            Capability::Publish => {
                if session.pending.is_empty() {
                    return "Nothing is queued for publishing; summarize some articles first."
                        .to_string();
                }
                match self.deps.publisher.publish(&session.pending).await {
                    Ok(receipt) => {
                        session.clear_pending();
                        receipt.message
                    }
                    Err(e) => {
                        failures.push(format!("publish: {e}"));
                        format!("ERROR: {e}")
                    }
                }
            }

            Capability::Email { subject } => {
                let Some(ref sink) = self.deps.email else {
                    return "Email is not configured for this user.".to_string();
                };
                if session.pending.is_empty() {
                    return "Nothing is queued to email; summarize some articles first."
                        .to_string();
                }
                let subject = subject.unwrap_or_else(EmailSink::digest_subject);
                let body = session
                    .pending
                    .iter()
                    .map(|entry| entry.render())
                    .collect::<Vec<_>>()
                    .join("\n");
                match sink.send(&subject, &body).await {
                    Ok(()) => format!("Email sent to {}.", sink.recipient()),
                    Err(e) => {
                        failures.push(format!("email: {e}"));
                        format!("ERROR: {e}")
                    }
                }
            }
        }
    }

    async fn execute_triage(
        &self,
        session: &mut SessionState,
        url: Option<String>,
        failures: &mut Vec<String>,
    ) -> String {
        let feeds = match url {
            Some(url) => vec![url],
            None => self.sources.clone(),
        };
        if feeds.is_empty() {
            return "No feeds configured; provide a feed URL.".to_string();
        }

        let mut collected: Vec<ArticleRecord> = Vec::new();
        let mut report: Vec<String> = Vec::new();
        for feed in &feeds {
            match self
                .deps
                .reader
                .fetch_recent(feed, self.limits.recent_days, Some(self.limits.max_articles))
                .await
            {
                Ok(articles) => collected.extend(articles),
                Err(e) => {
                    failures.push(format!("read {feed}: {e}"));
                    report.push(format!("ERROR reading {feed}: {e}"));
                }
            }
        }

        // Batch size is an explicit bound, and truncation is never silent.
        if collected.len() > self.limits.max_articles {
            let dropped = collected.len() - self.limits.max_articles;
            collected.truncate(self.limits.max_articles);
            tracing::warn!(
                dropped,
                limit = self.limits.max_articles,
                "Triage batch truncated"
            );
            report.push(format!(
                "Note: triage batch limited to {} articles; {dropped} more were not considered.",
                self.limits.max_articles
            ));
        }

        if collected.is_empty() {
            report.push("No recent articles found.".to_string());
            return report.join("\n");
        }

        match self
            .deps
            .classifier
            .classify_batch(&collected, &mut session.decisions)
            .await
        {
            Ok(decisions) => {
                let accepted: Vec<ArticleRecord> = collected
                    .iter()
                    .zip(&decisions)
                    .filter(|(_, d)| d.relevant)
                    .map(|(a, _)| a.clone())
                    .collect();
                report.push(format!(
                    "Triaged {} recent articles; {} look interesting:",
                    collected.len(),
                    accepted.len()
                ));
                report.push(render_listing(&accepted));
                session.remember_articles(accepted);
                report.join("\n")
            }
            Err(e) => {
                failures.push(format!("triage: {e}"));
                report.push(format!("ERROR: {e}"));
                report.join("\n")
            }
        }
    }

    async fn execute_summarize(
        &self,
        session: &mut SessionState,
        numbers: Vec<usize>,
        failures: &mut Vec<String>,
    ) -> String {
        if session.last_seen().is_empty() {
            return "No articles have been listed yet; read or triage a feed first.".to_string();
        }

        let targets: Vec<ArticleRecord> = if numbers.is_empty() {
            session.last_seen().to_vec()
        } else {
            let mut targets = Vec::new();
            for number in numbers {
                match session.article_by_number(number) {
                    Some(article) => targets.push(article.clone()),
                    None => failures.push(format!(
                        "summarize: article {number} is not in the last listing"
                    )),
                }
            }
            targets
        };

        let mut entries = Vec::new();
        let mut lines = Vec::new();
        for article in &targets {
            match self.deps.summarizer.summarize(article).await {
                Ok(entry) => {
                    lines.push(format!("{}: {}", entry.title, entry.summary));
                    entries.push(entry);
                }
                Err(e) => {
                    // One bad article must not sink the rest of the batch.
                    failures.push(format!("summarize {}: {e}", article.title));
                    lines.push(format!("ERROR summarizing {}: {e}", article.title));
                }
            }
        }

        let summarized = entries.len();
        let queued = session.queue_entries(entries);
        lines.push(format!(
            "Summarized {summarized} of {} articles; {queued} newly queued for publishing.",
            targets.len()
        ));
        lines.join("\n")
    }
}

fn render_listing(articles: &[ArticleRecord]) -> String {
    if articles.is_empty() {
        return "(none)".to_string();
    }
    articles
        .iter()
        .enumerate()
        .map(|(i, a)| {
            format!(
                "{}. {} ({}, {}) <{}>",
                i + 1,
                a.title,
                a.source,
                a.display_date(),
                a.link
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn compose_reply(reply: String, failures: &[String]) -> String {
    if failures.is_empty() {
        return reply;
    }
    let issues = failures
        .iter()
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{reply}\n\nIssues this turn:\n{issues}")
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::LlmError;
    use crate::feed::ArticleId;
    use crate::llm::{
        CompletionRequest, CompletionResponse, ToolCall, ToolCompletionResponse,
    };
    use crate::publish::{DocumentStore, MemoryStore};
    use crate::triage::PreferenceProfile;

    /// Scripted provider: plain completions and tool completions each pop
    /// from their own queue.
    struct ScriptedProvider {
        completions: Mutex<VecDeque<String>>,
        tool_turns: Mutex<VecDeque<ToolCompletionResponse>>,
    }

    impl ScriptedProvider {
        fn new() -> Self {
            Self {
                completions: Mutex::new(VecDeque::new()),
                tool_turns: Mutex::new(VecDeque::new()),
            }
        }

        fn push_completion(&self, content: &str) {
            self.completions
                .lock()
                .unwrap()
                .push_back(content.to_string());
        }

        fn push_text_turn(&self, content: &str) {
            self.tool_turns
                .lock()
                .unwrap()
                .push_back(ToolCompletionResponse {
                    content: Some(content.to_string()),
                    tool_calls: vec![],
                    input_tokens: 0,
                    output_tokens: 0,
                });
        }

        fn push_tool_turn(&self, name: &str, arguments: serde_json::Value) {
            self.tool_turns
                .lock()
                .unwrap()
                .push_back(ToolCompletionResponse {
                    content: None,
                    tool_calls: vec![ToolCall {
                        id: format!("call_{name}"),
                        name: name.to_string(),
                        arguments,
                    }],
                    input_tokens: 0,
                    output_tokens: 0,
                });
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
        ) -> std::result::Result<CompletionResponse, LlmError> {
            let content = self.completions.lock().unwrap().pop_front().ok_or(
                LlmError::RequestFailed {
                    provider: "scripted".to_string(),
                    reason: "no scripted completion".to_string(),
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
        ) -> std::result::Result<ToolCompletionResponse, LlmError> {
            self.tool_turns.lock().unwrap().pop_front().ok_or(
                LlmError::RequestFailed {
                    provider: "scripted".to_string(),
                    reason: "no scripted tool turn".to_string(),
                },
            )
        }
    }

    fn article(link: &str, title: &str) -> ArticleRecord {
        ArticleRecord {
            id: ArticleId::from_link(link),
            title: title.to_string(),
            authors: vec!["Ada Author".to_string()],
            abstract_text: "An abstract.".to_string(),
            link: link.to_string(),
            published: None,
            source: "arXiv".to_string(),
        }
    }

    fn orchestrator(
        provider: Arc<ScriptedProvider>,
        store: Arc<MemoryStore>,
    ) -> Orchestrator {
        let timeout = Duration::from_secs(5);
        let llm: Arc<dyn LlmProvider> = provider;
        let deps = OrchestratorDeps {
            llm: Arc::clone(&llm),
            reader: FeedReader::new(timeout),
            classifier: RelevanceClassifier::new(
                Arc::clone(&llm),
                PreferenceProfile {
                    version: "v1".to_string(),
                    interests: "machine learning".to_string(),
                },
            ),
            summarizer: Summarizer::new(Arc::clone(&llm)),
            publisher: Publisher::new(store as Arc<dyn DocumentStore>, timeout),
            email: None,
        };
        Orchestrator::new(
            deps,
            vec![],
            Limits::default(),
            "test prompt".to_string(),
        )
    }

    #[tokio::test]
    async fn test_text_only_turn_answers_from_memory() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_text_turn("Nothing new today.");
        let store = Arc::new(MemoryStore::new(""));
        let mut orchestrator = orchestrator(Arc::clone(&provider), store);
        let mut session = SessionState::new();

        let report = orchestrator
            .handle_turn(&mut session, "anything interesting?")
            .await
            .unwrap();

        assert_eq!(report.reply, "Nothing new today.");
        assert!(report.failures.is_empty());
        assert_eq!(orchestrator.state(), LoopState::AwaitingRequest);
        // user turn + assistant turn recorded
        assert_eq!(session.turns.len(), 2);
    }

    #[tokio::test]
    async fn test_summarize_then_publish_chain() {
        let provider = Arc::new(ScriptedProvider::new());
        // Turn script: summarize #1 -> publish -> final text
        provider.push_tool_turn("summarize_articles", serde_json::json!({"articles": [1]}));
        provider.push_tool_turn("update_reading_list", serde_json::json!({}));
        provider.push_text_turn("Added it to your reading list.");
        // Summarizer's plain completion
        provider.push_completion("Shows deep sets still work.");

        let store = Arc::new(MemoryStore::new("# Reading List\n"));
        let mut orchestrator = orchestrator(Arc::clone(&provider), Arc::clone(&store));
        let mut session = SessionState::new();
        session.remember_articles(vec![article(
            "https://arxiv.org/abs/2401.00001",
            "Deep Sets, Revisited",
        )]);

        let report = orchestrator
            .handle_turn(&mut session, "summarize and publish the first one")
            .await
            .unwrap();

        assert_eq!(report.reply, "Added it to your reading list.");
        assert!(report.failures.is_empty());
        assert!(session.pending.is_empty());
        let body = store.body();
        assert!(body.contains("Deep Sets, Revisited"));
        assert!(body.contains("Shows deep sets still work."));
    }

    #[tokio::test]
    async fn test_results_stay_addressable_in_next_turn() {
        let provider = Arc::new(ScriptedProvider::new());
        // Turn 1: plain text. Turn 2: summarize #1 from the earlier listing.
        provider.push_text_turn("Listed above.");
        provider.push_tool_turn("summarize_articles", serde_json::json!({"articles": [1]}));
        provider.push_text_turn("Queued it.");
        provider.push_completion("A crisp summary.");

        let store = Arc::new(MemoryStore::new(""));
        let mut orchestrator = orchestrator(Arc::clone(&provider), store);
        let mut session = SessionState::new();
        session.remember_articles(vec![article("https://example.com/a", "First Paper")]);

        orchestrator
            .handle_turn(&mut session, "show me the list")
            .await
            .unwrap();
        let report = orchestrator
            .handle_turn(&mut session, "summarize that one")
            .await
            .unwrap();

        assert_eq!(report.reply, "Queued it.");
        assert_eq!(session.pending.len(), 1);
        assert_eq!(session.pending[0].title, "First Paper");
    }

    #[tokio::test]
    async fn test_unknown_tool_reported_not_fatal() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_tool_turn("launch_rocket", serde_json::json!({}));
        provider.push_text_turn("Sorry, I cannot do that.");

        let store = Arc::new(MemoryStore::new(""));
        let mut orchestrator = orchestrator(Arc::clone(&provider), store);
        let mut session = SessionState::new();

        let report = orchestrator
            .handle_turn(&mut session, "launch a rocket")
            .await
            .unwrap();

        assert!(report.reply.contains("Sorry, I cannot do that."));
        assert!(report.reply.contains("Issues this turn:"));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(orchestrator.state(), LoopState::AwaitingRequest);
    }

    #[tokio::test]
    async fn test_model_outage_is_survivable() {
        let provider = Arc::new(ScriptedProvider::new());
        // No scripted turns: the first call errors. Then script a recovery.
        let store = Arc::new(MemoryStore::new(""));
        let mut orchestrator = orchestrator(Arc::clone(&provider), store);
        let mut session = SessionState::new();

        let report = orchestrator
            .handle_turn(&mut session, "hello")
            .await
            .unwrap();
        assert!(report.reply.contains("unavailable"));
        assert_eq!(report.failures.len(), 1);

        provider.push_text_turn("Back online.");
        let report = orchestrator
            .handle_turn(&mut session, "hello again")
            .await
            .unwrap();
        assert_eq!(report.reply, "Back online.");
    }

    #[tokio::test]
    async fn test_quit_closes_session_terminally() {
        let provider = Arc::new(ScriptedProvider::new());
        let store = Arc::new(MemoryStore::new(""));
        let mut orchestrator = orchestrator(Arc::clone(&provider), store);
        let mut session = SessionState::new();

        let report = orchestrator.handle_turn(&mut session, "/quit").await.unwrap();
        assert!(report.closed);
        assert_eq!(orchestrator.state(), LoopState::SessionClosed);

        let err = orchestrator
            .handle_turn(&mut session, "still there?")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionClosed));
    }

    #[tokio::test]
    async fn test_iteration_bound_stops_runaway_turns() {
        let provider = Arc::new(ScriptedProvider::new());
        let limit = Limits::default().max_tool_iterations;
        for _ in 0..limit + 2 {
            provider.push_tool_turn("get_user_sources", serde_json::json!({}));
        }

        let store = Arc::new(MemoryStore::new(""));
        let mut orchestrator = orchestrator(Arc::clone(&provider), store);
        let mut session = SessionState::new();

        let report = orchestrator
            .handle_turn(&mut session, "loop forever")
            .await
            .unwrap();
        assert!(report.reply.contains("capability limit"));
        assert_eq!(orchestrator.state(), LoopState::AwaitingRequest);
    }

    #[tokio::test]
    async fn test_publish_with_empty_queue_is_a_noop() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_tool_turn("update_reading_list", serde_json::json!({}));
        provider.push_text_turn("Nothing to publish yet.");

        let store = Arc::new(MemoryStore::new("untouched"));
        let mut orchestrator = orchestrator(Arc::clone(&provider), Arc::clone(&store));
        let mut session = SessionState::new();

        orchestrator
            .handle_turn(&mut session, "publish")
            .await
            .unwrap();
        assert_eq!(store.body(), "untouched");
        assert_eq!(store.version(), 0);
    }
}
