//! Submission parsing for the turn loop.

/// Input kinds a session turn can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// A natural-language request for the orchestrator.
    UserInput { content: String },
    /// Show the command summary.
    Help,
    /// Close the session.
    Quit,
}

/// Parses raw input into a `Submission`.
pub struct SubmissionParser;

impl SubmissionParser {
    pub fn parse(content: &str) -> Submission {
        let trimmed = content.trim();
        match trimmed.to_lowercase().as_str() {
            "/quit" | "/exit" | "/q" => Submission::Quit,
            "/help" | "/?" => Submission::Help,
            _ => Submission::UserInput {
                content: content.to_string(),
            },
        }
    }
}
