//! Turn transcripts — timestamped per-turn files in an output directory.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::agent::SessionState;
use crate::llm::Role;

/// Writes one `.log` (full exchange) and one `.md` (final reply) per turn.
pub struct TranscriptWriter {
    dir: PathBuf,
}

impl TranscriptWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record the session transcript and the final reply. Returns the path
    /// of the markdown result file.
    pub async fn record(&self, session: &SessionState, reply: &str) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let stem = format!(
            "{}_{}",
            Utc::now().format("%Y-%m-%d_%H-%M-%S%.6f"),
            session.id
        );

        let mut log = String::new();
        for turn in &session.turns {
            let role = match turn.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            log.push_str(&format!("[{role}]\n{}\n\n", turn.content));
            for call in &turn.tool_calls {
                log.push_str(&format!("[tool call] {} {}\n\n", call.name, call.arguments));
            }
        }
        let log_path = self.dir.join(format!("{stem}.log"));
        tokio::fs::write(&log_path, log).await?;

        let md_path = self.dir.join(format!("{stem}.md"));
        tokio::fs::write(&md_path, format!("{reply}\n")).await?;

        Ok(md_path)
    }
}
