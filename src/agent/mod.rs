//! The orchestration core — capability dispatch, sessions, the turn loop.

pub mod capability;
pub mod orchestrator;
pub mod session;
pub mod submission;

pub use capability::Capability;
pub use orchestrator::{LoopState, Orchestrator, OrchestratorDeps, TurnReport};
pub use session::SessionState;
pub use submission::{Submission, SubmissionParser};
