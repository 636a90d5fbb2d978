//! Feed curator — orchestration core for automated preprint curation.

pub mod agent;
pub mod config;
pub mod digest;
pub mod error;
pub mod feed;
pub mod llm;
pub mod publish;
pub mod transcript;
pub mod triage;
