//! Publisher — read-verify-write against the destination document.
//!
//! The remote is re-read immediately before merging to minimize the lost-
//! update window; a version-token mismatch at write time triggers exactly
//! one re-read-merge-write retry before the conflict is surfaced.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::digest::{DigestDocument, DigestEntry, day_heading, merge};
use crate::error::PublishError;
use crate::publish::store::DocumentStore;

/// Outcome of a publish, with the content fingerprint for audit.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    /// Version token of the resulting remote state (e.g. commit SHA).
    pub fingerprint: String,
    /// Candidates actually appended.
    pub appended: usize,
    /// Candidates dropped as already present.
    pub skipped: usize,
    /// Pointer to the published artifact, if one exists.
    pub location: Option<String>,
    /// Human-readable confirmation.
    pub message: String,
}

pub struct Publisher {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl Publisher {
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Merge `candidates` into the destination under today's heading.
    pub async fn publish(&self, candidates: &[DigestEntry]) -> Result<PublishReceipt, PublishError> {
        self.publish_under(candidates, &day_heading(Utc::now())).await
    }

    /// Merge `candidates` into the destination under an explicit heading.
    pub async fn publish_under(
        &self,
        candidates: &[DigestEntry],
        heading: &str,
    ) -> Result<PublishReceipt, PublishError> {
        match self.attempt(candidates, heading).await {
            Err(PublishError::Conflict { destination }) => {
                tracing::warn!(
                    destination = %destination,
                    "Publish conflict, retrying against latest remote state"
                );
                self.attempt(candidates, heading).await
            }
            other => other,
        }
    }

    async fn attempt(
        &self,
        candidates: &[DigestEntry],
        heading: &str,
    ) -> Result<PublishReceipt, PublishError> {
        let remote = self.bounded(self.store.read()).await?;
        let document = DigestDocument::parse(&remote.body);

        let before = document.entry_ids().count();
        let merged = merge(&document, candidates, heading);
        let appended = merged.entry_ids().count() - before;
        let skipped = candidates.len() - appended;

        if appended == 0 {
            // Nothing fresh; skip the write so a re-run leaves no trace.
            return Ok(PublishReceipt {
                fingerprint: remote.version,
                appended,
                skipped,
                location: self.store.page_url(),
                message: format!(
                    "Reading list already up to date; all {skipped} entries were published before."
                ),
            });
        }

        let commit_message = format!("Curator added papers from {heading}");
        let fingerprint = self
            .bounded(
                self.store
                    .write(&merged.render(), &remote.version, &commit_message),
            )
            .await?;

        let location = self.store.page_url();
        let mut message = format!(
            "Reading list updated! {appended} added, {skipped} already present."
        );
        if let Some(ref url) = location {
            message.push_str(&format!("\nTo catch up on your reading, visit {url}"));
        }
        message.push_str(&format!("\nCommit: {fingerprint}"));

        Ok(PublishReceipt {
            fingerprint,
            appended,
            skipped,
            location,
            message,
        })
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, PublishError>>,
    ) -> Result<T, PublishError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| PublishError::Unavailable {
                destination: self.store.destination(),
                reason: format!("timed out after {:?}", self.timeout),
            })?
    }
}
