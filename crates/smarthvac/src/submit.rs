//! Job submission.
//!
//! A submission turns free text plus the cached simulation configuration
//! into a `queued` job document. Ids are local-time timestamps with
//! one-second granularity; the store's create-if-absent write detects
//! collisions and the submitter moves on to `_2`, `_3`, … so concurrent
//! submissions never overwrite each other.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::{StoreError, SubmitError};
use crate::job::{suffixed_id, timestamp_job_id, NewJob};
use crate::settings::LocalSettings;
use crate::store::{Document, DocumentStore};

/// Upper bound on ids tried for one submission.
pub const MAX_ID_ATTEMPTS: u32 = 100;

type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedJob {
    pub id: String,
    pub input_text: String,
}

pub struct JobSubmitter {
    store: Arc<dyn DocumentStore>,
    settings: LocalSettings,
    collection: String,
    request_timeout: Duration,
    refresh: broadcast::Sender<()>,
    clock: Clock,
}

impl JobSubmitter {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        settings: LocalSettings,
        collection: impl Into<String>,
        request_timeout: Duration,
        refresh: broadcast::Sender<()>,
    ) -> Self {
        Self {
            store,
            settings,
            collection: collection.into(),
            request_timeout,
            refresh,
            clock: Arc::new(Local::now),
        }
    }

    /// Replaces the wall clock used for ids.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Local> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Validates `input`, writes a new job and asks observers to refresh.
    ///
    /// Blank input fails with [`SubmitError::EmptyInput`] before any store
    /// call. Store failures are returned as-is; nothing is retried except
    /// the id suffix on collisions.
    #[tracing::instrument(skip(self, input), fields(collection = %self.collection))]
    pub async fn submit(&self, input: &str) -> Result<SubmittedJob, SubmitError> {
        if input.trim().is_empty() {
            return Err(SubmitError::EmptyInput);
        }

        let job = NewJob::new(input, self.settings.simulation_config());
        let base = timestamp_job_id(&(self.clock)());
        let id = self.create_unique(&base, job.to_document()).await?;

        log::info!("Submitted job {} to {}", id, self.store.name());

        // No subscribers is fine
        let _ = self.refresh.send(());

        Ok(SubmittedJob {
            id,
            input_text: input.to_string(),
        })
    }

    async fn create_unique(&self, base: &str, doc: Document) -> Result<String, SubmitError> {
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = suffixed_id(base, attempt);
            let create = self.store.create(&self.collection, &id, doc.clone());

            match tokio::time::timeout(self.request_timeout, create).await {
                Err(_) => {
                    log::warn!(
                        "Creating job {} timed out after {:?}",
                        id,
                        self.request_timeout
                    );
                    return Err(SubmitError::Timeout(self.request_timeout));
                }
                Ok(Ok(())) => return Ok(id),
                Ok(Err(StoreError::AlreadyExists { .. })) => {
                    log::debug!("Job id {} is taken, trying the next suffix", id);
                }
                Ok(Err(e)) => {
                    log::error!("Failed to create job {}: {}", id, e);
                    return Err(e.into());
                }
            }
        }

        Err(SubmitError::IdsExhausted {
            base: base.to_string(),
            attempts: MAX_ID_ATTEMPTS,
        })
    }
}

// ─── Form state ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Neutral,
    Success,
    Error,
}

/// Inline status shown under the submission form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub message: String,
    pub tone: Tone,
}

impl StatusLine {
    pub fn submitted(id: &str) -> Self {
        Self {
            message: format!("Job submitted! ID: {} (Waiting for processor)", id),
            tone: Tone::Success,
        }
    }

    pub fn failed(error: &SubmitError) -> Self {
        let message = if error.is_validation() {
            error.to_string()
        } else {
            format!("Error submitting job: {}", error)
        };
        Self {
            message,
            tone: Tone::Error,
        }
    }
}

/// Text input plus its status line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionForm {
    pub text: String,
    pub status: Option<StatusLine>,
}

impl SubmissionForm {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: None,
        }
    }

    /// Submits the current text. Clears it on success; keeps it on failure.
    pub async fn submit(&mut self, submitter: &JobSubmitter) -> Option<SubmittedJob> {
        match submitter.submit(&self.text).await {
            Ok(job) => {
                self.text.clear();
                self.status = Some(StatusLine::submitted(&job.id));
                Some(job)
            }
            Err(e) => {
                self.status = Some(StatusLine::failed(&e));
                None
            }
        }
    }
}
