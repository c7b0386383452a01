//! Document ingestion: upload, attach to a store, and poll the attachment
//! until the remote service reports a terminal state.

use crate::store::{
    AttachmentState, AttachmentStatus, Attributes, ChunkingConfig, Document, FileId, StoreId,
    VectorStoreApi,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Bounded exponential growth of the poll interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    factor: f64,
    max_interval: Duration,
}

impl Backoff {
    /// Factors below 1.0 (or not finite) are treated as 1.0
    pub fn new(factor: f64, max_interval: Duration) -> Self {
        let factor = if factor.is_finite() && factor >= 1.0 {
            factor
        } else {
            1.0
        };
        Self {
            factor,
            max_interval,
        }
    }

    fn next(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.factor)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

/// How long to wait between attachment polls, and for how long in total
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
    pub backoff: Option<Backoff>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(200),
            timeout: Duration::from_secs(30),
            backoff: None,
        }
    }
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            backoff: None,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = Some(backoff);
        self
    }

    fn next_delay(&self, current: Duration) -> Duration {
        match &self.backoff {
            Some(backoff) => backoff.next(current),
            None => self.interval,
        }
    }
}

/// Terminal result of waiting on an attachment
#[derive(Debug, Clone, PartialEq)]
pub enum AttachOutcome {
    /// Processing finished; `polls` counts the state re-fetches it took
    Completed { polls: u32 },
    Failed { message: String },
    /// Still processing when the timeout elapsed; the final state is unknown
    TimedOut { elapsed: Duration },
}

impl AttachOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, AttachOutcome::Completed { .. })
    }
}

impl std::fmt::Display for AttachOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttachOutcome::Completed { polls } => write!(f, "completed after {} poll(s)", polls),
            AttachOutcome::Failed { message } => write!(f, "failed: {}", message),
            AttachOutcome::TimedOut { elapsed } => {
                write!(f, "timed out after {:.1}s, final state unknown", elapsed.as_secs_f64())
            },
        }
    }
}

/// Outcome of ingesting one document
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub filename: String,
    pub file_id: FileId,
    pub outcome: AttachOutcome,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to upload {filename}")]
    Upload {
        filename: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to attach {filename} ({file_id})")]
    Attach {
        filename: String,
        file_id: FileId,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to check attachment state of {filename} ({file_id})")]
    Poll {
        filename: String,
        file_id: FileId,
        #[source]
        source: anyhow::Error,
    },
}

impl IngestError {
    /// Id of the uploaded file, if the upload itself succeeded
    pub fn file_id(&self) -> Option<&FileId> {
        match self {
            IngestError::Upload { .. } => None,
            IngestError::Attach { file_id, .. } | IngestError::Poll { file_id, .. } => {
                Some(file_id)
            },
        }
    }
}

/// Uploads documents and attaches them to a store
pub struct IngestionPipeline {
    api: Arc<dyn VectorStoreApi>,
    policy: PollPolicy,
}

impl IngestionPipeline {
    pub fn new(api: Arc<dyn VectorStoreApi>, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Upload one document, attach it, and wait for a terminal state
    pub async fn ingest(
        &self,
        store: &StoreId,
        document: &Document,
        chunking: &ChunkingConfig,
        attributes: &Attributes,
    ) -> Result<IngestReport, IngestError> {
        let filename = document.filename().to_string();

        let file_id = self
            .api
            .upload_document(document)
            .await
            .map_err(|source| IngestError::Upload {
                filename: filename.clone(),
                source,
            })?;
        tracing::debug!(file = %file_id, %filename, bytes = document.len(), "Uploaded document");

        let initial = self
            .api
            .attach(store, &file_id, chunking, attributes)
            .await
            .map_err(|source| IngestError::Attach {
                filename: filename.clone(),
                file_id: file_id.clone(),
                source,
            })?;
        tracing::info!(store = %store, file = %file_id, status = %initial.status, "Attached document");

        let outcome = self
            .wait_for_attachment(store, &file_id, initial)
            .await
            .map_err(|source| IngestError::Poll {
                filename: filename.clone(),
                file_id: file_id.clone(),
                source,
            })?;

        match &outcome {
            AttachOutcome::Completed { .. } => {
                tracing::info!(%filename, "{}", outcome)
            },
            AttachOutcome::Failed { .. } | AttachOutcome::TimedOut { .. } => {
                tracing::warn!(%filename, "{}", outcome)
            },
        }

        Ok(IngestReport {
            filename,
            file_id,
            outcome,
        })
    }

    /// Ingest documents one after another. A failing document never stops the batch.
    pub async fn ingest_all(
        &self,
        store: &StoreId,
        documents: &[Document],
        chunking: &ChunkingConfig,
        attributes: &Attributes,
    ) -> Vec<(String, Result<IngestReport, IngestError>)> {
        let mut results = Vec::with_capacity(documents.len());
        for document in documents {
            let result = self.ingest(store, document, chunking, attributes).await;
            if let Err(e) = &result {
                match std::error::Error::source(e) {
                    Some(cause) => tracing::warn!("{}: {}", e, cause),
                    None => tracing::warn!("{}", e),
                }
            }
            results.push((document.filename().to_string(), result));
        }
        results
    }

    /// Poll until the attachment leaves `pending`/`in_progress` or the timeout passes.
    ///
    /// Each iteration sleeps first and checks the elapsed time before the
    /// re-fetch, so a stuck attachment is abandoned within one interval of the
    /// timeout.
    pub async fn wait_for_attachment(
        &self,
        store: &StoreId,
        file: &FileId,
        initial: AttachmentState,
    ) -> anyhow::Result<AttachOutcome> {
        let started = Instant::now();
        let mut state = initial;
        let mut polls = 0u32;
        let mut delay = self.policy.interval;

        loop {
            match state.status {
                AttachmentStatus::Completed => return Ok(AttachOutcome::Completed { polls }),
                AttachmentStatus::Failed => {
                    let message = state
                        .last_error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "unknown error".to_string());
                    return Ok(AttachOutcome::Failed { message });
                },
                AttachmentStatus::Cancelled => {
                    let message = state
                        .last_error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "attachment cancelled".to_string());
                    return Ok(AttachOutcome::Failed { message });
                },
                AttachmentStatus::Pending | AttachmentStatus::InProgress => {},
            }

            tokio::time::sleep(delay).await;

            let elapsed = started.elapsed();
            if elapsed > self.policy.timeout {
                return Ok(AttachOutcome::TimedOut { elapsed });
            }

            state = self.api.get_attachment_state(store, file).await?;
            polls += 1;
            tracing::debug!(file = %file, poll = polls, status = %state.status, "Polled attachment");

            delay = self.policy.next_delay(delay);
        }
    }
}
