//! Upload executor
//!
//! Runs one sequential pass over the queue: for each item not yet uploaded,
//! mark it `Uploading`, `put` its bytes under a fresh key, then record the
//! public URL or the failure. Put *k+1* is never issued before put *k* has
//! settled, and a failure never stops the pass.
//!
//! The queue lock is only held while reading or mutating items, never across
//! an `.await`, so callers may remove items while a put is in flight. A
//! settlement for an item that is gone by then is dropped.

use super::item::{ItemEvent, ItemId, ItemState};
use super::key;
use super::queue::{ApplyOutcome, UploadQueue};
use super::UploadError;
use crate::config::UploaderConfig;
use crate::metrics;
use crate::store::{ObjectStore, PutOptions};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counts for a single pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassTally {
    /// Items for which a put was issued
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items removed while their put was in flight
    pub abandoned: usize,
}

/// Work captured for one item before the lock is dropped
struct Job {
    id: ItemId,
    name: String,
    key: String,
    body: Bytes,
    content_type: Option<String>,
}

/// Clears the in-flight flag when a pass ends, however it ends
struct PassGuard<'a>(&'a AtomicBool);

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, UploadError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| UploadError::PassInFlight)?;
        Ok(Self(flag))
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sequential uploader over an [`UploadQueue`]
pub struct UploadExecutor {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    folder_prefix: String,
    cache_control_seconds: u64,
    in_flight: AtomicBool,
}

impl UploadExecutor {
    pub fn new(store: Arc<dyn ObjectStore>, config: &UploaderConfig) -> Self {
        Self {
            store,
            bucket: config.bucket.clone(),
            folder_prefix: config.folder_prefix.clone(),
            cache_control_seconds: config.cache_control_seconds,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Whether a pass is currently running
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one pass over every item that was pending when the pass started.
    ///
    /// Returns [`UploadError::PassInFlight`] if another pass is still running.
    #[tracing::instrument(
        name = "upload.pass",
        skip(self, queue),
        fields(
            store.bucket = %self.bucket,
            pass.attempted = tracing::field::Empty,
            pass.succeeded = tracing::field::Empty
        )
    )]
    pub async fn run_pass(&self, queue: &Mutex<UploadQueue>) -> Result<PassTally, UploadError> {
        let _guard = PassGuard::acquire(&self.in_flight)?;
        let mut tally = PassTally::default();

        let pending = queue.lock().pending_ids();
        tracing::debug!(pending = pending.len(), "Upload pass started");

        for id in pending {
            let Some(job) = self.start(queue, id) else {
                continue;
            };
            tally.attempted += 1;

            let event = self.settle(&job).await;
            let succeeded = matches!(event, ItemEvent::Succeeded { .. });

            let outcome = queue.lock().apply(job.id, event);
            match outcome {
                ApplyOutcome::Applied if succeeded => tally.succeeded += 1,
                ApplyOutcome::Applied => tally.failed += 1,
                ApplyOutcome::Missing => {
                    tally.abandoned += 1;
                    tracing::debug!(
                        item = %job.id,
                        key = %job.key,
                        "Item removed while in flight; dropping settlement"
                    );
                }
                ApplyOutcome::Rejected(e) => {
                    tracing::warn!(item = %job.id, error = %e, "Settlement rejected");
                }
            }
        }

        let span = tracing::Span::current();
        span.record("pass.attempted", tally.attempted);
        span.record("pass.succeeded", tally.succeeded);
        metrics::record_pass();

        Ok(tally)
    }

    /// Mark `id` as uploading and capture what the put needs
    fn start(&self, queue: &Mutex<UploadQueue>, id: ItemId) -> Option<Job> {
        let mut queue = queue.lock();
        let item = queue.get(id)?;
        if item.state() == ItemState::Uploaded {
            return None;
        }

        let job = Job {
            id,
            name: item.source_name().to_string(),
            key: key::generate_key(&self.folder_prefix, item.source_name()),
            body: item.file().bytes.clone(),
            content_type: item.file().content_type.clone(),
        };

        match queue.apply(id, ItemEvent::Started { key: job.key.clone() }) {
            ApplyOutcome::Applied => Some(job),
            other => {
                tracing::warn!(item = %id, outcome = ?other, "Could not start item");
                None
            }
        }
    }

    /// Issue the put and resolve the URL, turning the result into an event
    async fn settle(&self, job: &Job) -> ItemEvent {
        let mut options = PutOptions::new(self.cache_control_seconds);
        options.content_type = job.content_type.clone();

        let bytes = job.body.len() as u64;
        let start_time = Instant::now();
        let result = self
            .store
            .put(&self.bucket, &job.key, job.body.clone(), options)
            .await;
        let duration = start_time.elapsed();
        metrics::record_upload_duration(&self.bucket, duration.as_secs_f64());

        match result {
            Ok(()) => {
                let url = self.store.public_url(&self.bucket, &job.key);
                metrics::record_upload_success(&self.bucket, bytes);
                tracing::info!(
                    item = %job.id,
                    name = %job.name,
                    key = %job.key,
                    bytes = bytes,
                    duration_ms = duration.as_millis(),
                    "Upload completed"
                );
                ItemEvent::Succeeded { url }
            }
            Err(e) => {
                metrics::record_upload_failure(&self.bucket);
                tracing::error!(
                    item = %job.id,
                    name = %job.name,
                    key = %job.key,
                    error = %e,
                    duration_ms = duration.as_millis(),
                    "Upload failed"
                );
                ItemEvent::Failed {
                    message: format!("Failed to upload: {}", e),
                }
            }
        }
    }
}
