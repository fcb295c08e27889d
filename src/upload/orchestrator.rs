//! Batch uploader
//!
//! [`BatchUploader`] is the caller-facing facade. All operations take `&self`,
//! so an `Arc<BatchUploader>` can be shared between the task running a pass
//! and the code handling removals.
//!
//! # Example
//!
//! ```no_run
//! use campus_uploadr::config::UploaderConfig;
//! use campus_uploadr::store::MemoryObjectStore;
//! use campus_uploadr::upload::{BatchUploader, SelectedFile, TracingListener};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = UploaderConfig::new("gallery-images")
//!     .with_folder_prefix("gallery")
//!     .with_allow_multiple(true)
//!     .with_max_file_count(10);
//! let uploader = BatchUploader::new(
//!     config,
//!     Arc::new(MemoryObjectStore::default()),
//!     Arc::new(TracingListener),
//! )?;
//!
//! uploader.select(vec![SelectedFile::new("prize-giving.jpg", vec![0u8; 1024])])?;
//! let report = uploader.upload().await?;
//! println!("{} -> {:?}", report.summary(), report.successful_urls);
//! # Ok(())
//! # }
//! ```

use super::executor::UploadExecutor;
use super::item::{ItemId, ItemView};
use super::preview::{PreviewHandle, PreviewManager};
use super::queue::UploadQueue;
use super::report::PassReport;
use super::validator::{SelectionValidator, ValidationError};
use super::{SelectedFile, UploadError};
use crate::config::UploaderConfig;
use crate::metrics;
use crate::store::ObjectStore;
use parking_lot::Mutex;
use std::sync::Arc;

/// Callbacks fired towards the caller
pub trait UploadListener: Send + Sync {
    /// A batch (`TooManyFiles`) or a single file (`FileTooLarge`) was turned away
    fn on_batch_rejected(&self, reason: &ValidationError);

    /// A pass finished; the report lists every durable URL so far
    fn on_pass_settled(&self, report: &PassReport);
}

/// Listener that turns callbacks into log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl UploadListener for TracingListener {
    fn on_batch_rejected(&self, reason: &ValidationError) {
        tracing::warn!(reason = reason.kind(), "{}", reason);
    }

    fn on_pass_settled(&self, report: &PassReport) {
        if report.all_succeeded() {
            tracing::info!(urls = report.successful_urls.len(), "{}", report.summary());
        } else {
            tracing::warn!(
                failed = report.failed,
                abandoned = report.abandoned,
                "{}",
                report.summary()
            );
        }
    }
}

/// Result of a selection that passed the count gate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionOutcome {
    pub added: Vec<ItemId>,
    pub skipped: Vec<ValidationError>,
}

/// Validates, queues, previews and uploads batches of files
pub struct BatchUploader {
    config: UploaderConfig,
    validator: SelectionValidator,
    queue: Mutex<UploadQueue>,
    previews: Mutex<PreviewManager>,
    executor: UploadExecutor,
    listener: Arc<dyn UploadListener>,
}

impl BatchUploader {
    /// Build an uploader, validating `config` first
    pub fn new(
        config: UploaderConfig,
        store: Arc<dyn ObjectStore>,
        listener: Arc<dyn UploadListener>,
    ) -> Result<Self, UploadError> {
        config.validate()?;

        let previews = match &config.preview_dir {
            Some(dir) => PreviewManager::new(dir.clone()),
            None => PreviewManager::in_temp_dir(),
        };

        Ok(Self {
            validator: SelectionValidator::new(&config),
            executor: UploadExecutor::new(store, &config),
            queue: Mutex::new(UploadQueue::new()),
            previews: Mutex::new(previews),
            listener,
            config,
        })
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Screen a newly chosen batch and queue the accepted files.
    ///
    /// `TooManyFiles` rejects the whole batch and is returned as an error after
    /// the listener has been told. Oversize files are reported to the listener
    /// one by one and listed in the outcome; the rest of the batch is queued.
    pub fn select(&self, batch: Vec<SelectedFile>) -> Result<SelectionOutcome, UploadError> {
        if batch.is_empty() {
            return Ok(SelectionOutcome::default());
        }

        let current = self.queue.lock().len();
        let screened = match self.validator.screen(batch, current) {
            Ok(screened) => screened,
            Err(reason) => {
                self.reject(&reason);
                return Err(reason.into());
            }
        };

        // preview files are written with the queue unlocked
        let handles = self.acquire_all(&screened.accepted)?;
        let (added, queued) = match self.admit(screened.accepted, handles) {
            Ok(admitted) => admitted,
            Err(reason) => {
                self.reject(&reason);
                return Err(reason.into());
            }
        };

        for reason in &screened.skipped {
            self.reject(reason);
        }

        tracing::info!(
            added = added.len(),
            skipped = screened.skipped.len(),
            queued = queued,
            "Selection queued"
        );

        Ok(SelectionOutcome {
            added,
            skipped: screened.skipped,
        })
    }

    /// Append previewed files, re-checking the count gate against the queue as
    /// it is now. On rejection every handle is released.
    fn admit(
        &self,
        files: Vec<SelectedFile>,
        handles: Vec<PreviewHandle>,
    ) -> Result<(Vec<ItemId>, usize), ValidationError> {
        let mut queue = self.queue.lock();
        if let Err(reason) = self.validator.check_count(files.len(), queue.len()) {
            let mut previews = self.previews.lock();
            for handle in handles {
                previews.release(handle);
            }
            return Err(reason);
        }

        let added = files
            .into_iter()
            .zip(handles)
            .map(|(file, handle)| queue.append(file, handle))
            .collect::<Vec<_>>();
        Ok((added, queue.len()))
    }

    fn reject(&self, reason: &ValidationError) {
        metrics::record_rejection(reason.kind());
        self.listener.on_batch_rejected(reason);
    }

    /// One preview per file, or none at all
    fn acquire_all(&self, files: &[SelectedFile]) -> Result<Vec<PreviewHandle>, UploadError> {
        let mut previews = self.previews.lock();
        let mut handles = Vec::with_capacity(files.len());

        for file in files {
            match previews.acquire(file) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    for handle in handles {
                        previews.release(handle);
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(handles)
    }

    /// Drop one item and release its preview. Returns `false` for unknown ids.
    ///
    /// Allowed while a pass runs: if the item's put is in flight it is not
    /// cancelled, and its settlement is ignored.
    pub fn remove(&self, id: ItemId) -> bool {
        let mut queue = self.queue.lock();
        let Some(handle) = queue.remove(id) else {
            return false;
        };
        self.previews.lock().release(handle);
        tracing::debug!(item = %id, remaining = queue.len(), "Item removed");
        true
    }

    /// Drop every item and release every preview. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut queue = self.queue.lock();
        let handles = queue.clear();
        let mut previews = self.previews.lock();
        let count = handles.len();
        for handle in handles {
            previews.release(handle);
        }
        tracing::debug!(removed = count, "Queue cleared");
        count
    }

    /// Upload every item not yet uploaded, one at a time, then report.
    ///
    /// Failed items from earlier passes are retried; uploaded ones are left alone.
    pub async fn upload(&self) -> Result<PassReport, UploadError> {
        let tally = self.executor.run_pass(&self.queue).await?;
        let report = PassReport::collect(&self.queue.lock(), tally);
        self.listener.on_pass_settled(&report);
        Ok(report)
    }

    /// Snapshot of every item, in queue order
    pub fn items(&self) -> Vec<ItemView> {
        self.queue.lock().items().iter().map(|item| item.view()).collect()
    }

    pub fn item(&self, id: ItemId) -> Option<ItemView> {
        self.queue.lock().get(id).map(|item| item.view())
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Items the next pass would attempt
    pub fn pending_count(&self) -> usize {
        self.queue.lock().pending_ids().len()
    }

    pub fn uploaded_urls(&self) -> Vec<String> {
        self.queue.lock().uploaded_urls()
    }

    /// Previews currently held
    pub fn live_previews(&self) -> usize {
        self.previews.lock().live_count()
    }

    pub fn is_uploading(&self) -> bool {
        self.executor.is_running()
    }
}

impl Drop for BatchUploader {
    fn drop(&mut self) {
        let released = self.clear();
        if released > 0 {
            tracing::debug!(released = released, "Released previews on shutdown");
        }
    }
}
