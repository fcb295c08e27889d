//! Upload module
//!
//! Batch upload orchestration: selection validation, preview handles, the
//! item queue, the sequential executor and pass reporting.
//!
//! # Flow
//!
//! 1. [`SelectionValidator`] screens a batch against the queue size and limits
//! 2. [`PreviewManager`] mints one preview handle per accepted file
//! 3. Accepted files are appended to the [`UploadQueue`] as `Selected` items
//! 4. [`UploadExecutor`] walks the queue, one `put` at a time
//! 5. [`PassReport`] gathers every durable URL and the pass counts
//!
//! [`BatchUploader`] wires these together for callers.

use bytes::Bytes;
use std::path::Path;
use thiserror::Error;

pub mod executor;
pub mod item;
pub mod key;
pub mod orchestrator;
pub mod preview;
pub mod queue;
pub mod report;
pub mod validator;

pub use executor::{PassTally, UploadExecutor};
pub use item::{ItemEvent, ItemId, ItemState, ItemView, Progress, UploadItem};
pub use orchestrator::{BatchUploader, SelectionOutcome, TracingListener, UploadListener};
pub use preview::{PreviewError, PreviewHandle, PreviewManager};
pub use queue::{ApplyOutcome, UploadQueue};
pub use report::PassReport;
pub use validator::{AcceptPattern, Screened, SelectionValidator, ValidationError};

use crate::config::ConfigError;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Batch rejected: {0}")]
    Rejected(#[from] ValidationError),

    #[error("Preview error: {0}")]
    Preview(#[from] PreviewError),

    #[error("An upload pass is already in flight")]
    PassInFlight,

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A file picked by the user, held in memory until it is uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read a file from disk, sniffing its MIME type from the magic bytes
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let content_type = infer::get(&data).map(|kind| kind.mime_type().to_string());

        Ok(Self {
            name,
            content_type,
            bytes: Bytes::from(data),
        })
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}
