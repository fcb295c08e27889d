//! Per-file upload state
//!
//! ```text
//!  Selected ──Started──▶ Uploading ──Succeeded──▶ Uploaded (terminal)
//!                          ▲    │
//!                  Started │    └──Failed──▶ Failed
//!                          └────────────────────┘
//! ```

use super::preview::PreviewHandle;
use super::SelectedFile;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Stable identifier assigned when an item enters the queue. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(u64);

impl ItemId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Selected,
    Uploading,
    Uploaded,
    Failed,
}

/// Coarse progress marker. The store API reports no byte-level progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Progress {
    Idle,
    InFlight,
    Done,
}

impl Progress {
    pub fn percent(self) -> u8 {
        match self {
            Progress::Idle => 0,
            Progress::InFlight => 50,
            Progress::Done => 100,
        }
    }
}

impl Serialize for Progress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.percent())
    }
}

/// State change applied by the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemEvent {
    Started { key: String },
    Succeeded { url: String },
    Failed { message: String },
}

impl ItemEvent {
    fn name(&self) -> &'static str {
        match self {
            ItemEvent::Started { .. } => "started",
            ItemEvent::Succeeded { .. } => "succeeded",
            ItemEvent::Failed { .. } => "failed",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot apply '{event}' to an item in state {state:?}")]
pub struct TransitionError {
    pub state: ItemState,
    pub event: &'static str,
}

/// One file tracked by the queue
#[derive(Debug)]
pub struct UploadItem {
    id: ItemId,
    file: SelectedFile,
    preview: PreviewHandle,
    state: ItemState,
    progress: Progress,
    remote_key: Option<String>,
    remote_url: Option<String>,
    error_message: Option<String>,
}

impl UploadItem {
    pub(crate) fn new(id: ItemId, file: SelectedFile, preview: PreviewHandle) -> Self {
        Self {
            id,
            file,
            preview,
            state: ItemState::Selected,
            progress: Progress::Idle,
            remote_key: None,
            remote_url: None,
            error_message: None,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn file(&self) -> &SelectedFile {
        &self.file
    }

    pub fn source_name(&self) -> &str {
        &self.file.name
    }

    pub fn source_size(&self) -> u64 {
        self.file.size()
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn remote_key(&self) -> Option<&str> {
        self.remote_key.as_deref()
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.remote_url.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_uploaded(&self) -> bool {
        self.state == ItemState::Uploaded
    }

    /// Apply an executor event. Illegal transitions leave the item untouched.
    pub fn apply(&mut self, event: ItemEvent) -> Result<(), TransitionError> {
        let illegal = TransitionError {
            state: self.state,
            event: event.name(),
        };

        match (self.state, event) {
            (ItemState::Selected | ItemState::Failed, ItemEvent::Started { key }) => {
                self.state = ItemState::Uploading;
                self.progress = Progress::InFlight;
                self.remote_key = Some(key);
                self.error_message = None;
            }
            (ItemState::Uploading, ItemEvent::Succeeded { url }) => {
                self.state = ItemState::Uploaded;
                self.progress = Progress::Done;
                self.remote_url = Some(url);
            }
            // progress stays at InFlight as a stalled marker
            (ItemState::Uploading, ItemEvent::Failed { message }) => {
                self.state = ItemState::Failed;
                self.error_message = Some(message);
            }
            _ => return Err(illegal),
        }
        Ok(())
    }

    /// Give up the item, handing its preview back for release
    pub(crate) fn into_preview(self) -> PreviewHandle {
        self.preview
    }

    pub fn view(&self) -> ItemView {
        ItemView {
            id: self.id,
            name: self.file.name.clone(),
            size: self.file.size(),
            content_type: self.file.content_type.clone(),
            preview_path: self.preview.path().to_path_buf(),
            state: self.state,
            progress: self.progress,
            remote_url: self.remote_url.clone(),
            error_message: self.error_message.clone(),
        }
    }
}

/// Read-only snapshot of an item for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemView {
    pub id: ItemId,
    pub name: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub preview_path: PathBuf,
    pub state: ItemState,
    pub progress: Progress,
    pub remote_url: Option<String>,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::preview::PreviewManager;

    fn item(previews: &mut PreviewManager) -> UploadItem {
        let file = SelectedFile::new("sports-day.jpg", vec![1u8; 16]);
        let preview = previews.acquire(&file).unwrap();
        UploadItem::new(ItemId::new(1), file, preview)
    }

    fn started() -> ItemEvent {
        ItemEvent::Started {
            key: "events/1-abc.jpg".into(),
        }
    }

    #[test]
    fn test_new_item_is_selected() {
        let dir = tempfile::tempdir().unwrap();
        let mut previews = PreviewManager::new(dir.path());
        let item = item(&mut previews);
        assert_eq!(item.state(), ItemState::Selected);
        assert_eq!(item.progress().percent(), 0);
        assert_eq!(item.source_size(), 16);
        assert!(item.remote_url().is_none());
        assert!(item.error_message().is_none());
    }

    #[test]
    fn test_success_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut previews = PreviewManager::new(dir.path());
        let mut item = item(&mut previews);

        item.apply(started()).unwrap();
        assert_eq!(item.state(), ItemState::Uploading);
        assert_eq!(item.progress().percent(), 50);
        assert_eq!(item.remote_key(), Some("events/1-abc.jpg"));

        item.apply(ItemEvent::Succeeded {
            url: "https://cdn/x.jpg".into(),
        })
        .unwrap();
        assert_eq!(item.state(), ItemState::Uploaded);
        assert_eq!(item.progress().percent(), 100);
        assert_eq!(item.remote_url(), Some("https://cdn/x.jpg"));
    }

    #[test]
    fn test_failure_keeps_progress_and_allows_retry() {
        let dir = tempfile::tempdir().unwrap();
        let mut previews = PreviewManager::new(dir.path());
        let mut item = item(&mut previews);

        item.apply(started()).unwrap();
        item.apply(ItemEvent::Failed {
            message: "Failed to upload: timeout".into(),
        })
        .unwrap();
        assert_eq!(item.state(), ItemState::Failed);
        assert_eq!(item.progress(), Progress::InFlight);
        assert_eq!(item.error_message(), Some("Failed to upload: timeout"));
        assert!(item.remote_url().is_none());

        item.apply(started()).unwrap();
        assert_eq!(item.state(), ItemState::Uploading);
        assert!(item.error_message().is_none());
    }

    #[test]
    fn test_uploaded_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let mut previews = PreviewManager::new(dir.path());
        let mut item = item(&mut previews);
        item.apply(started()).unwrap();
        item.apply(ItemEvent::Succeeded { url: "u".into() }).unwrap();

        let err = item.apply(started()).unwrap_err();
        assert_eq!(err.state, ItemState::Uploaded);
        assert_eq!(err.event, "started");
        assert_eq!(item.remote_url(), Some("u"));
    }

    #[test]
    fn test_settlement_requires_uploading() {
        let dir = tempfile::tempdir().unwrap();
        let mut previews = PreviewManager::new(dir.path());
        let mut item = item(&mut previews);
        assert!(item.apply(ItemEvent::Succeeded { url: "u".into() }).is_err());
        assert!(item
            .apply(ItemEvent::Failed {
                message: "m".into()
            })
            .is_err());
        assert_eq!(item.state(), ItemState::Selected);
    }

    #[test]
    fn test_view_serializes_progress_as_percent() {
        let dir = tempfile::tempdir().unwrap();
        let mut previews = PreviewManager::new(dir.path());
        let mut item = item(&mut previews);
        item.apply(started()).unwrap();

        let json = serde_json::to_value(item.view()).unwrap();
        assert_eq!(json["progress"], 50);
        assert_eq!(json["state"], "uploading");
        assert_eq!(json["id"], 1);
    }
}
