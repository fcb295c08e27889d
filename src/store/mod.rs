//! Object store module
//!
//! The uploader talks to remote storage only through the [`ObjectStore`]
//! trait: one `put` per file and a synchronous `public_url` derivation.
//!
//! # Implementations
//!
//! | Type | Backend | Use |
//! |------|---------|-----|
//! | [`HttpObjectStore`] | Hosted storage REST API | Production |
//! | [`MemoryObjectStore`] | In-process map | Tests, dry runs |
//!
//! # Example
//!
//! ```no_run
//! use campus_uploadr::config::StoreConfig;
//! use campus_uploadr::store::{HttpObjectStore, ObjectStore, PutOptions};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = HttpObjectStore::new(&StoreConfig {
//!     endpoint: "https://abc.supabase.co/storage/v1".to_string(),
//!     api_key: Some("service-key".to_string()),
//!     timeout_seconds: 30,
//! })?;
//!
//! let options = PutOptions::new(3600).with_content_type("image/png");
//! store
//!     .put("gallery-images", "gallery/1700000000000-ab12cd.png", Bytes::from("..."), options)
//!     .await?;
//! println!("{}", store.public_url("gallery-images", "gallery/1700000000000-ab12cd.png"));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod http;
pub mod memory;

pub use http::HttpObjectStore;
pub use memory::{MemoryObjectStore, StoreCall};

/// Object store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Object '{key}' already exists")]
    AlreadyExists { key: String },

    #[error("Store rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Request error: {0}")]
    Request(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Options sent with every `put`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    /// `Cache-Control: max-age` for the stored object
    pub cache_control_seconds: u64,
    /// When false, writing an existing key must fail instead of replacing it
    pub allow_overwrite: bool,
    pub content_type: Option<String>,
}

impl PutOptions {
    /// No-overwrite options with the given cache lifetime
    pub fn new(cache_control_seconds: u64) -> Self {
        Self {
            cache_control_seconds,
            allow_overwrite: false,
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Remote object storage as seen by the uploader
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `bucket/key`, settling once the store has answered
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: PutOptions,
    ) -> Result<(), StoreError>;

    /// Durable public URL for `bucket/key`. Pure derivation, no network access.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}
