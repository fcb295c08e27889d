//! Campus Uploadr Library
//!
//! Batch upload orchestration for the school website's media and documents.
//!
//! # Features
//!
//! - **Selection Gates**: All-or-nothing file count limit, per-file size limit
//! - **Local Previews**: One preview file per queued item, released on removal
//! - **Sequential Passes**: One upload in flight at a time, failures never abort a pass
//! - **Retry**: Re-running a pass retries failed items and never re-uploads finished ones
//! - **Pluggable Storage**: Hosted storage REST API or in-memory store
//!
//! # Example
//!
//! ```no_run
//! use campus_uploadr::config::Config;
//! use campus_uploadr::store::HttpObjectStore;
//! use campus_uploadr::upload::{BatchUploader, SelectedFile, TracingListener};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let store = Arc::new(HttpObjectStore::new(&config.store)?);
//!     let profile = config.profile("gallery")?;
//!
//!     let uploader = BatchUploader::new(profile.uploader.clone(), store, Arc::new(TracingListener))?;
//!     uploader.select(vec![SelectedFile::from_path("sports-day.jpg").await?])?;
//!     let report = uploader.upload().await?;
//!     println!("{:?}", report.successful_urls);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod metrics;
pub mod store;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use upload::BatchUploader;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
