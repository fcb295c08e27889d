//! Local preview handles
//!
//! Each accepted file gets a preview: a temp file holding its bytes, used for
//! on-screen display until the item is removed. The [`PreviewManager`] is the
//! only component that mints or invalidates handles.
//!
//! [`PreviewHandle`] is neither `Clone` nor `Copy`, and
//! [`PreviewManager::release`] takes it by value, so a handle can be released
//! at most once.
//!
//! # Example
//!
//! ```no_run
//! use campus_uploadr::upload::{PreviewManager, SelectedFile};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut previews = PreviewManager::in_temp_dir();
//! let handle = previews.acquire(&SelectedFile::new("crest.png", vec![0u8; 64]))?;
//! println!("Preview at {:?}", handle.path());
//! previews.release(handle);
//! assert_eq!(previews.live_count(), 0);
//! # Ok(())
//! # }
//! ```

use super::key;
use super::SelectedFile;
use crate::metrics;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Failed to write preview for '{name}': {source}")]
    Write {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Ownership token for one preview
#[derive(Debug)]
pub struct PreviewHandle {
    owner: Uuid,
    id: u64,
    path: PathBuf,
    size: u64,
    content_hash: String,
}

impl PreviewHandle {
    /// Path of the preview file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// SHA256 of the previewed bytes (hex encoded)
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
}

/// Mints and releases preview handles
pub struct PreviewManager {
    owner: Uuid,
    dir: PathBuf,
    next_id: u64,
    live: HashMap<u64, PathBuf>,
}

impl PreviewManager {
    /// Write previews under `dir`
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            owner: Uuid::new_v4(),
            dir: dir.into(),
            next_id: 0,
            live: HashMap::new(),
        }
    }

    /// Write previews to tmpfs (/dev/shm) on Linux when present, else the system temp dir
    pub fn in_temp_dir() -> Self {
        Self::new(Self::default_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of handles minted and not yet released
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Whether `handle` was minted here and is still live
    pub fn is_live(&self, handle: &PreviewHandle) -> bool {
        handle.owner == self.owner && self.live.contains_key(&handle.id)
    }

    /// Create the preview for one accepted file
    pub fn acquire(&mut self, file: &SelectedFile) -> Result<PreviewHandle, PreviewError> {
        let wrap = |source| PreviewError::Write {
            name: file.name.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(wrap)?;

        let file_name = match key::extension(&file.name) {
            Some(ext) => format!("campus-preview-{}.{}", Uuid::new_v4(), ext),
            None => format!("campus-preview-{}", Uuid::new_v4()),
        };
        let path = self.dir.join(file_name);

        let mut out = File::create(&path).map_err(wrap)?;
        if let Err(e) = out.write_all(&file.bytes).and_then(|_| out.flush()) {
            drop(out);
            let _ = std::fs::remove_file(&path);
            return Err(wrap(e));
        }

        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(id, path.clone());
        metrics::preview_acquired();

        tracing::debug!(
            preview_id = id,
            path = %path.display(),
            name = %file.name,
            "Preview acquired"
        );

        Ok(PreviewHandle {
            owner: self.owner,
            id,
            path,
            size: file.size(),
            content_hash: hex::encode(Sha256::digest(&file.bytes)),
        })
    }

    /// Invalidate a handle and delete its preview file.
    ///
    /// Returns `false` when the handle was not minted by this manager; the
    /// registry is left untouched in that case.
    pub fn release(&mut self, handle: PreviewHandle) -> bool {
        if handle.owner != self.owner || self.live.remove(&handle.id).is_none() {
            tracing::warn!(
                preview_id = handle.id,
                path = %handle.path.display(),
                "Release of unknown preview handle"
            );
            return false;
        }
        metrics::previews_released(1);

        remove_preview_file(&handle.path);
        tracing::debug!(preview_id = handle.id, "Preview released");
        true
    }

    fn default_dir() -> PathBuf {
        #[cfg(target_os = "linux")]
        {
            let shm = PathBuf::from("/dev/shm");
            if shm.exists() && shm.is_dir() {
                return shm;
            }
        }

        std::env::temp_dir()
    }
}

impl Drop for PreviewManager {
    fn drop(&mut self) {
        if self.live.is_empty() {
            return;
        }
        tracing::warn!(
            leaked = self.live.len(),
            "Preview manager dropped with live handles; removing preview files"
        );
        metrics::previews_released(self.live.len());
        for (_, path) in self.live.drain() {
            remove_preview_file(&path);
        }
    }
}

fn remove_preview_file(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to clean up preview file"
            );
        }
    }
}
