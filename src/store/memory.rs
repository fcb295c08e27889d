//! In-memory object store
//!
//! Keeps objects in a map and records every call in order. Supports failure
//! injection and artificial latency so that pass behaviour can be observed
//! without a network.

use super::{ObjectStore, PutOptions, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One observed store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    PutStarted { bucket: String, key: String },
    PutSettled { bucket: String, key: String, ok: bool },
    PublicUrl { bucket: String, key: String },
}

/// Object held by [`MemoryObjectStore`]
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub cache_control_seconds: u64,
}

#[derive(Default)]
struct FailureRules {
    next: usize,
    key_suffixes: Vec<String>,
}

/// Object store living entirely in process memory
pub struct MemoryObjectStore {
    base_url: String,
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    calls: Mutex<Vec<StoreCall>>,
    failures: Mutex<FailureRules>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("memory://store")
    }
}

impl MemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(FailureRules::default()),
            latency: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delay every `put` by `latency` before it settles
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail the next `count` puts with a 500 rejection
    pub fn fail_next(&self, count: usize) {
        self.failures.lock().next = count;
    }

    /// Fail every put whose key ends with `suffix` (e.g. `".tiff"`)
    pub fn fail_keys_ending_with(&self, suffix: impl Into<String>) {
        self.failures.lock().key_suffixes.push(suffix.into());
    }

    /// Drop all failure rules
    pub fn heal(&self) {
        *self.failures.lock() = FailureRules::default();
    }

    /// Pre-populate an object, e.g. to provoke a key collision
    pub fn insert(&self, bucket: &str, key: &str, body: Bytes) {
        self.objects.lock().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: None,
                cache_control_seconds: 0,
            },
        );
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every call observed so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Number of `put` calls started so far
    pub fn put_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, StoreCall::PutStarted { .. }))
            .count()
    }

    /// Highest number of puts observed in flight at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn should_fail(&self, key: &str) -> bool {
        let mut rules = self.failures.lock();
        if rules.next > 0 {
            rules.next -= 1;
            return true;
        }
        rules.key_suffixes.iter().any(|s| key.ends_with(s.as_str()))
    }

    fn store_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> Result<(), StoreError> {
        if self.should_fail(key) {
            return Err(StoreError::Rejected {
                status: 500,
                message: "injected failure".into(),
            });
        }

        let mut objects = self.objects.lock();
        let id = (bucket.to_string(), key.to_string());
        if !options.allow_overwrite && objects.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                key: key.to_string(),
            });
        }

        objects.insert(
            id,
            StoredObject {
                body,
                content_type: options.content_type.clone(),
                cache_control_seconds: options.cache_control_seconds,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: PutOptions,
    ) -> Result<(), StoreError> {
        self.calls.lock().push(StoreCall::PutStarted {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let result = self.store_object(bucket, key, body, &options);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.lock().push(StoreCall::PutSettled {
            bucket: bucket.to_string(),
            key: key.to_string(),
            ok: result.is_ok(),
        });
        result
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        self.calls.lock().push(StoreCall::PublicUrl {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        format!("{}/{}/{}", self.base_url, bucket, key)
    }
}
