//! HTTP object store
//!
//! Talks to a hosted storage REST API (Supabase Storage compatible).
//!
//! | Operation | Request |
//! |-----------|---------|
//! | put | `POST {endpoint}/object/{bucket}/{key}` |
//! | public_url | `{endpoint}/object/public/{bucket}/{key}` (no request) |
//!
//! Writes carry `cache-control: max-age=N` and `x-upsert: false` so that a
//! key collision fails instead of silently replacing the stored object.

use super::{ObjectStore, PutOptions, StoreError};
use crate::config::StoreConfig;
use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Characters left untouched inside a key segment
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Error body returned by the storage API
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Object store backed by the storage REST API
pub struct HttpObjectStore {
    endpoint: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl HttpObjectStore {
    /// Create a new HTTP store client
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| StoreError::Config(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http_client,
        })
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// `bucket/key` with every segment percent-encoded
    fn object_path(bucket: &str, key: &str) -> String {
        std::iter::once(bucket)
            .chain(key.split('/').filter(|s| !s.is_empty()))
            .map(|segment| utf8_percent_encode(segment, KEY_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Map a non-2xx response onto a [`StoreError`]
    fn classify_failure(status: u16, key: &str, body: &str) -> StoreError {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .message
            .or(parsed.error)
            .unwrap_or_else(|| body.trim().to_string());

        let lowered = message.to_lowercase();
        let conflict = status == 409
            || (status == 400
                && (lowered.contains("duplicate") || lowered.contains("already exists")));
        if conflict {
            return StoreError::AlreadyExists {
                key: key.to_string(),
            };
        }

        let message = if message.is_empty() {
            reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("unknown error")
                .to_string()
        } else {
            message
        };

        StoreError::Rejected { status, message }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    #[tracing::instrument(
        name = "store.put",
        skip(self, body, options),
        fields(
            store.bucket = %bucket,
            store.key = %key,
            http.method = "POST",
            upload.bytes = body.len(),
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: PutOptions,
    ) -> Result<(), StoreError> {
        let url = format!("{}/object/{}", self.endpoint, Self::object_path(bucket, key));
        let content_type = options
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");
        let start_time = Instant::now();

        let mut request = self
            .http_client
            .post(&url)
            .header(
                CACHE_CONTROL,
                format!("max-age={}", options.cache_control_seconds),
            )
            .header("x-upsert", options.allow_overwrite.to_string())
            .header(CONTENT_TYPE, content_type)
            .body(body);

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key).header("apikey", api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        if status.is_success() {
            tracing::debug!(
                duration_ms = start_time.elapsed().as_millis(),
                "Object stored"
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(Self::classify_failure(status.as_u16(), key, &body))
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/object/public/{}",
            self.endpoint,
            Self::object_path(bucket, key)
        )
    }
}
