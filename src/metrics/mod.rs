//! Metrics module
//!
//! Prometheus counters and histograms for uploads, selections and previews.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, register_int_counter,
    register_int_gauge, Counter, CounterVec, Encoder, HistogramVec, IntCounter, IntGauge,
    TextEncoder,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "campus_uploads_total",
        "Total number of file uploads",
        &["bucket", "status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "campus_upload_bytes_total",
        "Total bytes uploaded"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "campus_upload_duration_seconds",
        "Single file upload duration in seconds",
        &["bucket"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    pub static ref UPLOAD_PASSES: IntCounter = register_int_counter!(
        "campus_upload_passes_total",
        "Completed executor passes"
    ).unwrap();

    // Selection metrics
    pub static ref SELECTION_REJECTIONS: CounterVec = register_counter_vec!(
        "campus_selection_rejections_total",
        "Batches or files turned away at selection",
        &["reason"]
    ).unwrap();

    // Preview metrics
    pub static ref PREVIEW_HANDLES_LIVE: IntGauge = register_int_gauge!(
        "campus_preview_handles_live",
        "Preview handles currently held"
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(bucket: &str, bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure(bucket: &str) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "failure"]).inc();
}

/// Record upload duration
pub fn record_upload_duration(bucket: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[bucket])
        .observe(duration_secs);
}

pub fn record_pass() {
    UPLOAD_PASSES.inc();
}

/// Record a selection rejection (`too_many_files`, `file_too_large`)
pub fn record_rejection(reason: &str) {
    SELECTION_REJECTIONS.with_label_values(&[reason]).inc();
}

/// One preview handle minted
pub fn preview_acquired() {
    PREVIEW_HANDLES_LIVE.inc();
}

/// `count` preview handles released by one manager
pub fn previews_released(count: usize) {
    PREVIEW_HANDLES_LIVE.sub(count as i64);
}

/// Render the default registry in the text exposition format
pub fn render() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_upload_success() {
        record_upload_success("test-bucket", 1024);
        // Just verify it doesn't panic
    }

    #[test]
    fn test_record_upload_failure_and_duration() {
        record_upload_failure("test-bucket");
        record_upload_duration("test-bucket", 0.25);
    }

    #[test]
    fn test_render_contains_recorded_series() {
        record_rejection("too_many_files");
        record_pass();
        let text = render();
        assert!(text.contains("campus_selection_rejections_total"));
        assert!(text.contains("campus_upload_passes_total"));
    }
}
