//! Configuration Loading Tests
//!
//! Loads YAML files from disk, including `${VAR}` expansion of the store
//! endpoint and key.

use campus_uploadr::config::{Config, ConfigError};
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

const SITE_CONFIG: &str = r#"
store:
  endpoint: "${CAMPUS_STORAGE_URL:-http://localhost:54321/storage/v1}"
  api_key: "${CAMPUS_STORAGE_KEY}"
profiles:
  - name: gallery
    bucket: gallery-images
    folder_prefix: gallery
    accept: "image/*"
    allow_multiple: true
    max_file_count: 10
  - name: events
    bucket: event-images
    folder_prefix: events
    max_file_count: 1
  - name: results
    bucket: results-files
    folder_prefix: results
    accept: ".pdf,.doc,.docx,.xls,.xlsx,.txt"
    max_file_count: 1
    max_file_size_bytes: 10485760
"#;

#[test]
#[serial]
fn test_load_site_config_with_env() {
    std::env::set_var("CAMPUS_STORAGE_URL", "https://abc.supabase.co/storage/v1");
    std::env::set_var("CAMPUS_STORAGE_KEY", "secret-key");

    let file = write_config(SITE_CONFIG);
    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.store.endpoint, "https://abc.supabase.co/storage/v1");
    assert_eq!(config.store.api_key.as_deref(), Some("secret-key"));
    assert_eq!(config.profiles.len(), 3);

    let gallery = &config.profile("gallery").unwrap().uploader;
    assert!(gallery.allow_multiple);
    assert_eq!(gallery.max_file_count, 10);
    assert_eq!(gallery.max_file_size_bytes, 5 * 1024 * 1024);

    let results = &config.profile("results").unwrap().uploader;
    assert_eq!(results.max_file_size_bytes, 10 * 1024 * 1024);
    assert!(!results.allow_multiple);
    assert_eq!(results.cache_control_seconds, 3600);

    std::env::remove_var("CAMPUS_STORAGE_URL");
    std::env::remove_var("CAMPUS_STORAGE_KEY");
}

#[test]
#[serial]
fn test_load_uses_env_default() {
    std::env::remove_var("CAMPUS_STORAGE_URL");

    let file = write_config(SITE_CONFIG);
    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.store.endpoint, "http://localhost:54321/storage/v1");
}

#[test]
fn test_missing_file() {
    let result = Config::load("/nonexistent/campus-uploadr.yaml");
    assert!(matches!(result, Err(ConfigError::IoError(_))));
}

#[test]
fn test_malformed_yaml() {
    let file = write_config("store: [unclosed");
    assert!(matches!(
        Config::load(file.path()),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn test_invalid_profile_is_named() {
    let file = write_config(
        r#"
store:
  endpoint: "http://localhost:54321/storage/v1"
profiles:
  - name: leadership
    bucket: ""
"#,
    );
    let err = Config::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("leadership"));
}
