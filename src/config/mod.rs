//! Configuration module for Campus Uploadr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation of every upload profile.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// Variable names must start with a letter or underscore and contain only
/// uppercase letters, digits, and underscores.
///
/// # Examples
///
/// ```ignore
/// std::env::set_var("STORAGE_URL", "https://files.example.org");
/// let result = expand_env_vars("${STORAGE_URL}/storage/v1");
/// assert_eq!(result, "https://files.example.org/storage/v1");
///
/// let result = expand_env_vars("${MISSING:-default}");
/// assert_eq!(result, "default");
/// ```
pub(crate) fn expand_env_vars(s: &str) -> String {
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]+))?\}") {
        Ok(re) => re,
        Err(_) => return s.to_string(),
    };
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Leave the placeholder as written.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);

    result
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Unknown upload profile '{0}'")]
    UnknownProfile(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub profiles: Vec<ProfileConfig>,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_http_url(&self.store.endpoint) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid store endpoint '{}': must start with http:// or https://",
                self.store.endpoint
            )));
        }

        if self.store.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Store timeout must be greater than zero".into(),
            ));
        }

        if self.profiles.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one upload profile must be configured".into(),
            ));
        }

        for (i, profile) in self.profiles.iter().enumerate() {
            if profile.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Profile #{} has an empty name",
                    i
                )));
            }
            if self.profiles[..i].iter().any(|p| p.name == profile.name) {
                return Err(ConfigError::ValidationError(format!(
                    "Profile '{}' is defined more than once",
                    profile.name
                )));
            }
            profile.uploader.validate().map_err(|e| match e {
                ConfigError::ValidationError(msg) => ConfigError::ValidationError(format!(
                    "Profile '{}': {}",
                    profile.name, msg
                )),
                other => other,
            })?;
        }

        Ok(())
    }

    /// Look up an upload profile by name
    pub fn profile(&self, name: &str) -> Result<&ProfileConfig, ConfigError> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))
    }
}

/// Object store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the storage REST API, e.g. `https://abc.supabase.co/storage/v1`.
    /// Supports ${VAR} and ${VAR:-default} expansion.
    pub endpoint: String,

    /// API key sent as bearer token and `apikey` header
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds. Default: 30
    #[serde(default = "default_store_timeout")]
    pub timeout_seconds: u64,
}

fn default_store_timeout() -> u64 {
    30
}

/// A named uploader setup (gallery, events, results...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub name: String,
    #[serde(flatten)]
    pub uploader: UploaderConfig,
}

/// Settings for one batch uploader
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploaderConfig {
    /// Target bucket
    pub bucket: String,

    /// Folder prepended to every remote key. Empty means bucket root.
    #[serde(default)]
    pub folder_prefix: String,

    /// HTML `accept`-style pattern, e.g. `image/*` or `.pdf,.docx`. Advisory only.
    #[serde(default = "default_accept")]
    pub accept: String,

    #[serde(default)]
    pub allow_multiple: bool,

    #[serde(default = "default_max_file_count")]
    pub max_file_count: usize,

    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: u64,

    #[serde(default = "default_cache_control_seconds")]
    pub cache_control_seconds: u64,

    /// Where preview files are written. Defaults to tmpfs or the system temp dir.
    #[serde(default)]
    pub preview_dir: Option<PathBuf>,
}

impl UploaderConfig {
    /// Uploader settings for `bucket` with the stock limits
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            folder_prefix: String::new(),
            accept: default_accept(),
            allow_multiple: false,
            max_file_count: default_max_file_count(),
            max_file_size_bytes: default_max_file_size_bytes(),
            cache_control_seconds: default_cache_control_seconds(),
            preview_dir: None,
        }
    }

    pub fn with_folder_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.folder_prefix = prefix.into();
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = accept.into();
        self
    }

    pub fn with_allow_multiple(mut self, allow: bool) -> Self {
        self.allow_multiple = allow;
        self
    }

    pub fn with_max_file_count(mut self, count: usize) -> Self {
        self.max_file_count = count;
        self
    }

    pub fn with_max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.max_file_size_bytes = bytes;
        self
    }

    pub fn with_preview_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.preview_dir = Some(dir.into());
        self
    }

    /// Validate limits and names
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Bucket name cannot be empty".into(),
            ));
        }

        if self.max_file_count == 0 {
            return Err(ConfigError::ValidationError(
                "max_file_count must be greater than zero".into(),
            ));
        }

        if self.max_file_size_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "max_file_size_bytes must be greater than zero".into(),
            ));
        }

        if self.folder_prefix.contains("..") {
            return Err(ConfigError::ValidationError(format!(
                "Invalid folder_prefix '{}': must not contain '..'",
                self.folder_prefix
            )));
        }

        Ok(())
    }
}

fn default_accept() -> String {
    "image/*".to_string()
}

fn default_max_file_count() -> usize {
    5
}

fn default_max_file_size_bytes() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_cache_control_seconds() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config {
            store: StoreConfig {
                endpoint: "https://files.example.org/storage/v1".into(),
                api_key: None,
                timeout_seconds: 30,
            },
            profiles: vec![ProfileConfig {
                name: "gallery".into(),
                uploader: UploaderConfig::new("gallery-images")
                    .with_folder_prefix("gallery")
                    .with_allow_multiple(true)
                    .with_max_file_count(10),
            }],
        }
    }

    #[test]
    fn test_uploader_defaults() {
        let config = UploaderConfig::new("event-images");
        assert_eq!(config.accept, "image/*");
        assert!(!config.allow_multiple);
        assert_eq!(config.max_file_count, 5);
        assert_eq!(config.max_file_size_bytes, 5_242_880);
        assert_eq!(config.cache_control_seconds, 3600);
        assert!(config.folder_prefix.is_empty());
    }

    #[test]
    fn test_valid_config() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_profiles() {
        let mut config = sample_config();
        config.profiles.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_endpoint() {
        let mut config = sample_config();
        config.store.endpoint = "ftp://files.example.org".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_limits() {
        assert!(UploaderConfig::new("b").with_max_file_count(0).validate().is_err());
        assert!(UploaderConfig::new("b")
            .with_max_file_size_bytes(0)
            .validate()
            .is_err());
        assert!(UploaderConfig::new("  ").validate().is_err());
    }

    #[test]
    fn test_duplicate_profiles_rejected() {
        let mut config = sample_config();
        config.profiles.push(config.profiles[0].clone());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_profile_lookup() {
        let config = sample_config();
        assert_eq!(config.profile("gallery").unwrap().uploader.bucket, "gallery-images");
        assert!(matches!(
            config.profile("missing"),
            Err(ConfigError::UnknownProfile(_))
        ));
    }

    #[test]
    fn test_expand_env_default() {
        assert_eq!(
            expand_env_vars("${CAMPUS_SURELY_UNSET_VAR:-fallback}/x"),
            "fallback/x"
        );
        assert_eq!(
            expand_env_vars("${CAMPUS_SURELY_UNSET_VAR}"),
            "${CAMPUS_SURELY_UNSET_VAR}"
        );
    }
}
