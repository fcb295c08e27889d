//! Selection validation
//!
//! Two gates with different failure scopes:
//!
//! - **Count** is all-or-nothing: if the batch would push the queue past
//!   `max_file_count`, nothing from it is added.
//! - **Size** is per file: oversize files are skipped, the rest still go in.
//!
//! The accept pattern is advisory. A mismatch is logged, never rejected.

use super::key;
use super::SelectedFile;
use crate::config::UploaderConfig;
use thiserror::Error;

const MIB: u64 = 1024 * 1024;

/// Why a batch or a file was turned away
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Too many files: maximum {max} files allowed")]
    TooManyFiles { max: usize, attempted: usize },

    #[error("File too large: {name} exceeds {} limit", describe_limit(.limit))]
    FileTooLarge { name: String, size: u64, limit: u64 },
}

impl ValidationError {
    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::TooManyFiles { .. } => "too_many_files",
            ValidationError::FileTooLarge { .. } => "file_too_large",
        }
    }
}

fn describe_limit(bytes: &u64) -> String {
    let bytes = *bytes;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Outcome of screening a batch that passed the count gate
#[derive(Debug, Default)]
pub struct Screened {
    pub accepted: Vec<SelectedFile>,
    pub skipped: Vec<ValidationError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AcceptEntry {
    Extension(String),
    Mime(mime::Mime),
}

/// HTML `accept`-style file type filter (`image/*`, `.pdf,.docx`, `text/plain`)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AcceptPattern {
    entries: Vec<AcceptEntry>,
}

impl AcceptPattern {
    pub fn parse(pattern: &str) -> Self {
        let entries = pattern
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|entry| {
                if let Some(ext) = entry.strip_prefix('.') {
                    return Some(AcceptEntry::Extension(ext.to_lowercase()));
                }
                match entry.parse::<mime::Mime>() {
                    Ok(m) => Some(AcceptEntry::Mime(m)),
                    Err(e) => {
                        tracing::warn!(entry = %entry, error = %e, "Ignoring unparseable accept entry");
                        None
                    }
                }
            })
            .collect();

        Self { entries }
    }

    /// True when the pattern places no restriction
    pub fn is_any(&self) -> bool {
        self.entries.is_empty()
            || self
                .entries
                .iter()
                .any(|e| matches!(e, AcceptEntry::Mime(m) if m.type_() == mime::STAR))
    }

    pub fn matches(&self, name: &str, content_type: Option<&str>) -> bool {
        if self.is_any() {
            return true;
        }

        let ext = key::extension(name).map(str::to_lowercase);
        let mime = content_type.and_then(|ct| ct.parse::<mime::Mime>().ok());

        self.entries.iter().any(|entry| match entry {
            AcceptEntry::Extension(want) => ext.as_deref() == Some(want.as_str()),
            AcceptEntry::Mime(want) => match &mime {
                Some(have) if want.subtype() == mime::STAR => have.type_() == want.type_(),
                Some(have) => have.essence_str() == want.essence_str(),
                None => false,
            },
        })
    }
}

/// Count and size gate for new selections
#[derive(Debug, Clone)]
pub struct SelectionValidator {
    max_file_count: usize,
    max_file_size_bytes: u64,
    allow_multiple: bool,
    accept: AcceptPattern,
}

impl SelectionValidator {
    pub fn new(config: &UploaderConfig) -> Self {
        Self {
            max_file_count: config.max_file_count,
            max_file_size_bytes: config.max_file_size_bytes,
            allow_multiple: config.allow_multiple,
            accept: AcceptPattern::parse(&config.accept),
        }
    }

    pub fn max_file_count(&self) -> usize {
        self.max_file_count
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_bytes
    }

    /// Count gate alone: `adding` more files on top of `current_count`
    pub fn check_count(&self, adding: usize, current_count: usize) -> Result<(), ValidationError> {
        let attempted = current_count + adding;
        // a single-file picker never yields more than one file
        if attempted > self.max_file_count || (!self.allow_multiple && adding > 1) {
            return Err(ValidationError::TooManyFiles {
                max: self.max_file_count,
                attempted,
            });
        }
        Ok(())
    }

    /// Screen `batch` given `current_count` items already queued
    pub fn screen(
        &self,
        batch: Vec<SelectedFile>,
        current_count: usize,
    ) -> Result<Screened, ValidationError> {
        self.check_count(batch.len(), current_count)?;

        let mut screened = Screened::default();
        for file in batch {
            if file.size() > self.max_file_size_bytes {
                screened.skipped.push(ValidationError::FileTooLarge {
                    name: file.name.clone(),
                    size: file.size(),
                    limit: self.max_file_size_bytes,
                });
                continue;
            }

            if !self.accept.matches(&file.name, file.content_type.as_deref()) {
                tracing::warn!(
                    name = %file.name,
                    content_type = ?file.content_type,
                    "File does not match the accepted types"
                );
            }
            screened.accepted.push(file);
        }

        Ok(screened)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(max_files: usize, max_size: u64) -> SelectionValidator {
        SelectionValidator::new(
            &UploaderConfig::new("b")
                .with_allow_multiple(true)
                .with_max_file_count(max_files)
                .with_max_file_size_bytes(max_size),
        )
    }

    fn sized(name: &str, size: usize) -> SelectedFile {
        SelectedFile::new(name, vec![0u8; size])
    }

    #[test]
    fn test_count_gate_is_all_or_nothing() {
        let v = validator(3, 100);
        let err = v
            .screen(vec![sized("a", 1), sized("b", 1)], 2)
            .unwrap_err();
        assert_eq!(err, ValidationError::TooManyFiles { max: 3, attempted: 4 });
    }

    #[test]
    fn test_count_gate_allows_exact_fill() {
        let v = validator(3, 100);
        let screened = v.screen(vec![sized("a", 1), sized("b", 1)], 1).unwrap();
        assert_eq!(screened.accepted.len(), 2);
    }

    #[test]
    fn test_size_gate_is_per_file() {
        let v = validator(5, 5_000_000);
        let screened = v
            .screen(
                vec![
                    sized("one.jpg", 2_000_000),
                    sized("two.jpg", 6_000_000),
                    sized("three.jpg", 1_000_000),
                ],
                0,
            )
            .unwrap();

        let names: Vec<_> = screened.accepted.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["one.jpg", "three.jpg"]);
        assert_eq!(
            screened.skipped,
            vec![ValidationError::FileTooLarge {
                name: "two.jpg".into(),
                size: 6_000_000,
                limit: 5_000_000
            }]
        );
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let v = validator(5, 10);
        let screened = v.screen(vec![sized("edge", 10)], 0).unwrap();
        assert_eq!(screened.accepted.len(), 1);
    }

    #[test]
    fn test_single_file_picker() {
        let v = SelectionValidator::new(&UploaderConfig::new("b").with_max_file_count(5));
        assert!(v.screen(vec![sized("a", 1)], 0).is_ok());
        assert!(matches!(
            v.screen(vec![sized("a", 1), sized("b", 1)], 0),
            Err(ValidationError::TooManyFiles { .. })
        ));
    }

    #[test]
    fn test_accept_mismatch_is_advisory() {
        let v = SelectionValidator::new(
            &UploaderConfig::new("b").with_accept(".pdf,.docx"),
        );
        let screened = v.screen(vec![sized("photo.png", 1)], 0).unwrap();
        assert_eq!(screened.accepted.len(), 1);
    }

    #[test]
    fn test_error_messages() {
        let err = ValidationError::FileTooLarge {
            name: "big.jpg".into(),
            size: 6 * MIB,
            limit: 5 * MIB,
        };
        assert_eq!(err.to_string(), "File too large: big.jpg exceeds 5MB limit");
        assert_eq!(err.kind(), "file_too_large");

        let err = ValidationError::TooManyFiles { max: 5, attempted: 7 };
        assert_eq!(err.to_string(), "Too many files: maximum 5 files allowed");
    }

    #[test]
    fn test_accept_pattern_wildcard_mime() {
        let accept = AcceptPattern::parse("image/*");
        assert!(accept.matches("a.png", Some("image/png")));
        assert!(!accept.matches("a.pdf", Some("application/pdf")));
        assert!(!accept.matches("mystery", None));
    }

    #[test]
    fn test_accept_pattern_extensions() {
        let accept = AcceptPattern::parse(".pdf,.doc,.docx,.xls,.xlsx,.txt");
        assert!(accept.matches("Term1.PDF", None));
        assert!(accept.matches("marks.xlsx", Some("application/octet-stream")));
        assert!(!accept.matches("photo.jpg", Some("image/jpeg")));
    }

    #[test]
    fn test_accept_pattern_exact_mime_and_any() {
        let accept = AcceptPattern::parse("text/plain; charset=utf-8");
        assert!(accept.matches("x", Some("text/plain")));
        assert!(AcceptPattern::parse("").is_any());
        assert!(AcceptPattern::parse("*/*").matches("x.bin", None));
    }
}
