//! Unified error taxonomy with stable error codes for the scan-orchestration engine.
//!
//! Every engine error carries an [`ErrorCode`] (a machine-readable, stable string
//! tag), a human-readable message, an optional cause chain, and arbitrary
//! key-value context. Use the builder returned by [`ScanOptError::new`] to
//! construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
///
/// These mirror the error kinds enumerated for the orchestrator: every
/// category but [`ErrorCategory::Configuration`] is recoverable mid-run and
/// is carried forward as an issue rather than propagated as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Package-to-provenance resolution errors.
    Resolution,
    /// Provenance materialization (download) errors.
    Download,
    /// Scanner backend invocation errors.
    Scanner,
    /// Result-storage read errors.
    StorageRead,
    /// Result-storage write errors.
    StorageWrite,
    /// Configuration validation errors, surfaced synchronously at construction.
    Configuration,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Resolution => "resolution",
            Self::Download => "download",
            Self::Scanner => "scanner",
            Self::StorageRead => "storage_read",
            Self::StorageWrite => "storage_write",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Resolution --
    /// A package's source provenance could not be determined.
    ResolutionUnknownProvenance,
    /// Decomposing a provenance into its nested sub-repository tree failed.
    ResolutionNestedTreeFailed,

    // -- Download --
    /// A provenance could not be materialized to a local directory.
    DownloadFailed,
    /// The downloaded archive or checkout did not match the expected content hash / revision.
    DownloadIntegrityMismatch,

    // -- Scanner --
    /// A scanner backend invocation failed.
    ScannerInvocationFailed,
    /// A scanner backend invocation exceeded its configured timeout.
    ScannerTimeout,

    // -- Storage --
    /// Reading a cached result from storage failed.
    StorageReadFailed,
    /// Writing a result to storage failed.
    StorageWriteFailed,

    // -- Configuration --
    /// No scanner backends were configured.
    ConfigNoBackends,
    /// Scanner criteria overrides are contradictory (e.g. an unsatisfiable version range).
    ConfigContradictoryCriteria,
    /// Configuration file or value is otherwise invalid.
    ConfigInvalid,

    // -- Internal --
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ResolutionUnknownProvenance | Self::ResolutionNestedTreeFailed => {
                ErrorCategory::Resolution
            }

            Self::DownloadFailed | Self::DownloadIntegrityMismatch => ErrorCategory::Download,

            Self::ScannerInvocationFailed | Self::ScannerTimeout => ErrorCategory::Scanner,

            Self::StorageReadFailed => ErrorCategory::StorageRead,
            Self::StorageWriteFailed => ErrorCategory::StorageWrite,

            Self::ConfigNoBackends | Self::ConfigContradictoryCriteria | Self::ConfigInvalid => {
                ErrorCategory::Configuration
            }

            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"DOWNLOAD_FAILED"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResolutionUnknownProvenance => "RESOLUTION_UNKNOWN_PROVENANCE",
            Self::ResolutionNestedTreeFailed => "RESOLUTION_NESTED_TREE_FAILED",
            Self::DownloadFailed => "DOWNLOAD_FAILED",
            Self::DownloadIntegrityMismatch => "DOWNLOAD_INTEGRITY_MISMATCH",
            Self::ScannerInvocationFailed => "SCANNER_INVOCATION_FAILED",
            Self::ScannerTimeout => "SCANNER_TIMEOUT",
            Self::StorageReadFailed => "STORAGE_READ_FAILED",
            Self::StorageWriteFailed => "STORAGE_WRITE_FAILED",
            Self::ConfigNoBackends => "CONFIG_NO_BACKENDS",
            Self::ConfigContradictoryCriteria => "CONFIG_CONTRADICTORY_CRITERIA",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ScanOptError
// ---------------------------------------------------------------------------

/// Unified scan-orchestrator error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use scanopt_error::{ScanOptError, ErrorCode};
///
/// let err = ScanOptError::new(ErrorCode::ScannerTimeout, "timed out after 30 s")
///     .with_context("scanner", "licensee")
///     .with_context("timeout_ms", 30_000);
/// ```
pub struct ScanOptError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl ScanOptError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Returns `true` for errors that must abort the run rather than be
    /// carried forward as a synthetic issue.
    ///
    /// Only [`ErrorCategory::Configuration`] is fatal; every other category
    /// is recoverable per-item.
    pub fn is_fatal(&self) -> bool {
        matches!(self.category(), ErrorCategory::Configuration)
    }
}

impl fmt::Debug for ScanOptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ScanOptError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for ScanOptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ScanOptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`ScanOptError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanOptErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&ScanOptError> for ScanOptErrorDto {
    fn from(err: &ScanOptError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<ScanOptErrorDto> for ScanOptError {
    fn from(dto: ScanOptErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io;

    /// All error codes for exhaustive iteration in tests.
    const ALL_CODES: &[ErrorCode] = &[
        ErrorCode::ResolutionUnknownProvenance,
        ErrorCode::ResolutionNestedTreeFailed,
        ErrorCode::DownloadFailed,
        ErrorCode::DownloadIntegrityMismatch,
        ErrorCode::ScannerInvocationFailed,
        ErrorCode::ScannerTimeout,
        ErrorCode::StorageReadFailed,
        ErrorCode::StorageWriteFailed,
        ErrorCode::ConfigNoBackends,
        ErrorCode::ConfigContradictoryCriteria,
        ErrorCode::ConfigInvalid,
        ErrorCode::Internal,
    ];

    // -- Construction & Display -----------------------------------------

    #[test]
    fn basic_construction() {
        let err = ScanOptError::new(ErrorCode::Internal, "boom");
        assert_eq!(err.code, ErrorCode::Internal);
        assert_eq!(err.message, "boom");
        assert!(err.source.is_none());
        assert!(err.context.is_empty());
    }

    #[test]
    fn display_without_context() {
        let err = ScanOptError::new(ErrorCode::DownloadFailed, "could not fetch archive");
        assert_eq!(
            err.to_string(),
            "[DOWNLOAD_FAILED] could not fetch archive"
        );
    }

    #[test]
    fn display_with_context() {
        let err = ScanOptError::new(ErrorCode::ScannerTimeout, "timed out")
            .with_context("timeout_ms", 5000);
        let s = err.to_string();
        assert!(s.starts_with("[SCANNER_TIMEOUT] timed out"));
        assert!(s.contains("timeout_ms"));
        assert!(s.contains("5000"));
    }

    #[test]
    fn debug_impl() {
        let err = ScanOptError::new(ErrorCode::ConfigNoBackends, "no backends configured");
        let dbg = format!("{err:?}");
        assert!(dbg.contains("ConfigNoBackends"));
        assert!(dbg.contains("no backends configured"));
    }

    #[test]
    fn debug_with_source() {
        let src = io::Error::new(io::ErrorKind::NotFound, "file missing");
        let err = ScanOptError::new(ErrorCode::DownloadFailed, "download failed").with_source(src);
        let dbg = format!("{err:?}");
        assert!(dbg.contains("source"));
        assert!(dbg.contains("file missing"));
    }

    // -- Error code categorization --------------------------------------

    #[test]
    fn resolution_codes_categorised() {
        assert_eq!(
            ErrorCode::ResolutionUnknownProvenance.category(),
            ErrorCategory::Resolution
        );
        assert_eq!(
            ErrorCode::ResolutionNestedTreeFailed.category(),
            ErrorCategory::Resolution
        );
    }

    #[test]
    fn download_codes_categorised() {
        assert_eq!(ErrorCode::DownloadFailed.category(), ErrorCategory::Download);
        assert_eq!(
            ErrorCode::DownloadIntegrityMismatch.category(),
            ErrorCategory::Download
        );
    }

    #[test]
    fn scanner_codes_categorised() {
        assert_eq!(
            ErrorCode::ScannerInvocationFailed.category(),
            ErrorCategory::Scanner
        );
        assert_eq!(ErrorCode::ScannerTimeout.category(), ErrorCategory::Scanner);
    }

    #[test]
    fn storage_codes_categorised() {
        assert_eq!(
            ErrorCode::StorageReadFailed.category(),
            ErrorCategory::StorageRead
        );
        assert_eq!(
            ErrorCode::StorageWriteFailed.category(),
            ErrorCategory::StorageWrite
        );
    }

    #[test]
    fn config_codes_categorised() {
        assert_eq!(
            ErrorCode::ConfigNoBackends.category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            ErrorCode::ConfigContradictoryCriteria.category(),
            ErrorCategory::Configuration
        );
        assert_eq!(ErrorCode::ConfigInvalid.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn internal_code_categorised() {
        assert_eq!(ErrorCode::Internal.category(), ErrorCategory::Internal);
    }

    // -- Fatality -------------------------------------------------------

    #[test]
    fn only_configuration_errors_are_fatal() {
        for code in ALL_CODES {
            let err = ScanOptError::new(*code, "x");
            assert_eq!(
                err.is_fatal(),
                err.category() == ErrorCategory::Configuration,
                "unexpected fatality for {code:?}"
            );
        }
    }

    // -- Builder pattern ------------------------------------------------

    #[test]
    fn builder_with_context_multiple_keys() {
        let err = ScanOptError::new(ErrorCode::ScannerTimeout, "timeout")
            .with_context("scanner", "licensee")
            .with_context("timeout_ms", 30_000)
            .with_context("retries", 3);
        assert_eq!(err.context.len(), 3);
        assert_eq!(err.context["scanner"], serde_json::json!("licensee"));
        assert_eq!(err.context["timeout_ms"], serde_json::json!(30_000));
        assert_eq!(err.context["retries"], serde_json::json!(3));
    }

    #[test]
    fn builder_with_source() {
        let src = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = ScanOptError::new(ErrorCode::StorageReadFailed, "denied").with_source(src);
        assert!(err.source.is_some());
        let displayed = err.source.as_ref().unwrap().to_string();
        assert_eq!(displayed, "access denied");
    }

    #[test]
    fn builder_chaining_all() {
        let src = io::Error::other("underlying");
        let err = ScanOptError::new(ErrorCode::ConfigInvalid, "bad config")
            .with_context("file", "scanopt.toml")
            .with_source(src);
        assert_eq!(err.code, ErrorCode::ConfigInvalid);
        assert_eq!(err.context["file"], serde_json::json!("scanopt.toml"));
        assert!(err.source.is_some());
    }

    #[test]
    fn category_shorthand() {
        let err = ScanOptError::new(ErrorCode::ResolutionUnknownProvenance, "unknown provenance");
        assert_eq!(err.category(), ErrorCategory::Resolution);
    }

    // -- Serialization / Deserialization --------------------------------

    #[test]
    fn error_code_serde_roundtrip() {
        let code = ErrorCode::DownloadFailed;
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, r#""DOWNLOAD_FAILED""#);
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }

    #[test]
    fn error_category_serde_roundtrip() {
        let cat = ErrorCategory::Scanner;
        let json = serde_json::to_string(&cat).unwrap();
        assert_eq!(json, r#""scanner""#);
        let back: ErrorCategory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cat);
    }

    #[test]
    fn dto_roundtrip_without_source() {
        let err = ScanOptError::new(ErrorCode::ScannerInvocationFailed, "bad invocation")
            .with_context("scanner", "scancode");
        let dto: ScanOptErrorDto = (&err).into();
        let json = serde_json::to_string(&dto).unwrap();
        let back: ScanOptErrorDto = serde_json::from_str(&json).unwrap();
        assert_eq!(dto, back);
        assert!(back.source_message.is_none());
    }

    #[test]
    fn dto_roundtrip_with_source() {
        let src = io::Error::new(io::ErrorKind::BrokenPipe, "pipe broke");
        let err = ScanOptError::new(ErrorCode::ScannerInvocationFailed, "crash").with_source(src);
        let dto: ScanOptErrorDto = (&err).into();
        assert_eq!(dto.source_message.as_deref(), Some("pipe broke"));
        let json = serde_json::to_string(&dto).unwrap();
        assert!(json.contains("pipe broke"));
    }

    #[test]
    fn dto_to_scanopt_error() {
        let dto = ScanOptErrorDto {
            code: ErrorCode::ConfigInvalid,
            message: "bad".into(),
            context: BTreeMap::new(),
            source_message: Some("inner".into()),
        };
        let err: ScanOptError = dto.into();
        assert_eq!(err.code, ErrorCode::ConfigInvalid);
        // Source is lost in DTO → ScanOptError conversion (opaque type).
        assert!(err.source.is_none());
    }

    // -- Error chain (source) preservation ------------------------------

    #[test]
    fn std_error_source_chain() {
        let inner = io::Error::new(io::ErrorKind::NotFound, "not found");
        let err = ScanOptError::new(ErrorCode::DownloadFailed, "staging").with_source(inner);
        let src = std::error::Error::source(&err).unwrap();
        assert_eq!(src.to_string(), "not found");
    }

    #[test]
    fn std_error_source_none_by_default() {
        let err = ScanOptError::new(ErrorCode::Internal, "oops");
        assert!(std::error::Error::source(&err).is_none());
    }

    // -- Unique string representations ----------------------------------

    #[test]
    fn all_codes_have_unique_as_str() {
        let mut seen = HashSet::new();
        for code in ALL_CODES {
            let s = code.as_str();
            assert!(seen.insert(s), "duplicate as_str value: {s}");
        }
        assert_eq!(seen.len(), ALL_CODES.len());
    }

    #[test]
    fn all_codes_display_matches_as_str() {
        for code in ALL_CODES {
            assert_eq!(code.to_string(), code.as_str());
        }
    }

    #[test]
    fn error_code_count() {
        // Ensure we don't silently drop a variant from ALL_CODES.
        assert_eq!(ALL_CODES.len(), 12);
    }

    #[test]
    fn all_codes_serialize_to_as_str() {
        for code in ALL_CODES {
            let json = serde_json::to_string(code).unwrap();
            let expected = format!(r#""{}""#, code.as_str());
            assert_eq!(json, expected, "mismatch for {code:?}");
        }
    }

    #[test]
    fn error_category_display() {
        assert_eq!(ErrorCategory::Resolution.to_string(), "resolution");
        assert_eq!(ErrorCategory::StorageRead.to_string(), "storage_read");
        assert_eq!(ErrorCategory::Internal.to_string(), "internal");
    }

    #[test]
    fn context_with_nested_json() {
        let err = ScanOptError::new(ErrorCode::Internal, "nested")
            .with_context("details", serde_json::json!({"a": 1, "b": [2, 3]}));
        assert_eq!(
            err.context["details"],
            serde_json::json!({"a": 1, "b": [2, 3]})
        );
    }
}
