//! Error types for the scanner.
//!
//! Everything that aborts a run is a `ScanError`. A register whose bit-field
//! table cannot be found is not an error: it is reported through the
//! exceptions list of the scan report.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the scanner library.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Configuration file could not be read.
    #[error("Failed to read configuration {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid YAML for the expected schema.
    #[error("Failed to parse configuration {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// Requested configuration name is not present in the file.
    #[error("Unknown configuration '{name}'. Available: {}", .available.join(", "))]
    UnknownConfiguration {
        name: String,
        available: Vec<String>,
    },

    /// Configuration is structurally valid but unusable.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A configured pattern does not compile.
    #[error("Invalid {pattern} pattern: {source}")]
    InvalidPattern {
        pattern: &'static str,
        #[source]
        source: regex::Error,
    },

    /// A configured pattern lacks a named group the scanner relies on.
    #[error("The {pattern} pattern has no named group '{group}'")]
    MissingCaptureGroup {
        pattern: &'static str,
        group: &'static str,
    },

    /// A match did not capture a group that is required.
    #[error("The {pattern} pattern matched without capturing '{group}' in line {line:?}")]
    MissingCapture {
        pattern: &'static str,
        group: &'static str,
        line: String,
    },

    /// A captured number could not be parsed.
    #[error("Invalid {field} value '{value}' (expected {radix})")]
    InvalidNumber {
        field: &'static str,
        value: String,
        radix: &'static str,
    },

    /// The text extraction tool failed for a page range.
    #[error("Text extraction failed for pages {start}-{end}: {message}")]
    TextExtraction { start: u32, end: u32, message: String },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// All retry attempts for a download failed.
    #[error("Download failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    /// Downloaded document exceeds the size limit.
    #[error("Response too large: {size} bytes (limit {limit} bytes)")]
    ResponseTooLarge { size: u64, limit: u64 },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error.
    #[error("YAML serialization failed: {0}")]
    YamlSerialization(#[from] serde_yaml_ng::Error),
}

/// Result type alias for scanner operations.
pub type Result<T> = std::result::Result<T, ScanError>;
