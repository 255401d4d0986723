//! Error types for the splunk-exporter translation pipeline.

use thiserror::Error;

/// Errors that can occur while talking to Splunk.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, TLS failure, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Splunk answered with a non-success status code.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The configured base URL cannot be used to build a request URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is transient and the call may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidUrl(_) | Self::Other(_) => false,
        }
    }
}

/// Errors raised while decoding a Splunk response.
///
/// Envelope-level variants abort the whole response; row-level variants
/// only cost the offending row.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed response envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("Response has no entry to read content from")]
    MissingEntry,

    #[error("Malformed row {index}: {reason}")]
    MalformedRow { index: usize, reason: String },

    #[error("Row {index} is missing required field \"{field}\"")]
    MissingField { index: usize, field: String },

    #[error("Invalid value {value:?} for field \"{field}\"")]
    InvalidValue { field: String, value: String },
}

impl DecodeError {
    /// Returns `true` if only a single row is affected.
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            Self::MalformedRow { .. } | Self::MissingField { .. } | Self::InvalidValue { .. }
        )
    }
}

/// Errors raised while flattening a health tree.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("unknown health value: {0:?}")]
    UnknownHealthValue(String),
}

/// Per-metric failures surfaced by the managers.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Dimension discovery did not produce a trustworthy label schema.
    #[error("label discovery failed for {metric} in index {index}: {reason}")]
    LabelDiscovery {
        index: String,
        metric: String,
        reason: String,
    },

    /// Two dimensions collapse onto the same label name once normalized.
    #[error("dimensions {first:?} and {second:?} both normalize to label {label:?}")]
    LabelCollision {
        first: String,
        second: String,
        label: String,
    },

    /// Two configured metrics map to one exposed name, e.g. the same metric
    /// in two indexes, or `cpu.load` next to `cpu_load`.
    #[error("metric {requested} would be exposed as {name}, already owned by {owner}")]
    NameCollision {
        name: String,
        owner: String,
        requested: String,
    },

    #[error("metric {metric} expects {expected} label values, got {got}")]
    LabelCount {
        metric: String,
        expected: usize,
        got: usize,
    },
}

/// Errors from loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("error parsing config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
