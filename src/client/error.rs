use serde_json::Value;
use thiserror::Error;

/// Pre-flight rejection. Raised before any request leaves the client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No files selected for upload")]
    Empty,

    /// References come back keyed by file name, so names must be unique.
    #[error("File \"{0}\" is selected more than once")]
    DuplicateName(String),

    #[error("File \"{name}\" is {size_mb} MB, exceeding the {limit_mb} MB limit")]
    FileTooLarge {
        name: String,
        size: u64,
        size_mb: String,
        limit_mb: String,
    },

    #[error("Total upload size is {total_mb} MB, exceeding the {limit_mb} MB limit")]
    BatchTooLarge {
        total: u64,
        total_mb: String,
        limit_mb: String,
    },
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success answer from the proxy. `details` is the proxy's diagnostic
    /// body, often the backend's.
    #[error("{endpoint} responded with {status}: {message}")]
    Proxy {
        endpoint: String,
        status: u16,
        message: String,
        details: Value,
    },

    #[error("invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    #[error("failed to read {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("chunk {chunk_index} of {file_name} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        file_name: String,
        chunk_index: u64,
        attempts: u32,
        last_error: Box<UploadError>,
    },
}
