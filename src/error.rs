//! Error types for the resource storage client

use std::path::PathBuf;
use thiserror::Error;

/// Status reported for failures detected before any request is sent.
pub const LOCAL_FAILURE: i32 = -1;

/// Status reported when the request never produced a usable response.
pub const TRANSPORT_FAILURE: i32 = -2;

/// HTTP status some gateways use for a network connect timeout.
/// A response carrying it is treated as a transport failure.
pub const NETWORK_TIMEOUT_STATUS: u16 = 599;

/// Errors that can occur when talking to the resource storage service
#[derive(Error, Debug)]
pub enum Error {
    /// A local file could not be opened for upload
    #[error("open file failed: {}", .0.display())]
    FileOpen(PathBuf),

    /// The upload stream ended before the announced length
    #[error("stream ended after {actual} of {expected} bytes")]
    ShortRead {
        /// Bytes the caller announced
        expected: u64,
        /// Bytes actually read
        actual: u64,
    },

    /// The upload stream failed while being read
    #[error("failed to read upload stream: {0}")]
    UploadRead(String),

    /// Table name cannot be used to build an entry address
    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The request could not be assembled
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Credentials could not be attached to the request
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// A path segment was not valid percent-encoded UTF-8
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Network or connection error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request timeout
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// The service answered with a non-success status
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the service
        message: String,
    },

    /// A success response carried a body that is not the expected JSON
    #[error("Malformed response (status {status}): {source}")]
    Decode {
        /// HTTP status code of the response
        status: u16,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Status code this failure reports in place of a server status.
    ///
    /// Local failures are [`LOCAL_FAILURE`], transport failures are
    /// [`TRANSPORT_FAILURE`], everything else carries the HTTP status.
    pub fn code(&self) -> i32 {
        match self {
            Error::FileOpen(_)
            | Error::ShortRead { .. }
            | Error::UploadRead(_)
            | Error::InvalidTable(_)
            | Error::InvalidUrl(_)
            | Error::InvalidRequest(_)
            | Error::Credentials(_)
            | Error::InvalidEncoding(_) => LOCAL_FAILURE,
            Error::Transport(_) | Error::Timeout(_) => TRANSPORT_FAILURE,
            Error::Api { status, .. } | Error::Decode { status, .. } => i32::from(*status),
        }
    }

    /// True if the failure happened before a request was sent
    pub fn is_local(&self) -> bool {
        self.code() == LOCAL_FAILURE
    }

    /// True if the request was sent but no usable response came back
    pub fn is_transport(&self) -> bool {
        self.code() == TRANSPORT_FAILURE
    }

    /// True if the service reported the entry or table as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status: 404 | 612, .. })
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;
