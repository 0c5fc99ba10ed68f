//! Data types exchanged with the resource storage service

use serde::{Deserialize, Serialize};

/// A successful reply: the server status and the decoded payload.
///
/// Failures are reported as [`crate::Error`], whose
/// [`code`](crate::Error::code) stands in for the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<T> {
    /// HTTP status returned by the service
    pub code: u16,
    /// Decoded response body
    pub data: T,
}

impl<T> Reply<T> {
    /// Split into `(data, code)`
    pub fn into_parts(self) -> (T, u16) {
        (self.data, self.code)
    }

    /// Transform the payload, keeping the status
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        Reply {
            code: self.code,
            data: f(self.data),
        }
    }
}

/// Outcome of one dispatcher call
pub type CallResult<T> = crate::error::Result<Reply<T>>;

/// Response from `/put-auth/`: a short-lived anonymous upload URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutAuthRet {
    /// URL accepting an anonymous upload
    pub url: String,
    /// Seconds until the URL expires
    #[serde(default)]
    pub expires_in: u64,
}

/// Response from an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutRet {
    /// Content hash of the stored value
    pub hash: String,
}

/// Response from `/get/`: a short-lived anonymous download URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRet {
    /// URL serving the entry's content
    pub url: String,
    /// Content hash
    #[serde(default)]
    pub hash: String,
    /// Mime type recorded at upload
    #[serde(default)]
    pub mime_type: String,
    /// Size in bytes
    #[serde(default)]
    pub fsize: u64,
    /// Seconds until the URL expires
    #[serde(default)]
    pub expires: u64,
}

/// Entry attributes returned by `/stat/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Content hash
    pub hash: String,
    /// Size in bytes
    pub fsize: u64,
    /// Upload time, in units of 100ns since the Unix epoch
    pub put_time: i64,
    /// Mime type recorded at upload
    #[serde(default)]
    pub mime_type: String,
}

/// Payload of one batch result: a download grant or an error message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchGetData {
    /// The sub-operation failed
    Failure {
        /// Error message from the service
        error: String,
    },
    /// The sub-operation succeeded
    Success(GetRet),
}

/// Result of one get inside a batch, in the same position as its request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchGetItem {
    /// Status of this sub-operation
    pub code: u16,
    /// Payload of this sub-operation
    pub data: BatchGetData,
}

impl BatchGetItem {
    /// True if this sub-operation succeeded
    pub fn is_ok(&self) -> bool {
        matches!(self.data, BatchGetData::Success(_)) && (200..300).contains(&self.code)
    }

    /// The download grant, if this sub-operation succeeded
    pub fn ret(&self) -> Option<&GetRet> {
        match &self.data {
            BatchGetData::Success(ret) => Some(ret),
            BatchGetData::Failure { .. } => None,
        }
    }

    /// The error message, if this sub-operation failed
    pub fn error(&self) -> Option<&str> {
        match &self.data {
            BatchGetData::Failure { error } => Some(error),
            BatchGetData::Success(_) => None,
        }
    }
}
