//! Encoding of multi-get batch request bodies

use crate::encoding::{encode, encoded_entry};

/// One entry of a batch get: a bare key, or a key with refinements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchGetParam {
    /// Get the key with no refinements
    Key(String),
    /// Get the key with an optional attachment name and expiry
    KeyWithOptions {
        /// Key inside the service's table
        key: String,
        /// File name suggested to downloaders
        att_name: Option<String>,
        /// URL validity in seconds
        expires: Option<u64>,
    },
}

impl BatchGetParam {
    /// A bare key
    pub fn key(key: impl Into<String>) -> Self {
        BatchGetParam::Key(key.into())
    }

    /// Set the attachment name, turning a bare key into a refined one
    pub fn with_att_name(self, att_name: impl Into<String>) -> Self {
        let (key, _, expires) = self.into_fields();
        BatchGetParam::KeyWithOptions {
            key,
            att_name: Some(att_name.into()),
            expires,
        }
    }

    /// Set the URL validity, turning a bare key into a refined one
    pub fn with_expires(self, seconds: u64) -> Self {
        let (key, att_name, _) = self.into_fields();
        BatchGetParam::KeyWithOptions {
            key,
            att_name,
            expires: Some(seconds),
        }
    }

    /// The key this entry refers to
    pub fn key_str(&self) -> &str {
        match self {
            BatchGetParam::Key(key) | BatchGetParam::KeyWithOptions { key, .. } => key,
        }
    }

    fn into_fields(self) -> (String, Option<String>, Option<u64>) {
        match self {
            BatchGetParam::Key(key) => (key, None, None),
            BatchGetParam::KeyWithOptions {
                key,
                att_name,
                expires,
            } => (key, att_name, expires),
        }
    }
}

impl From<&str> for BatchGetParam {
    fn from(key: &str) -> Self {
        BatchGetParam::Key(key.to_string())
    }
}

impl From<String> for BatchGetParam {
    fn from(key: String) -> Self {
        BatchGetParam::Key(key)
    }
}

/// Path of a single get, as used by both `/get/` and batch `op=` fragments.
///
/// Empty attachment names and zero expiries are left out.
pub fn get_path(table: &str, key: &str, att_name: Option<&str>, expires: Option<u64>) -> String {
    let mut path = format!("/get/{}", encoded_entry(table, key));
    if let Some(name) = att_name.filter(|n| !n.is_empty()) {
        path.push_str("/attName/");
        path.push_str(&encode(name));
    }
    if let Some(seconds) = expires.filter(|s| *s > 0) {
        path.push_str("/expires/");
        path.push_str(&seconds.to_string());
    }
    path
}

/// Encode a batch get body: `op=<path>` fragments joined by `&`, in input
/// order. The service answers with results in the same order.
pub fn encode_batch_get(table: &str, params: &[BatchGetParam]) -> String {
    params
        .iter()
        .map(|param| match param {
            BatchGetParam::Key(key) => get_path(table, key, None, None),
            BatchGetParam::KeyWithOptions {
                key,
                att_name,
                expires,
            } => get_path(table, key, att_name.as_deref(), *expires),
        })
        .fold(String::new(), |mut body, path| {
            if !body.is_empty() {
                body.push('&');
            }
            body.push_str("op=");
            body.push_str(&path);
            body
        })
}
