//! Client configuration

use std::env;

use url::Url;

use crate::error::{Error, Result};

/// Default host for upload and upload-authorization calls
pub const DEFAULT_IO_HOST: &str = "http://io.qbox.me";
/// Default host for metadata and management calls
pub const DEFAULT_RS_HOST: &str = "http://rs.qbox.me:10100";
/// Default upper bound for an upload, in milliseconds (5 minutes)
pub const DEFAULT_PUT_TIMEOUT_MS: u64 = 300_000;

/// Configuration options for the resource storage client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Host serving `/put-auth/` and `/rs-put/` (default: http://io.qbox.me)
    pub io_host: String,
    /// Host serving get, stat, batch, publish and delete calls
    /// (default: http://rs.qbox.me:10100)
    pub rs_host: String,
    /// Upload timeout in milliseconds (default: 300000)
    pub put_timeout_ms: u64,
    /// Speak HTTP/2 only, also over plaintext (default: false)
    pub http2_only: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            io_host: DEFAULT_IO_HOST.to_string(),
            rs_host: DEFAULT_RS_HOST.to_string(),
            put_timeout_ms: DEFAULT_PUT_TIMEOUT_MS,
            http2_only: false,
        }
    }
}

impl ClientConfig {
    /// Build a config from `QBOX_IO_HOST`, `QBOX_RS_HOST`,
    /// `QBOX_PUT_TIMEOUT_MS` and `QBOX_HTTP2_ONLY`.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        let io_host = env::var("QBOX_IO_HOST")
            .map(|h| trim_host(&h))
            .unwrap_or_else(|_| DEFAULT_IO_HOST.to_string());
        let rs_host = env::var("QBOX_RS_HOST")
            .map(|h| trim_host(&h))
            .unwrap_or_else(|_| DEFAULT_RS_HOST.to_string());
        let put_timeout_ms = env::var("QBOX_PUT_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_PUT_TIMEOUT_MS);
        let http2_only = env::var("QBOX_HTTP2_ONLY")
            .ok()
            .and_then(|s| parse_flag(&s))
            .unwrap_or(false);

        ClientConfig {
            io_host,
            rs_host,
            put_timeout_ms,
            http2_only,
        }
    }

    /// Point both hosts at a single base URL (handy for proxies and tests)
    pub fn with_host(host: &str) -> Self {
        let host = trim_host(host);
        Self {
            io_host: host.clone(),
            rs_host: host,
            ..Default::default()
        }
    }

    /// Check that both hosts are absolute http(s) URLs
    pub fn validate(&self) -> Result<()> {
        check_host("io_host", &self.io_host)?;
        check_host("rs_host", &self.rs_host)
    }
}

fn trim_host(host: &str) -> String {
    host.trim().trim_end_matches('/').to_string()
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn check_host(name: &str, host: &str) -> Result<()> {
    let url = Url::parse(host).map_err(|e| Error::InvalidUrl(format!("{}: {}", name, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::InvalidUrl(format!(
            "{}: unsupported scheme '{}'",
            name, other
        ))),
    }
}
