//! Credentials attached to every request

use std::fmt;

use http::HeaderValue;

use crate::error::{Error, Result};

/// Supplies the `Authorization` header for outgoing requests.
///
/// Token issuance and refresh live with the implementor; the client only
/// asks for the current value right before each request is sent.
pub trait Credentials: Send + Sync {
    /// Value of the `Authorization` header
    fn authorization(&self) -> Result<HeaderValue>;
}

/// A fixed OAuth2 access token sent as `Bearer <token>`
#[derive(Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    /// Wrap an access token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The raw access token
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("token", &mask(&self.token))
            .finish()
    }
}

impl Credentials for BearerToken {
    fn authorization(&self) -> Result<HeaderValue> {
        if self.token.is_empty() {
            return Err(Error::Credentials("access token is empty".to_string()));
        }
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| Error::Credentials(format!("token is not a valid header value: {}", e)))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

/// Mask a secret for logging
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}
