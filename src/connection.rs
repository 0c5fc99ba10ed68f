//! Authenticated request dispatch
//!
//! Every call is a `POST` carrying the connection's current credential.
//! The response is mapped onto [`Reply`] on a 2xx status and onto
//! [`Error`] otherwise; nothing is retried here.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Request, Uri};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::io::AsyncRead;
use tracing::{debug, warn};

use crate::auth::{BearerToken, Credentials};
use crate::body::{self, RequestBody, UploadBody};
use crate::config::ClientConfig;
use crate::error::{Error, Result, NETWORK_TIMEOUT_STATUS};
use crate::transport::{HttpTransport, RawResponse, Transport};
use crate::types::{CallResult, Reply};

const OCTET_STREAM: &str = "application/octet-stream";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Error payload returned by the service
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// An authorized handle to the service: its configuration, credentials and
/// a transport.
///
/// The handle holds no per-call state. Sharing it between tasks is as safe
/// as the transport and credentials it wraps.
pub struct Connection<T = HttpTransport> {
    config: ClientConfig,
    credentials: Arc<dyn Credentials>,
    transport: T,
}

impl Connection<HttpTransport> {
    /// Connect with a fixed OAuth2 access token
    pub fn new(token: &str, config: &ClientConfig) -> Result<Self> {
        Self::with_credentials(BearerToken::new(token), config)
    }

    /// Connect with caller-supplied credentials
    pub fn with_credentials(
        credentials: impl Credentials + 'static,
        config: &ClientConfig,
    ) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(
            config.clone(),
            Arc::new(credentials),
            transport,
        ))
    }
}

impl<T: Transport> Connection<T> {
    /// Assemble a connection from its parts
    pub fn with_transport(
        config: ClientConfig,
        credentials: Arc<dyn Credentials>,
        transport: T,
    ) -> Self {
        Self {
            config,
            credentials,
            transport,
        }
    }

    /// Hosts and defaults this connection was built with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Call `url` with an empty body and decode the JSON response.
    pub async fn call<R: DeserializeOwned>(&self, url: &str) -> CallResult<R> {
        let request = self.build_request(url, None, 0, body::full(Bytes::new()))?;
        let raw = self.execute(url, request).await?;
        decode(raw)
    }

    /// Call `url` with an empty body, ignoring the response payload.
    ///
    /// Returns the success status.
    pub async fn call_no_return(&self, url: &str) -> Result<u16> {
        let request = self.build_request(url, None, 0, body::full(Bytes::new()))?;
        let raw = self.execute(url, request).await?;
        Ok(raw.status.as_u16())
    }

    /// Upload exactly `length` bytes read from `stream` to `url`.
    ///
    /// The stream is sent in chunks as it is read, under a
    /// `Content-Length` of `length`. `timeout` bounds reading the stream and
    /// the round trip together. A stream that ends early aborts the request
    /// and fails with [`Error::ShortRead`]; a read error fails with
    /// [`Error::UploadRead`].
    pub async fn call_with_binary<R, S>(
        &self,
        url: &str,
        stream: S,
        length: u64,
        timeout: Duration,
    ) -> CallResult<R>
    where
        R: DeserializeOwned,
        S: AsyncRead + Unpin + Send + 'static,
    {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let body = UploadBody::new(stream, length);
        let failure = body.failure();
        let body = body.boxed();
        let upload = async {
            let request = self.build_request(url, Some(OCTET_STREAM), length, body)?;
            self.execute(url, request).await
        };

        let raw = tokio::time::timeout(timeout, upload)
            .await
            .map_err(|_| Error::Timeout(timeout_ms))?
            // A body that gave up surfaces from the transport as a generic
            // failure; report the read error that caused it.
            .map_err(|e| failure.take().unwrap_or(e))?;
        decode(raw)
    }

    /// Send a pre-encoded form body (`op=...&op=...`) to `url`.
    pub async fn call_with_params<R: DeserializeOwned>(
        &self,
        url: &str,
        params: &str,
    ) -> CallResult<R> {
        let body = body::full(Bytes::copy_from_slice(params.as_bytes()));
        let length = params.len() as u64;
        let request = self.build_request(url, Some(FORM_URLENCODED), length, body)?;
        let raw = self.execute(url, request).await?;
        decode(raw)
    }

    fn build_request(
        &self,
        url: &str,
        content_type: Option<&str>,
        length: u64,
        body: RequestBody,
    ) -> Result<Request<RequestBody>> {
        let uri: Uri = url
            .parse()
            .map_err(|e| Error::InvalidUrl(format!("Invalid request URL: {}", e)))?;

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(AUTHORIZATION, self.credentials.authorization()?)
            .header(CONTENT_LENGTH, length);

        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }

        builder
            .body(body)
            .map_err(|e| Error::InvalidRequest(format!("Failed to build request: {}", e)))
    }

    async fn execute(&self, url: &str, request: Request<RequestBody>) -> Result<RawResponse> {
        debug!("Sending request: POST {}", url);

        let raw = self.transport.send(request).await?;
        let status = raw.status;
        debug!("Response: {} for {}", status.as_u16(), url);

        if status.as_u16() == NETWORK_TIMEOUT_STATUS {
            warn!("Network timeout reported for {}", url);
            return Err(Error::Transport(format!(
                "network timeout (status {})",
                NETWORK_TIMEOUT_STATUS
            )));
        }

        if !status.is_success() {
            let message = error_message(&raw);
            warn!("Request to {} failed with {}: {}", url, status.as_u16(), message);
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(raw)
    }
}

impl<T> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn decode<R: DeserializeOwned>(raw: RawResponse) -> CallResult<R> {
    let status = raw.status.as_u16();
    let data = serde_json::from_slice(&raw.body).map_err(|source| Error::Decode { status, source })?;
    Ok(Reply { code: status, data })
}

/// Pull the message out of an error response, falling back to the raw body
/// and then to the status' reason phrase.
fn error_message(raw: &RawResponse) -> String {
    if let Ok(body) = serde_json::from_slice::<ErrorBody>(&raw.body) {
        return body.error;
    }
    let text = String::from_utf8_lossy(&raw.body).trim().to_string();
    if !text.is_empty() {
        return text;
    }
    raw.status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}
