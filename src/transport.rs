//! HTTP transport underneath the dispatcher

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HttpClient;
use hyper_util::rt::TokioExecutor;

use crate::body::RequestBody;
use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Status and collected body of a response
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Full response body
    pub body: Bytes,
}

/// Sends one fully-built request and collects the response.
///
/// Implementations report connection-level failures, including a request
/// body that aborts mid-stream, as [`Error::Transport`]; any status the
/// server returns is passed through.
pub trait Transport: Send + Sync {
    /// Perform the round trip
    fn send(
        &self,
        request: Request<RequestBody>,
    ) -> impl Future<Output = Result<RawResponse>> + Send;
}

/// Build a rustls ClientConfig verifying servers against the webpki roots.
fn build_tls_config() -> Result<rustls::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    Ok(rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Transport(format!("TLS setup failed: {}", e)))?
        .with_root_certificates(roots)
        .with_no_client_auth())
}

type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;

/// Pooled hyper client speaking HTTP/1.1 and HTTP/2, over plaintext or TLS
/// depending on the URL scheme.
#[derive(Clone)]
pub struct HttpTransport {
    http_client: HttpClient<HttpsConnector, RequestBody>,
}

impl HttpTransport {
    /// Create a transport for the given configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let tls_config = build_tls_config()?;

        let builder = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http();
        let https_connector = if config.http2_only {
            builder.enable_http2().build()
        } else {
            builder.enable_all_versions().build()
        };

        let http_client = HttpClient::builder(TokioExecutor::new())
            .http2_only(config.http2_only)
            .build(https_connector);

        Ok(Self { http_client })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: Request<RequestBody>) -> Result<RawResponse> {
        let response = self
            .http_client
            .request(request)
            .await
            .map_err(|e| Error::Transport(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read response body: {}", e)))?
            .to_bytes();

        Ok(RawResponse { status, body })
    }
}
