//! reqwest-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{ClientError, TransportError};

use super::transport::{ApiResponse, OutboundRequest, RequestBody, Transport};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connect timeout, kept short so an unreachable API fails fast.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport that talks HTTP to the API at `base_url`.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport for the API rooted at `base_url`.
    ///
    /// Request paths are resolved relative to the base URL, so a base with
    /// a path prefix (`https://host/medscan`) keeps that prefix.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = normalize_base_url(base_url)?;

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::Request(format!("invalid path '{}': {}", path, e)))
    }
}

/// Parse a base URL and make sure its path ends with `/`.
pub fn normalize_base_url(base_url: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

fn classify_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connection(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: OutboundRequest) -> Result<ApiResponse, TransportError> {
        let url = self.endpoint(&request.path)?;
        debug!(method = %request.method, url = %url, "Sending request");

        let mut builder = self.client.request(request.method, url);

        if let Some(credential) = &request.bearer {
            builder = builder.bearer_auth(credential.expose());
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart(file) => {
                let part = Part::bytes(file.contents.to_vec())
                    .file_name(file.file_name)
                    .mime_str(&file.mime_type)
                    .map_err(|e| TransportError::Request(e.to_string()))?;
                builder.multipart(Form::new().part(file.field, part))
            }
        };

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(classify_reqwest_error)?;

        debug!(status = status.as_u16(), bytes = body.len(), "Received response");
        Ok(ApiResponse { status, body })
    }
}
