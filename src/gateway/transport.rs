use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};

use crate::error::TransportError;
use crate::session::Credential;

/// Whether a request carries the session credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Attach the current bearer credential; fail fast if none is held.
    Bearer,
    /// Never attach a credential (credential exchange, registration).
    Anonymous,
}

/// A file uploaded as one multipart field.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime_type: String,
    pub contents: Bytes,
}

/// Request body encodings used by the API.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// `multipart/form-data` with a single file field
    Multipart(FilePart),
}

/// A request as built by the controllers, before credential injection.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    pub auth: AuthMode,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, body: RequestBody) -> Self {
        Self {
            method,
            path: path.into(),
            body,
            auth: AuthMode::Bearer,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path, RequestBody::Empty)
    }

    pub fn post_json(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, path, RequestBody::Json(body))
    }

    pub fn post_form(path: impl Into<String>, fields: &[(&str, &str)]) -> Self {
        let fields = fields
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self::new(Method::POST, path, RequestBody::Form(fields))
    }

    pub fn post_multipart(path: impl Into<String>, part: FilePart) -> Self {
        Self::new(Method::POST, path, RequestBody::Multipart(part))
    }

    /// Send without a credential.
    pub fn anonymous(mut self) -> Self {
        self.auth = AuthMode::Anonymous;
        self
    }
}

/// A request as handed to the transport, with the credential resolved.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    pub bearer: Option<Credential>,
}

/// Raw HTTP response: status plus body bytes.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Trait for performing one HTTP exchange with the API.
///
/// Any response that arrives, whatever its status, is `Ok`. `Err` means no
/// response was obtained. Implementations must be thread-safe.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<ApiResponse, TransportError>;
}
