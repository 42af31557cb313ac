use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::session::{Credential, SessionStore};

use super::transport::{ApiRequest, ApiResponse, AuthMode, OutboundRequest, Transport};

/// Session-aware request function.
///
/// Injects the bearer credential from the [`SessionStore`], sends the
/// request through the [`Transport`], and classifies the outcome into the
/// [`GatewayError`] kinds. A 401 on a call that carried a credential clears
/// the session before the failure is returned.
pub struct RequestGateway<T: Transport> {
    transport: T,
    session: Arc<SessionStore>,
}

impl<T: Transport> RequestGateway<T> {
    pub fn new(transport: T, session: Arc<SessionStore>) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Send a request and return the raw success payload.
    pub async fn send(&self, request: ApiRequest) -> Result<Bytes, GatewayError> {
        self.execute(request).await.map(|response| response.body)
    }

    /// Send a request and decode the success payload as `R`.
    ///
    /// A payload that does not decode (wrong shape, missing fields, values
    /// out of range) is a [`GatewayError::ServerFault`].
    pub async fn send_json<R: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<R, GatewayError> {
        let path = request.path.clone();
        let response = self.execute(request).await?;
        decode_payload(&response.body).map_err(|detail| {
            warn!(path = %path, "Malformed payload: {}", detail);
            GatewayError::ServerFault {
                status: response.status.as_u16(),
                detail,
            }
        })
    }

    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        let bearer = match request.auth {
            AuthMode::Anonymous => None,
            AuthMode::Bearer => match self.session.get().credential() {
                Some(credential) => Some(credential.clone()),
                None => {
                    debug!(
                        path = %request.path,
                        "No credential held, not sending authenticated request"
                    );
                    return Err(GatewayError::SessionRejected);
                }
            },
        };

        let outbound = OutboundRequest {
            method: request.method,
            path: request.path,
            body: request.body,
            bearer,
        };
        let method = outbound.method.clone();
        let path = outbound.path.clone();
        let bearer = outbound.bearer.clone();

        let response = match self.transport.send(outbound).await {
            Ok(response) => response,
            Err(e) => {
                warn!(method = %method, path = %path, "Request failed without response: {}", e);
                return Err(GatewayError::Unreachable(e));
            }
        };

        debug!(
            method = %method,
            path = %path,
            status = response.status.as_u16(),
            "Request completed"
        );

        match classify(response, bearer.is_some()) {
            Ok(response) => Ok(response),
            Err(GatewayError::SessionRejected) => {
                if let Some(credential) = &bearer {
                    self.reject_session(credential, &path).await;
                }
                Err(GatewayError::SessionRejected)
            }
            Err(e) => Err(e),
        }
    }

    async fn reject_session(&self, credential: &Credential, path: &str) {
        if self.session.clear_if_current(credential).await {
            warn!(
                path = %path,
                credential = %credential.fingerprint(),
                "Session rejected by server, credential cleared"
            );
        }
    }
}

/// Decode a JSON payload, describing the failure on error.
pub fn decode_payload<R: DeserializeOwned>(body: &[u8]) -> Result<R, String> {
    serde_json::from_slice(body).map_err(|e| format!("malformed payload: {}", e))
}

/// Map a response onto the failure taxonomy.
///
/// `carried_credential` distinguishes an expired session (401 on an
/// authenticated call) from rejected credentials (401 on the exchange).
pub fn classify(
    response: ApiResponse,
    carried_credential: bool,
) -> Result<ApiResponse, GatewayError> {
    let status = response.status;

    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED && carried_credential {
        return Err(GatewayError::SessionRejected);
    }

    let detail = error_detail(status, &response.body);
    if status.is_client_error() {
        Err(GatewayError::ClientRejected {
            status: status.as_u16(),
            detail,
        })
    } else {
        Err(GatewayError::ServerFault {
            status: status.as_u16(),
            detail,
        })
    }
}

/// Extract a human-readable reason from an error body.
///
/// Follows the API's `{"detail": ...}` convention: a string detail is used
/// verbatim, a list of validation errors is joined from their `msg` fields.
/// Otherwise the body text, then the status reason, is used.
pub fn error_detail(status: StatusCode, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            Some(serde_json::Value::Array(items)) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .collect();
                if !messages.is_empty() {
                    return messages.join("; ");
                }
            }
            _ => {}
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() {
        return text.to_string();
    }

    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}
