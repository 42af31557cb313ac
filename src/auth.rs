//! Authentication controller.
//!
//! Orchestrates login, registration, logout and session rehydration
//! against the identity endpoints:
//!
//! ```text
//! login:     POST /api/login (form) ──▶ pending session ──▶ GET /api/users/me ──▶ authenticated
//!                                                                │
//!                                                             failure ──▶ credential cleared
//! register:  POST /api/register (json) ──▶ login
//! rehydrate: stored credential ──▶ GET /api/users/me ──▶ authenticated | cleared + notice
//! logout:    local clear only
//! ```

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{AuthError, GatewayError};
use crate::gateway::{endpoints, ApiRequest, RequestGateway, Transport};
use crate::session::{Credential, Identity, Session, SessionStore};

/// Notice emitted when a persisted session could not be restored.
pub const SESSION_EXPIRED_NOTICE: &str = "Session expired. Please log in again.";

/// Response of the credential exchange.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
}

/// Result of [`AuthController::rehydrate`].
#[derive(Debug, Clone)]
pub enum RehydrateOutcome {
    /// No credential was persisted
    NoSession,
    /// The persisted credential is valid
    Restored(Identity),
    /// The persisted credential could not be verified and was cleared
    Expired { cause: AuthError },
}

impl RehydrateOutcome {
    /// User-facing notice, if any.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            RehydrateOutcome::Expired { .. } => Some(SESSION_EXPIRED_NOTICE),
            _ => None,
        }
    }
}

/// Session operations against the remote identity endpoints.
///
/// Owns the [`SessionStore`] shared with the gateway; every session change
/// made here goes through the store's `set`/`clear` family.
pub struct AuthController<T: Transport> {
    gateway: Arc<RequestGateway<T>>,
    session: Arc<SessionStore>,
}

impl<T: Transport> AuthController<T> {
    pub fn new(gateway: Arc<RequestGateway<T>>) -> Self {
        let session = Arc::clone(gateway.session());
        Self { gateway, session }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// True iff both credential and identity are held. A credential alone
    /// (before rehydration completes) does not count.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.session.get().identity().cloned()
    }

    /// Exchange credentials for a session.
    ///
    /// If the exchange fails the session is left untouched. If the identity
    /// fetch fails after a credential was obtained, that credential is
    /// cleared again.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<Identity, AuthError> {
        let request = ApiRequest::post_form(
            endpoints::LOGIN,
            &[("username", identifier), ("password", secret)],
        )
        .anonymous();

        let token: TokenResponse = self.gateway.send_json(request).await.map_err(|e| {
            debug!(identifier, "Credential exchange failed: {}", e);
            AuthError::from(e)
        })?;

        if token.access_token.trim().is_empty() {
            return Err(AuthError::Server {
                status: 200,
                detail: "malformed payload: empty access_token".to_string(),
            });
        }
        if let Some(kind) = token.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                debug!(token_type = kind, "Unexpected token type, using as bearer");
            }
        }

        let credential = Credential::new(token.access_token);
        self.session.set(Session::pending(credential.clone())).await;

        let identity = match self.fetch_identity().await {
            Ok(identity) => identity,
            Err(e) => {
                self.session.clear_if_current(&credential).await;
                warn!(
                    identifier,
                    credential = %credential.fingerprint(),
                    "Identity fetch failed after login, credential discarded: {}", e
                );
                return Err(e.into());
            }
        };

        let authenticated = Session::authenticated(credential.clone(), identity.clone());
        if !self
            .session
            .replace_if_current(&credential, authenticated)
            .await
        {
            // Logged out (or logged in elsewhere) while the profile was loading.
            return Err(AuthError::SessionExpired);
        }

        info!(
            user_id = identity.id,
            username = %identity.username,
            credential = %credential.fingerprint(),
            "Logged in"
        );
        Ok(identity)
    }

    /// Create an account, then log in with the same credentials.
    ///
    /// Registration alone never yields a session. Server rejections
    /// (duplicate email, invalid fields) are returned verbatim.
    pub async fn register(
        &self,
        email: &str,
        username: &str,
        secret: &str,
    ) -> Result<Identity, AuthError> {
        let request = ApiRequest::post_json(
            endpoints::REGISTER,
            json!({
                "email": email,
                "username": username,
                "password": secret,
            }),
        )
        .anonymous();

        self.gateway.send(request).await.map_err(|e| {
            debug!(email, username, "Registration rejected: {}", e);
            AuthError::from(e)
        })?;

        info!(email, username, "Registered account");
        self.login(email, secret).await
    }

    /// Drop the local session. The API is not contacted.
    pub async fn logout(&self) {
        let was_authenticated = self.session.is_authenticated();
        self.session.clear().await;
        info!(was_authenticated, "Logged out");
    }

    /// Restore a persisted session at startup.
    ///
    /// On any failure (rejected credential, unreachable server, malformed
    /// profile) the credential is logged out rather than left unverified.
    pub async fn rehydrate(&self) -> RehydrateOutcome {
        let session = self.session.get();

        let credential = match session.credential() {
            Some(credential) => credential.clone(),
            None => {
                debug!("No persisted session to restore");
                return RehydrateOutcome::NoSession;
            }
        };

        if let Some(identity) = session.identity() {
            return RehydrateOutcome::Restored(identity.clone());
        }

        match self.fetch_identity().await {
            Ok(identity) => {
                let restored = Session::authenticated(credential.clone(), identity.clone());
                if self.session.replace_if_current(&credential, restored).await {
                    info!(
                        user_id = identity.id,
                        username = %identity.username,
                        "Restored persisted session"
                    );
                    RehydrateOutcome::Restored(identity)
                } else {
                    RehydrateOutcome::NoSession
                }
            }
            Err(e) => {
                // A 401 has already cleared the store in the gateway.
                self.session.clear_if_current(&credential).await;
                warn!(
                    credential = %credential.fingerprint(),
                    "{} ({})", SESSION_EXPIRED_NOTICE, e
                );
                RehydrateOutcome::Expired { cause: e.into() }
            }
        }
    }

    async fn fetch_identity(&self) -> Result<Identity, GatewayError> {
        self.gateway
            .send_json(ApiRequest::get(endpoints::CURRENT_USER))
            .await
    }
}
