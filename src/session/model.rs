//! Session value types.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of digest bytes kept in a credential fingerprint.
const FINGERPRINT_BYTES: usize = 6;

// =============================================================================
// Credential
// =============================================================================

/// Opaque bearer token proving an authenticated session.
///
/// The token text is only reachable through [`Credential::expose`]; `Debug`
/// prints a fingerprint so sessions can be logged safely.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Arc<str>);

impl Credential {
    /// Wrap a raw bearer token.
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self(token.into())
    }

    /// Raw token text, for the `Authorization` header and persistence only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short hex fingerprint of the token (first bytes of its SHA-256).
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..FINGERPRINT_BYTES])
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Profile record associated with a credential (`GET /api/users/me`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub email: String,
}

// =============================================================================
// Session
// =============================================================================

/// Current credential/identity pair.
///
/// An identity can only be attached together with the credential it was
/// fetched with; a credential alone is the transient "pending" state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    credential: Option<Credential>,
    identity: Option<Identity>,
}

impl Session {
    /// Session with neither credential nor identity.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Credential obtained but identity not yet verified.
    pub fn pending(credential: Credential) -> Self {
        Self {
            credential: Some(credential),
            identity: None,
        }
    }

    /// Fully authenticated session.
    pub fn authenticated(credential: Credential, identity: Identity) -> Self {
        Self {
            credential: Some(credential),
            identity: Some(identity),
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// True iff both credential and identity are present.
    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some() && self.identity.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.credential.is_none()
    }
}
