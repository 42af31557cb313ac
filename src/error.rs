use thiserror::Error;

/// Failures where no HTTP response was obtained at all.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request did not complete within the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Could not establish a connection to the API
    #[error("Connection error: {0}")]
    Connection(String),

    /// The request could not be built or sent
    #[error("Request error: {0}")]
    Request(String),
}

/// Classified outcome of a failed gateway call.
///
/// Controllers branch on these kinds only, never on raw transport detail.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// 4xx response other than a rejected session
    #[error("Request rejected ({status}): {detail}")]
    ClientRejected { status: u16, detail: String },

    /// 401 on a call that carried a credential, or an authenticated call
    /// attempted with no credential held
    #[error("Session rejected by server")]
    SessionRejected,

    /// No response obtained
    #[error("API unreachable: {0}")]
    Unreachable(#[from] TransportError),

    /// 5xx response, or a success response whose payload could not be used
    #[error("Server fault ({status}): {detail}")]
    ServerFault { status: u16, detail: String },
}

/// Client-side rejection of an upload candidate. Never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Declared MIME type is not an image type
    #[error("Unsupported file type '{mime}': please select an image file (JPEG, PNG)")]
    UnsupportedType { mime: String },

    /// File exceeds the upload ceiling
    #[error("File size {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    /// File contents could not be read for submission
    #[error("Could not read file: {reason}")]
    Unreadable { reason: String },
}

/// Errors surfaced by the authentication controller.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Server rejected the supplied credentials or registration data
    #[error("{detail}")]
    Credential { status: u16, detail: String },

    /// The credential was rejected on an authenticated call
    #[error("Session expired. Please log in again.")]
    SessionExpired,

    /// No response obtained from the identity endpoints
    #[error("Could not reach the server: {0}")]
    Transport(String),

    /// 5xx or unusable response from the identity endpoints
    #[error("Server error ({status}): {detail}")]
    Server { status: u16, detail: String },
}

impl From<GatewayError> for AuthError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::ClientRejected { status, detail } => {
                AuthError::Credential { status, detail }
            }
            GatewayError::SessionRejected => AuthError::SessionExpired,
            GatewayError::Unreachable(e) => AuthError::Transport(e.to_string()),
            GatewayError::ServerFault { status, detail } => AuthError::Server { status, detail },
        }
    }
}

/// Terminal failure of one analysis attempt.
#[derive(Debug, Clone, Error)]
pub enum FailureReason {
    /// Rejected before submission
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The server refused the file (bad format, unreadable image, ...)
    #[error("Image rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// Credential rejected; the session has been cleared
    #[error("Session expired")]
    SessionExpired,

    /// No response obtained
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    /// 5xx or malformed analysis payload
    #[error("Server error ({status}): {detail}")]
    ServerFault { status: u16, detail: String },
}

impl FailureReason {
    /// Message shown to the user; distinct per failure kind.
    pub fn user_message(&self) -> String {
        match self {
            FailureReason::Validation(e) => format!("{}. Select a different file.", e),
            FailureReason::Rejected { detail, .. } => {
                format!("{}. Select a different file.", detail)
            }
            FailureReason::SessionExpired => {
                "Your session has expired. Please log in again.".to_string()
            }
            FailureReason::Unreachable(_) => {
                "Could not reach the analysis server. Try again later.".to_string()
            }
            FailureReason::ServerFault { .. } => {
                "The analysis server encountered an error. Try again later.".to_string()
            }
        }
    }
}

impl From<GatewayError> for FailureReason {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::ClientRejected { status, detail } => {
                FailureReason::Rejected { status, detail }
            }
            GatewayError::SessionRejected => FailureReason::SessionExpired,
            GatewayError::Unreachable(e) => FailureReason::Unreachable(e.to_string()),
            GatewayError::ServerFault { status, detail } => {
                FailureReason::ServerFault { status, detail }
            }
        }
    }
}

/// Errors from the persisted credential storage.
///
/// These never escape the session store; they are logged and the session
/// falls back to memory for the rest of the run.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Filesystem error
    #[error("Storage I/O error: {0}")]
    Io(String),

    /// Stored value is not a usable credential
    #[error("Corrupt stored credential: {0}")]
    Corrupt(String),
}

/// Errors constructing the client or running CLI-level operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid API base URL
    #[error("Invalid API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local file could not be read
    #[error("Failed to read {path}: {reason}")]
    File { path: String, reason: String },
}
