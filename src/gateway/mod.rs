//! Request gateway: the only path from the controllers to the API.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │   AuthController / AnalysisController    │
//! └────────────────────┬─────────────────────┘
//!                      │ ApiRequest
//!                      ▼
//! ┌──────────────────────────────────────────┐
//! │             RequestGateway               │
//! │  bearer injection · failure taxonomy     │
//! │  401 → SessionStore::clear_if_current    │
//! └────────────────────┬─────────────────────┘
//!                      │ OutboundRequest
//!                      ▼
//! ┌──────────────────────────────────────────┐
//! │             Transport Trait              │
//! │        (HttpTransport via reqwest)       │
//! └──────────────────────────────────────────┘
//! ```

mod client;
mod http_transport;
mod transport;

pub use http_transport::{normalize_base_url, HttpTransport, DEFAULT_TIMEOUT};
pub use client::{classify, decode_payload, error_detail, RequestGateway};
pub use transport::{
    ApiRequest, ApiResponse, AuthMode, FilePart, OutboundRequest, RequestBody, Transport,
};

/// API paths consumed by the client.
pub mod endpoints {
    /// Credential exchange (form-encoded `username`, `password`).
    pub const LOGIN: &str = "/api/login";

    /// Account registration (JSON `email`, `username`, `password`).
    pub const REGISTER: &str = "/api/register";

    /// Identity profile of the bearer.
    pub const CURRENT_USER: &str = "/api/users/me";

    /// Image analysis (multipart `file`).
    pub const ANALYZE: &str = "/api/predictions/analyze";

    /// Prediction history of the bearer.
    pub const HISTORY: &str = "/api/predictions/history";

    /// Single prediction by id.
    pub fn prediction(id: i64) -> String {
        format!("/api/predictions/{}", id)
    }
}
