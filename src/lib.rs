//! # MedScan Client
//!
//! Client for a medical image analysis API: authenticate, submit a chest
//! X-ray for classification, and read back the prediction with its
//! explanation images.
//!
//! ## Features
//!
//! - **Persistent sessions**: the bearer credential survives restarts and is
//!   re-validated against the identity endpoint on startup
//! - **Central request gateway**: bearer injection and one failure taxonomy
//!   for every call; a rejected session is cleared exactly once
//! - **Client-side validation**: non-images and files over 10 MiB never
//!   reach the network
//! - **Stale-response guard**: only the latest selected file can produce a
//!   visible result
//!
//! ## Architecture
//!
//! - [`session`] - Session snapshots, the shared store and credential storage
//! - [`gateway`] - Request gateway and the reqwest-backed transport
//! - [`auth`] - Login, registration, logout and rehydration
//! - [`analysis`] - Upload validation, the analysis workflow and result reports
//! - [`history`] - Past predictions and dashboard counts
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use medscan_client::{
//!     AnalysisController, AuthController, FileCredentialStorage, HttpTransport,
//!     RequestGateway, SessionStore, UploadCandidate, DEFAULT_TIMEOUT,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = HttpTransport::new("http://localhost:8000", DEFAULT_TIMEOUT)?;
//!     let storage = Arc::new(FileCredentialStorage::new("/tmp/medscan"));
//!     let session = Arc::new(SessionStore::open(storage).await);
//!     let gateway = Arc::new(RequestGateway::new(transport, session));
//!
//!     let auth = AuthController::new(gateway.clone());
//!     auth.login("alice@example.com", "secret").await?;
//!
//!     let analysis = AnalysisController::new(gateway);
//!     let candidate = UploadCandidate::from_path("chest.jpg", None).await?;
//!     let outcome = analysis.select_file(candidate).await;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod history;
pub mod session;

// Re-export commonly used types
pub use analysis::{
    AnalysisController, AnalysisResult, AttemptOutcome, AttemptSnapshot, ConfidenceBand, Panel,
    PredictionRecord, ResultReport, UploadCandidate, UploadValidator, WorkflowState,
    MAX_UPLOAD_BYTES,
};
pub use auth::{AuthController, RehydrateOutcome, SESSION_EXPIRED_NOTICE};
pub use config::{Cli, Command};
pub use error::{
    AuthError, ClientError, FailureReason, GatewayError, StorageError, TransportError,
    ValidationError,
};
pub use gateway::{ApiRequest, HttpTransport, RequestGateway, Transport, DEFAULT_TIMEOUT};
pub use history::{HistoryService, HistorySummary};
pub use session::{
    Credential, CredentialStorage, FileCredentialStorage, Identity, MemoryCredentialStorage,
    Session, SessionStore,
};
