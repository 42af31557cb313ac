//! Session state and its persistence.
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐
//! │  AuthController  │   │  RequestGateway  │
//! └────────┬─────────┘   └────────┬─────────┘
//!          │ set / clear          │ get / clear_if_current
//!          ▼                      ▼
//! ┌─────────────────────────────────────────┐
//! │              SessionStore               │
//! │  (watch channel of Session snapshots)   │
//! └────────────────────┬────────────────────┘
//!                      │ best-effort
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │        CredentialStorage Trait          │
//! └─────────────────────────────────────────┘
//! ```

mod model;
mod storage;
mod store;

pub use model::{Credential, Identity, Session};
pub use storage::{
    CredentialStorage, FileCredentialStorage, MemoryCredentialStorage, CREDENTIAL_KEY,
};
pub use store::SessionStore;
