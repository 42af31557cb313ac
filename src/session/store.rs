//! Session store: the single shared mutable resource of the client.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use super::model::{Credential, Session};
use super::storage::{CredentialStorage, MemoryCredentialStorage};

/// Holder of the current [`Session`] with change notification.
///
/// All mutation goes through [`set`](Self::set) and [`clear`](Self::clear);
/// observers read whole snapshots through [`get`](Self::get) or
/// [`subscribe`](Self::subscribe). Every mutation is mirrored to the
/// credential storage on a best-effort basis: storage failures are logged
/// and the session carries on in memory.
pub struct SessionStore {
    state: watch::Sender<Session>,

    storage: Arc<dyn CredentialStorage>,

    /// Serializes writers so the snapshot and the persisted credential
    /// are updated in the same order.
    write_lock: Mutex<()>,
}

impl SessionStore {
    /// Create an empty store backed by the given storage, without reading it.
    pub fn new(storage: Arc<dyn CredentialStorage>) -> Self {
        let (state, _) = watch::channel(Session::empty());
        Self {
            state,
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Create an empty store that persists nothing across runs.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCredentialStorage::new()))
    }

    /// Create a store seeded from storage.
    ///
    /// A stored credential yields a pending session (credential without
    /// identity); the auth controller must rehydrate it. A storage failure
    /// yields an empty session.
    pub async fn open(storage: Arc<dyn CredentialStorage>) -> Self {
        let store = Self::new(storage);

        match store.storage.load().await {
            Ok(Some(token)) => {
                let credential = Credential::new(token);
                debug!(
                    location = store.storage.location(),
                    credential = %credential.fingerprint(),
                    "Loaded persisted credential"
                );
                store.state.send_replace(Session::pending(credential));
            }
            Ok(None) => {
                debug!(location = store.storage.location(), "No persisted credential");
            }
            Err(e) => {
                warn!(
                    location = store.storage.location(),
                    "Credential storage unavailable, continuing in memory: {}", e
                );
            }
        }

        store
    }

    /// Snapshot of the current session.
    pub fn get(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver notified on every `set`/`clear`.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// True iff the current session holds both credential and identity.
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Replace the session and persist its credential.
    pub async fn set(&self, session: Session) {
        let _guard = self.write_lock.lock().await;
        self.replace(session).await;
    }

    /// Equivalent to `set(Session::empty())`.
    pub async fn clear(&self) {
        self.set(Session::empty()).await;
    }

    /// Clear the session only if it still holds `credential`.
    ///
    /// Returns whether a clear happened. A rejection for a token that has
    /// already been replaced or cleared is a no-op.
    pub async fn clear_if_current(&self, credential: &Credential) -> bool {
        self.replace_if_current(credential, Session::empty()).await
    }

    /// Replace the session only if it still holds `credential`.
    pub async fn replace_if_current(&self, credential: &Credential, session: Session) -> bool {
        let _guard = self.write_lock.lock().await;

        let current = self.state.borrow().credential() == Some(credential);
        if !current {
            debug!(
                credential = %credential.fingerprint(),
                "Credential no longer in use, leaving session unchanged"
            );
            return false;
        }

        self.replace(session).await;
        true
    }

    async fn replace(&self, session: Session) {
        let credential = session.credential().cloned();
        self.state.send_replace(session);

        let result = match &credential {
            Some(credential) => self.storage.save(credential.expose()).await,
            None => self.storage.erase().await,
        };

        if let Err(e) = result {
            warn!(
                location = self.storage.location(),
                "Failed to persist session, continuing in memory: {}", e
            );
        }
    }
}
