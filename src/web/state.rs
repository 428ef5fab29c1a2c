//! Shared application state.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::hashing::PasswordHasher;
use crate::storage::Storage;

/// Everything a handler needs. Handlers hold the lock for the whole request,
/// so each request sees and commits a consistent view of the database.
pub struct AppState {
    pub storage: Storage,
    pub hasher: PasswordHasher,
}

pub type SharedState = Arc<Mutex<AppState>>;

pub fn shared_state(storage: Storage, hasher: PasswordHasher) -> SharedState {
    Arc::new(Mutex::new(AppState { storage, hasher }))
}
