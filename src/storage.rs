use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::models::AdminProfile;

/// Stored admin token.
pub const TOKEN_KEY: &str = "adminToken";
/// Serialized `AdminProfile` of the last successful fetch.
pub const PROFILE_KEY: &str = "adminUser";
/// Which kind of session the login screen established ("admin", "agent", ...).
pub const SESSION_TYPE_KEY: &str = "userType";

// 1. SessionStore Contract
/// SessionStore
///
/// Abstract contract over the browser-side key/value storage that holds the
/// session (local storage in the browser, an in-memory map in tests and native
/// hosts). Only the session provider writes to it.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
    /// Drops every session entry, token included.
    fn clear(&self);
}

/// SessionStoreState
///
/// The concrete type used to share the store with the provider.
pub type SessionStoreState = Arc<dyn SessionStore>;

// 2. Typed helpers over the raw keys
/// Reads the stored admin token, ignoring empty values.
pub fn stored_token(store: &dyn SessionStore) -> Option<String> {
    store.get(TOKEN_KEY).filter(|token| !token.trim().is_empty())
}

/// Reads the stored session type, lowercased.
pub fn stored_session_type(store: &dyn SessionStore) -> Option<String> {
    store
        .get(SESSION_TYPE_KEY)
        .map(|kind| kind.trim().to_lowercase())
        .filter(|kind| !kind.is_empty())
}

/// Reads the mirrored profile. A corrupt entry reads as absent.
pub fn stored_profile(store: &dyn SessionStore) -> Option<AdminProfile> {
    store
        .get(PROFILE_KEY)
        .and_then(|raw| serde_json::from_str(&raw).ok())
}

/// Mirrors a freshly fetched profile into storage.
pub fn store_profile(store: &dyn SessionStore, profile: &AdminProfile) {
    match serde_json::to_string(profile) {
        Ok(raw) => store.set(PROFILE_KEY, raw),
        Err(e) => tracing::warn!(error = %e, "could not serialize admin profile"),
    }
}

// 3. In-memory implementation
/// MemorySessionStore
///
/// `RwLock<HashMap>` backed store. Used by native hosts and throughout the
/// test-suite.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a store the way the login screen leaves it.
    pub fn with_session(token: &str, session_type: &str) -> Self {
        let store = Self::new();
        store.set(TOKEN_KEY, token.to_string());
        store.set(SESSION_TYPE_KEY, session_type.to_string());
        store
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().map(|e| e.is_empty()).unwrap_or(true)
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), value);
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}
