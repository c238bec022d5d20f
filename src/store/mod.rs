// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local persisted key/value store.
//!
//! Values are opaque strings (JSON in practice). The session manager and
//! the Supabase client both keep their state here so it survives restarts.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::User;

/// Store keys as constants.
pub mod keys {
    /// Signed-in user record (JSON `User`)
    pub const USER: &str = "@foodmagic_user";
}

/// String key/value persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), AppError>;
}

// ─── User Operations ─────────────────────────────────────────

/// Load the persisted user.
///
/// A record that no longer parses is treated as absent.
pub async fn load_user(store: &dyn SessionStore) -> Result<Option<User>, AppError> {
    let Some(raw) = store.get(keys::USER).await? else {
        return Ok(None);
    };

    match serde_json::from_str::<User>(&raw) {
        Ok(user) => Ok(Some(user)),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unparseable persisted user");
            Ok(None)
        }
    }
}

/// Persist the user, replacing any previous record.
pub async fn save_user(store: &dyn SessionStore, user: &User) -> Result<(), AppError> {
    let json = serde_json::to_string(user)
        .map_err(|e| AppError::Persistence(format!("Failed to serialize user: {e}")))?;
    store.set(keys::USER, &json).await
}

/// Remove the persisted user.
pub async fn clear_user(store: &dyn SessionStore) -> Result<(), AppError> {
    store.remove(keys::USER).await
}
