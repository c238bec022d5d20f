// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity-provider session payload, validated at the boundary.

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// Live session reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Access token expiry (unix seconds)
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: ProviderUser,
}

/// Provider-side user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Profile fields copied from the OAuth identity (Google).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl ProviderSession {
    /// Parse and validate a session from JSON.
    pub fn from_json(raw: &str) -> Result<Self, RemoteError> {
        let session: ProviderSession = serde_json::from_str(raw)
            .map_err(|e| RemoteError::Parse(format!("session payload: {e}")))?;
        session.validate()?;
        Ok(session)
    }

    /// Reject sessions that would put an unusable identity into the app.
    pub fn validate(&self) -> Result<(), RemoteError> {
        if self.access_token.trim().is_empty() {
            return Err(RemoteError::Parse("session without access token".to_string()));
        }
        self.user.validate()
    }

    /// True if the access token expires within `margin_secs` of `now`.
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at
            .map(|exp| now + margin_secs >= exp)
            .unwrap_or(false)
    }
}

impl ProviderUser {
    pub fn validate(&self) -> Result<(), RemoteError> {
        if self.id.trim().is_empty() {
            return Err(RemoteError::Parse("user without id".to_string()));
        }
        Ok(())
    }
}
