//! User model for the local session store.

use serde::{Deserialize, Serialize};

use super::session::ProviderSession;

/// Display name given to guest users.
pub const GUEST_DISPLAY_NAME: &str = "Guest User";

/// Display name used when the provider gives neither a name nor an email.
const FALLBACK_DISPLAY_NAME: &str = "User";

/// How the user signed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Google,
    Guest,
}

/// Signed-in user, persisted under the user key as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Opaque identifier (provider user id, or `guest_…`)
    pub id: String,
    /// Email address (empty for guests)
    #[serde(default)]
    pub email: String,
    /// Display name
    pub name: String,
    /// Profile picture URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub provider: AuthProvider,
}

impl User {
    /// Synthesize a guest identity with a fresh unique id.
    pub fn guest() -> Self {
        Self {
            id: format!("guest_{}", uuid::Uuid::new_v4().simple()),
            email: String::new(),
            name: GUEST_DISPLAY_NAME.to_string(),
            avatar: None,
            provider: AuthProvider::Guest,
        }
    }

    /// Map an identity-provider session onto a Google user.
    pub fn from_session(session: &ProviderSession) -> Self {
        let profile = &session.user;
        let email = profile.email.clone().unwrap_or_default();
        let metadata = &profile.user_metadata;

        let name = non_blank(metadata.full_name.as_deref())
            .or_else(|| non_blank(Some(email.as_str())))
            .unwrap_or(FALLBACK_DISPLAY_NAME)
            .to_string();

        let avatar = non_blank(metadata.avatar_url.as_deref())
            .or_else(|| non_blank(metadata.picture.as_deref()))
            .map(str::to_string);

        Self {
            id: profile.id.clone(),
            email,
            name,
            avatar,
            provider: AuthProvider::Google,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.provider == AuthProvider::Guest
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
