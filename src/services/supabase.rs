// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase Auth (GoTrue) client.
//!
//! Handles:
//! - Google OAuth URL generation
//! - Session extraction from the OAuth redirect URL
//! - Session persistence in the local store
//! - Token refresh when the access token is about to expire
//! - Remote sign-out

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::config::Config;
use crate::error::{AppError, RemoteError};
use crate::models::{ProviderSession, ProviderUser};
use crate::services::identity::{AuthEvent, AuthEvents, IdentityProvider, OAuthStart};
use crate::store::SessionStore;
use crate::time_utils::unix_now;

/// Refresh the access token when it expires within this many seconds.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Supabase Auth client backed by the local session store.
pub struct SupabaseAuthClient {
    http: reqwest::Client,
    /// `{supabase_url}/auth/v1`
    auth_url: String,
    anon_key: String,
    store: Arc<dyn SessionStore>,
    storage_key: String,
    events: AuthEvents,
    /// Serializes refresh so concurrent callers do not spend the same refresh token twice.
    refresh_lock: Mutex<()>,
}

impl SupabaseAuthClient {
    /// Create a client for the configured Supabase project.
    pub fn new(config: &Config, store: Arc<dyn SessionStore>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed building Supabase HTTP client")?;

        let storage_key = storage_key_for(&config.supabase_url);

        tracing::info!(
            supabase_url = %config.supabase_url,
            storage_key = %storage_key,
            "Initialized Supabase auth client"
        );

        Ok(Self {
            http,
            auth_url: format!("{}/auth/v1", config.supabase_url),
            anon_key: config.supabase_anon_key.clone(),
            store,
            storage_key,
            events: AuthEvents::default(),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Store key holding the serialized session.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Authorization URL for an external provider.
    pub fn authorize_url(&self, provider: &str, redirect_to: &str) -> String {
        format!(
            "{}/authorize?provider={}&redirect_to={}",
            self.auth_url,
            urlencoding::encode(provider),
            urlencoding::encode(redirect_to)
        )
    }

    /// Fetch the project's auth settings (enabled external providers).
    pub async fn settings(&self) -> Result<AuthSettings, AppError> {
        let response = self
            .http
            .get(format!("{}/settings", self.auth_url))
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(provider_error)?;

        check_response_json(response).await
    }

    // ─── Session Storage ─────────────────────────────────────────────────────

    async fn load_session(&self) -> Result<Option<ProviderSession>, AppError> {
        let Some(raw) = self.store.get(&self.storage_key).await? else {
            return Ok(None);
        };

        match ProviderSession::from_json(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable stored session");
                self.store.remove(&self.storage_key).await?;
                Ok(None)
            }
        }
    }

    async fn save_session(&self, session: &ProviderSession) -> Result<(), AppError> {
        let json = serde_json::to_string(session)
            .map_err(|e| AppError::Persistence(format!("Failed to serialize session: {e}")))?;
        self.store.set(&self.storage_key, &json).await
    }

    // ─── Remote Calls ────────────────────────────────────────────────────────

    /// Exchange a refresh token for a new session.
    ///
    /// Returns the raw remote failure so callers can tell a rejected token
    /// (4xx) from a transport problem.
    async fn refresh(&self, refresh_token: &str) -> Result<ProviderSession, RemoteError> {
        let response = self
            .http
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;

        let token: TokenResponse = parse_response_json(response).await?;
        token.into_session()
    }

    /// Load the user behind an access token.
    async fn fetch_user(&self, access_token: &str) -> Result<ProviderUser, AppError> {
        let response = self
            .http
            .get(format!("{}/user", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(provider_error)?;

        let user: ProviderUser = check_response_json(response).await?;
        user.validate()
            .map_err(|e| AppError::Provider(e.to_string()))?;
        Ok(user)
    }

    async fn remote_logout(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(provider_error)?;

        let status = response.status();
        // An already-invalid token means the remote session is gone anyway.
        if status.is_success() || matches!(status.as_u16(), 401 | 403 | 404) {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(AppError::Provider(
            RemoteError::Status {
                status: status.as_u16(),
                body,
            }
            .to_string(),
        ))
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuthClient {
    async fn current_session(&self) -> Result<Option<ProviderSession>, AppError> {
        let _guard = self.refresh_lock.lock().await;

        let Some(session) = self.load_session().await? else {
            return Ok(None);
        };

        if !session.expires_within(unix_now(), REFRESH_MARGIN_SECS) {
            return Ok(Some(session));
        }

        if session.refresh_token.is_empty() {
            tracing::info!("Stored session expired without refresh token");
            self.store.remove(&self.storage_key).await?;
            self.events.emit(AuthEvent::SignedOut);
            return Ok(None);
        }

        tracing::info!(user_id = %session.user.id, "Access token expiring, refreshing");

        match self.refresh(&session.refresh_token).await {
            Ok(refreshed) => {
                self.save_session(&refreshed).await?;
                self.events.emit(AuthEvent::TokenRefreshed(refreshed.clone()));
                Ok(Some(refreshed))
            }
            Err(e @ RemoteError::Status { status: 400..=499, .. }) => {
                // Refresh token rejected: the session is over.
                tracing::warn!(error = %e, "Refresh rejected, dropping session");
                self.store.remove(&self.storage_key).await?;
                self.events.emit(AuthEvent::SignedOut);
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Refresh failed, keeping stored session");
                Err(AppError::Provider(e.to_string()))
            }
        }
    }

    async fn sign_in_with_oauth(
        &self,
        provider: &str,
        redirect_to: &str,
    ) -> Result<OAuthStart, AppError> {
        if provider.trim().is_empty() {
            return Err(AppError::BadRequest("OAuth provider is required".to_string()));
        }

        let url = self.authorize_url(provider, redirect_to);
        tracing::info!(provider, redirect_to, "Starting OAuth flow");

        Ok(OAuthStart {
            provider: provider.to_string(),
            url,
        })
    }

    async fn complete_oauth_redirect(
        &self,
        redirect_url: &str,
    ) -> Result<ProviderSession, AppError> {
        let params = parse_redirect_params(redirect_url);

        if let Some(error) = params.get("error_description").or_else(|| params.get("error")) {
            return Err(AppError::Provider(format!("OAuth failed: {error}")));
        }

        let access_token = params
            .get("access_token")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::BadRequest("Redirect URL carries no access token".to_string())
            })?
            .clone();

        let expires_at = params
            .get("expires_at")
            .and_then(|v| v.parse::<i64>().ok())
            .or_else(|| {
                params
                    .get("expires_in")
                    .and_then(|v| v.parse::<i64>().ok())
                    .map(|secs| unix_now() + secs)
            });

        let user = self.fetch_user(&access_token).await?;

        let session = ProviderSession {
            access_token,
            refresh_token: params.get("refresh_token").cloned().unwrap_or_default(),
            expires_at,
            user,
        };

        self.save_session(&session).await?;
        tracing::info!(user_id = %session.user.id, "OAuth redirect handled, session stored");
        self.events.emit(AuthEvent::SignedIn(session.clone()));

        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        let session = self.load_session().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read session during sign-out");
            None
        });

        // Local first: the session is gone even if the remote call fails.
        self.store.remove(&self.storage_key).await?;
        self.events.emit(AuthEvent::SignedOut);

        match session {
            Some(session) => {
                self.remote_logout(&session.access_token).await?;
                tracing::info!(user_id = %session.user.id, "Supabase sign-out successful");
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: ProviderUser,
}

impl TokenResponse {
    fn into_session(self) -> Result<ProviderSession, RemoteError> {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| unix_now() + secs));

        let session = ProviderSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        };
        session.validate()?;
        Ok(session)
    }
}

/// Project auth settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub external: HashMap<String, bool>,
}

impl AuthSettings {
    pub fn provider_enabled(&self, provider: &str) -> bool {
        self.external.get(provider).copied().unwrap_or(false)
    }
}

/// Derive the session storage key (`sb-<project-ref>-auth-token`) from the project URL.
pub fn storage_key_for(supabase_url: &str) -> String {
    let without_scheme = supabase_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(supabase_url);
    let host = without_scheme
        .split(['/', ':', '?', '#'])
        .next()
        .unwrap_or_default();
    let project_ref = host.split('.').next().unwrap_or_default();

    format!("sb-{}-auth-token", project_ref)
}

/// Parameters from the redirect URL fragment, falling back to the query string.
pub fn parse_redirect_params(url: &str) -> HashMap<String, String> {
    let fragment = url.split_once('#').map(|(_, f)| f);
    let query = url
        .split_once('?')
        .map(|(_, q)| q.split('#').next().unwrap_or_default());

    let source = fragment.filter(|f| !f.is_empty()).or(query).unwrap_or_default();

    source
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

fn provider_error(err: reqwest::Error) -> AppError {
    AppError::Provider(RemoteError::from_reqwest(err).to_string())
}

/// Check response status and parse the JSON body.
async fn parse_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, RemoteError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| RemoteError::Parse(format!("JSON parse error: {}", e)))
}

/// [`parse_response_json`] with failures reported as provider errors.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    parse_response_json(response)
        .await
        .map_err(|e| AppError::Provider(e.to_string()))
}
