// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider abstraction and session-change events.
//!
//! The production implementation is [`SupabaseAuthClient`]; the mock below
//! scripts sessions and events for offline runs and tests.
//!
//! [`SupabaseAuthClient`]: crate::services::SupabaseAuthClient

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{broadcast, RwLock};

use crate::error::AppError;
use crate::models::ProviderSession;

/// Buffered events per subscriber before it starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Session-change notification pushed by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(ProviderSession),
    SignedOut,
    TokenRefreshed(ProviderSession),
    UserUpdated(ProviderSession),
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn(_) => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed(_) => "TOKEN_REFRESHED",
            AuthEvent::UserUpdated(_) => "USER_UPDATED",
        }
    }
}

/// Result of starting an OAuth flow; the caller opens `url` in a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthStart {
    pub provider: String,
    pub url: String,
}

/// Remote identity provider contract.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Live session, if any.
    async fn current_session(&self) -> Result<Option<ProviderSession>, AppError>;

    /// Build the authorization URL. The outcome arrives as [`AuthEvent::SignedIn`].
    async fn sign_in_with_oauth(
        &self,
        provider: &str,
        redirect_to: &str,
    ) -> Result<OAuthStart, AppError>;

    /// Turn the URL the OAuth flow redirected to into a session.
    async fn complete_oauth_redirect(&self, redirect_url: &str)
        -> Result<ProviderSession, AppError>;

    async fn sign_out(&self) -> Result<(), AppError>;

    /// Subscribe to session-change notifications.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Broadcast hub shared by provider implementations.
#[derive(Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthEvent>,
}

impl Default for AuthEvents {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }
}

impl AuthEvents {
    pub fn emit(&self, event: AuthEvent) {
        let name = event.name();
        // No subscribers is fine; nobody is waiting for the event.
        let delivered = self.tx.send(event).unwrap_or(0);
        tracing::debug!(event = name, delivered, "Auth state change");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MockIdentityProvider
// ─────────────────────────────────────────────────────────────────────────────

/// In-process identity provider with scripted behavior.
#[derive(Default)]
pub struct MockIdentityProvider {
    session: RwLock<Option<ProviderSession>>,
    /// Session handed out by the next `complete_oauth_redirect`.
    pending_oauth: RwLock<Option<ProviderSession>>,
    events: AuthEvents,
    fail_current_session: AtomicBool,
    fail_sign_out: AtomicBool,
    sign_out_calls: AtomicUsize,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a live session.
    pub fn with_session(session: ProviderSession) -> Self {
        Self {
            session: RwLock::new(Some(session)),
            ..Self::default()
        }
    }

    pub async fn set_session(&self, session: Option<ProviderSession>) {
        *self.session.write().await = session;
    }

    pub async fn set_pending_oauth(&self, session: ProviderSession) {
        *self.pending_oauth.write().await = Some(session);
    }

    pub fn set_fail_current_session(&self, fail: bool) {
        self.fail_current_session.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Push an event as if it came from the remote provider.
    pub fn emit(&self, event: AuthEvent) {
        self.events.emit(event);
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn current_session(&self) -> Result<Option<ProviderSession>, AppError> {
        if self.fail_current_session.load(Ordering::SeqCst) {
            return Err(AppError::Provider("session lookup failed (simulated)".to_string()));
        }
        Ok(self.session.read().await.clone())
    }

    async fn sign_in_with_oauth(
        &self,
        provider: &str,
        redirect_to: &str,
    ) -> Result<OAuthStart, AppError> {
        Ok(OAuthStart {
            provider: provider.to_string(),
            url: format!(
                "https://auth.invalid/authorize?provider={}&redirect_to={}",
                urlencoding::encode(provider),
                urlencoding::encode(redirect_to)
            ),
        })
    }

    async fn complete_oauth_redirect(
        &self,
        _redirect_url: &str,
    ) -> Result<ProviderSession, AppError> {
        let session = self
            .pending_oauth
            .write()
            .await
            .take()
            .ok_or_else(|| AppError::Provider("no OAuth flow in progress".to_string()))?;

        *self.session.write().await = Some(session.clone());
        self.events.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        *self.session.write().await = None;
        self.events.emit(AuthEvent::SignedOut);

        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AppError::Provider("sign-out failed (simulated)".to_string()));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
