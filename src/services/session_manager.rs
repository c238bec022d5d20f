// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-side session state.
//!
//! Owns the current user, mirrors it into the local store, and follows the
//! identity provider's session-change notifications. Consumers must wait for
//! [`SessionManager::wait_until_ready`] before deciding between the sign-in
//! screen and the main surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::models::{ProviderSession, User};
use crate::services::identity::{AuthEvent, IdentityProvider, OAuthStart};
use crate::store::{self, SessionStore};

/// OAuth provider used for account sign-in.
const GOOGLE_PROVIDER: &str = "google";

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<User>,
    /// True until initialization has completed.
    pub is_loading: bool,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            is_loading: true,
        }
    }
}

/// Handle for the provider subscription task; cancelling it unsubscribes.
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stop listening. Safe to call on an already-cancelled handle.
    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("Auth state subscription cancelled");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn SessionStore>,
    state: watch::Sender<SessionState>,
    /// Serializes every state + store mutation.
    write_lock: Mutex<()>,
}

impl Inner {
    fn set_user(&self, user: Option<User>) {
        self.state.send_modify(|state| state.user = user);
    }

    /// Persist and adopt the user behind a provider session.
    async fn adopt_session(&self, session: &ProviderSession) -> User {
        let user = User::from_session(session);
        let _guard = self.write_lock.lock().await;

        if let Err(e) = store::save_user(self.store.as_ref(), &user).await {
            tracing::error!(error = %e, user_id = %user.id, "Failed to persist provider user");
        }
        self.set_user(Some(user.clone()));
        user
    }

    async fn clear_local(&self) {
        let _guard = self.write_lock.lock().await;
        self.set_user(None);
        if let Err(e) = store::clear_user(self.store.as_ref()).await {
            tracing::warn!(error = %e, "Failed to remove persisted user");
        }
    }

    async fn apply_event(&self, event: AuthEvent) {
        tracing::info!(event = event.name(), "Auth state change received");

        match event {
            AuthEvent::SignedIn(session) => {
                if let Err(e) = session.validate() {
                    tracing::warn!(error = %e, "Ignoring sign-in with invalid session");
                    return;
                }
                let user = self.adopt_session(&session).await;
                tracing::info!(
                    user_id = %user.id,
                    name = %user.name,
                    "User signed in via provider"
                );
            }
            AuthEvent::TokenRefreshed(session) | AuthEvent::UserUpdated(session) => {
                // Only refresh a provider-backed user; a guest stays a guest.
                let is_provider_user = self
                    .state
                    .borrow()
                    .user
                    .as_ref()
                    .is_some_and(|u| !u.is_guest());
                if is_provider_user && session.validate().is_ok() {
                    self.adopt_session(&session).await;
                }
            }
            AuthEvent::SignedOut => {
                self.clear_local().await;
                tracing::info!("User signed out via provider");
            }
        }
    }
}

/// Session state object with an explicit lifecycle: `new` → `start` → `shutdown`.
pub struct SessionManager {
    inner: Arc<Inner>,
    redirect_url: String,
    initialized: AtomicBool,
    subscription: Mutex<Option<Subscription>>,
}

impl SessionManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn SessionStore>,
        redirect_url: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());

        Self {
            inner: Arc::new(Inner {
                provider,
                store,
                state,
                write_lock: Mutex::new(()),
            }),
            redirect_url: redirect_url.into(),
            initialized: AtomicBool::new(false),
            subscription: Mutex::new(None),
        }
    }

    /// Subscribe to provider notifications, then initialize.
    pub async fn start(&self) {
        self.subscribe().await;
        self.initialize().await;
    }

    /// Tear down: cancels the provider subscription exactly once.
    pub async fn shutdown(&self) {
        if let Some(subscription) = self.subscription.lock().await.take() {
            subscription.unsubscribe();
            tracing::info!("Session manager shut down");
        }
    }

    async fn subscribe(&self) {
        let mut slot = self.subscription.lock().await;
        if slot.is_some() {
            return;
        }

        let mut rx = self.inner.provider.subscribe();
        let inner = self.inner.clone();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => inner.apply_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Auth state subscription lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        *slot = Some(Subscription {
            handle: Some(handle),
        });
    }

    /// Resolve the initial user. Runs once; later calls return immediately.
    pub async fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            tracing::debug!("Session manager already initialized");
            return;
        }

        tracing::info!("Initializing session");

        // ─── 1. Live provider session takes precedence ───
        match self.inner.provider.current_session().await {
            Ok(Some(session)) => match session.validate() {
                Ok(()) => {
                    let user = self.inner.adopt_session(&session).await;
                    self.finish_loading();
                    tracing::info!(user_id = %user.id, "Session restored from provider");
                    return;
                }
                Err(e) => tracing::warn!(error = %e, "Provider returned an invalid session"),
            },
            Ok(None) => tracing::debug!("No provider session, checking local store"),
            Err(e) => {
                tracing::warn!(error = %e, "Provider session lookup failed, treating as signed out")
            }
        }

        // ─── 2. Fall back to the persisted user ───
        // Read and adopt under one lock: a sign-out landing in between must win.
        {
            let _guard = self.inner.write_lock.lock().await;
            match store::load_user(self.inner.store.as_ref()).await {
                Ok(Some(user)) => {
                    tracing::info!(
                        user_id = %user.id,
                        provider = ?user.provider,
                        "Session restored from store"
                    );
                    self.inner.set_user(Some(user));
                }
                Ok(None) => tracing::info!("No saved session"),
                Err(e) => tracing::warn!(error = %e, "Could not read saved session"),
            }
        }

        // ─── 3. Always complete ───
        self.finish_loading();
    }

    fn finish_loading(&self) {
        self.inner.state.send_modify(|state| state.is_loading = false);
        tracing::debug!("Session initialization completed");
    }

    // ─── Operations ──────────────────────────────────────────────────────────

    /// Make `user` current. Fails without changing state if it cannot be persisted.
    pub async fn sign_in(&self, user: User) -> Result<()> {
        let _guard = self.inner.write_lock.lock().await;

        store::save_user(self.inner.store.as_ref(), &user).await?;
        tracing::info!(user_id = %user.id, provider = ?user.provider, "User signed in");
        self.inner.set_user(Some(user));
        Ok(())
    }

    /// Continue without an account.
    pub async fn sign_in_as_guest(&self) -> Result<User> {
        let user = User::guest();
        self.sign_in(user.clone()).await?;
        Ok(user)
    }

    /// Clear the local session, then sign out remotely.
    ///
    /// Local state is cleared even when the remote call fails; that failure
    /// is still returned to the caller.
    pub async fn sign_out(&self) -> Result<()> {
        self.inner.clear_local().await;
        tracing::info!("Local session cleared");

        self.inner.provider.sign_out().await.inspect_err(|e| {
            tracing::warn!(error = %e, "Remote sign-out failed");
        })
    }

    /// Start Google sign-in; the caller opens the returned URL.
    pub async fn begin_google_sign_in(&self) -> Result<OAuthStart> {
        self.inner
            .provider
            .sign_in_with_oauth(GOOGLE_PROVIDER, &self.redirect_url)
            .await
    }

    /// Finish the OAuth flow from the URL it redirected to.
    pub async fn complete_oauth_redirect(&self, redirect_url: &str) -> Result<User> {
        let session = self
            .inner
            .provider
            .complete_oauth_redirect(redirect_url)
            .await?;
        Ok(self.inner.adopt_session(&session).await)
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    /// Wait until initialization has completed and return the state.
    pub async fn wait_until_ready(&self) -> Result<SessionState> {
        let mut rx = self.inner.state.subscribe();
        let state = rx
            .wait_for(|state| !state.is_loading)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("session state closed: {e}")))?
            .clone();
        Ok(state)
    }

    /// The signed-in user, once initialization has completed.
    pub async fn require_user(&self) -> Result<User> {
        self.wait_until_ready()
            .await?
            .user
            .ok_or(AppError::NotAuthenticated)
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    /// Receiver for state changes.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }
}
