// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

mod common;

use async_trait::async_trait;
use common::{eventually, google_session};
use foodmagic::error::AppError;
use foodmagic::models::{AuthProvider, User};
use foodmagic::services::{AuthEvent, MockIdentityProvider, SessionManager};
use foodmagic::store::{self, keys, FileStore, MemoryStore, SessionStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const REDIRECT: &str = "exp://localhost:8081";

fn manager(provider: &Arc<MockIdentityProvider>, store: &Arc<MemoryStore>) -> SessionManager {
    SessionManager::new(provider.clone(), store.clone(), REDIRECT)
}

fn stored_guest(id: &str) -> User {
    User {
        id: id.to_string(),
        email: String::new(),
        name: "Guest User".to_string(),
        avatar: None,
        provider: AuthProvider::Guest,
    }
}

/// Wait until the manager's user satisfies `check`.
async fn wait_for_user<F>(manager: &SessionManager, check: F)
where
    F: Fn(Option<&User>) -> bool,
{
    let mut rx = manager.watch();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| check(s.user.as_ref())))
        .await
        .expect("state change within deadline")
        .expect("state channel open");
}

// ─── Initialization ──────────────────────────────────────────

#[tokio::test]
async fn test_provider_session_takes_precedence_over_store() {
    let provider = Arc::new(MockIdentityProvider::with_session(google_session("u1")));
    let store = Arc::new(MemoryStore::new());
    store::save_user(store.as_ref(), &stored_guest("guest_old"))
        .await
        .unwrap();

    let manager = manager(&provider, &store);
    manager.start().await;

    let state = manager.snapshot();
    assert!(!state.is_loading);
    let user = state.user.expect("signed in");
    assert_eq!(user.id, "u1");
    assert_eq!(user.provider, AuthProvider::Google);
    assert_eq!(user.name, "Ana Quispe");
    assert_eq!(user.avatar.as_deref(), Some("https://img.example/ana.png"));

    // The provider user replaced the stored guest.
    let persisted = store::load_user(store.as_ref()).await.unwrap().unwrap();
    assert_eq!(persisted.id, "u1");

    manager.shutdown().await;
}

#[tokio::test]
async fn test_falls_back_to_stored_user() {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(MemoryStore::new());
    store::save_user(store.as_ref(), &stored_guest("guest_abc"))
        .await
        .unwrap();

    let manager = manager(&provider, &store);
    manager.start().await;

    assert!(manager.is_authenticated());
    assert_eq!(manager.current_user().unwrap().id, "guest_abc");
    manager.shutdown().await;
}

#[tokio::test]
async fn test_provider_failure_still_completes_loading() {
    let provider = Arc::new(MockIdentityProvider::new());
    provider.set_fail_current_session(true);
    let store = Arc::new(MemoryStore::new());
    store::save_user(store.as_ref(), &stored_guest("guest_abc"))
        .await
        .unwrap();

    let manager = manager(&provider, &store);
    manager.start().await;

    assert!(!manager.is_loading());
    assert_eq!(manager.current_user().unwrap().id, "guest_abc");
    manager.shutdown().await;
}

#[tokio::test]
async fn test_unparseable_store_entry_is_signed_out() {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(MemoryStore::new());
    store.set(keys::USER, "{not json").await.unwrap();

    let manager = manager(&provider, &store);
    manager.start().await;

    let state = manager.snapshot();
    assert!(!state.is_loading);
    assert!(state.user.is_none());
    manager.shutdown().await;
}

#[tokio::test]
async fn test_store_read_failure_is_signed_out() {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(MemoryStore::new());
    store.set_fail_reads(true);

    let manager = manager(&provider, &store);
    manager.start().await;

    assert!(!manager.is_loading());
    assert!(!manager.is_authenticated());
    manager.shutdown().await;
}

#[tokio::test]
async fn test_wait_until_ready_blocks_until_initialized() {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(MemoryStore::new());
    let manager = Arc::new(manager(&provider, &store));

    let waiter = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.wait_until_ready().await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    manager.start().await;
    let state = waiter.await.unwrap().unwrap();
    assert!(!state.is_loading);
    assert!(state.user.is_none());
    manager.shutdown().await;
}

#[tokio::test]
async fn test_require_user_without_session() {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&provider, &store);
    manager.start().await;

    let err = manager.require_user().await.unwrap_err();
    assert!(matches!(err, AppError::NotAuthenticated));
    manager.shutdown().await;
}

// ─── Sign-in / sign-out ──────────────────────────────────────

#[tokio::test]
async fn test_guest_sign_in_persists_unique_users() {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&provider, &store);
    manager.start().await;

    let first = manager.sign_in_as_guest().await.unwrap();
    assert_eq!(first.provider, AuthProvider::Guest);
    assert!(first.email.is_empty());
    assert!(first.id.starts_with("guest_"));
    assert_eq!(manager.current_user(), Some(first.clone()));
    assert_eq!(
        store::load_user(store.as_ref()).await.unwrap(),
        Some(first.clone())
    );

    let second = manager.sign_in_as_guest().await.unwrap();
    assert_ne!(first.id, second.id);
    manager.shutdown().await;
}

#[tokio::test]
async fn test_sign_in_persistence_failure_leaves_state_unchanged() {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&provider, &store);
    manager.start().await;

    store.set_fail_writes(true);
    let err = manager.sign_in_as_guest().await.unwrap_err();
    assert!(matches!(err, AppError::Persistence(_)));
    assert!(!manager.is_authenticated());
    assert!(!store.contains(keys::USER));
    manager.shutdown().await;
}

#[tokio::test]
async fn test_sign_out_clears_locally_when_remote_fails() {
    let provider = Arc::new(MockIdentityProvider::with_session(google_session("u1")));
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&provider, &store);
    manager.start().await;
    assert!(manager.is_authenticated());

    provider.set_fail_sign_out(true);
    let result = manager.sign_out().await;

    assert!(matches!(result, Err(AppError::Provider(_))));
    assert_eq!(provider.sign_out_calls(), 1);
    assert!(manager.current_user().is_none());
    assert!(!store.contains(keys::USER));
    manager.shutdown().await;
}

#[tokio::test]
async fn test_guest_sign_out() {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&provider, &store);
    manager.start().await;
    manager.sign_in_as_guest().await.unwrap();

    manager.sign_out().await.unwrap();
    assert!(!manager.is_authenticated());
    assert!(!store.contains(keys::USER));
    manager.shutdown().await;
}

#[tokio::test]
async fn test_google_sign_in_flow() {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&provider, &store);
    manager.start().await;

    let start = manager.begin_google_sign_in().await.unwrap();
    assert_eq!(start.provider, "google");
    assert!(start.url.contains("redirect_to=exp%3A%2F%2Flocalhost%3A8081"));

    provider.set_pending_oauth(google_session("u7")).await;
    let user = manager
        .complete_oauth_redirect("exp://localhost:8081#access_token=access")
        .await
        .unwrap();

    assert_eq!(user.id, "u7");
    assert_eq!(user.email, "u7@example.com");
    assert_eq!(manager.current_user().unwrap().id, "u7");
    manager.shutdown().await;
}

// ─── Provider notifications ──────────────────────────────────

#[tokio::test]
async fn test_signed_in_event_adopts_provider_user() {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&provider, &store);
    manager.start().await;

    provider.emit(AuthEvent::SignedIn(google_session("u2")));
    wait_for_user(&manager, |u| u.is_some_and(|u| u.id == "u2")).await;

    let persisted = store::load_user(store.as_ref()).await.unwrap().unwrap();
    assert_eq!(persisted.provider, AuthProvider::Google);
    manager.shutdown().await;
}

#[tokio::test]
async fn test_signed_out_event_clears_user() {
    let provider = Arc::new(MockIdentityProvider::with_session(google_session("u1")));
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&provider, &store);
    manager.start().await;
    assert!(manager.is_authenticated());

    provider.emit(AuthEvent::SignedOut);
    wait_for_user(&manager, |u| u.is_none()).await;
    assert!(!store.contains(keys::USER));
    manager.shutdown().await;
}

#[tokio::test]
async fn test_invalid_signed_in_session_is_ignored() {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&provider, &store);
    manager.start().await;

    let mut bad = google_session("u3");
    bad.user.id = String::new();
    provider.emit(AuthEvent::SignedIn(bad));
    provider.emit(AuthEvent::SignedIn(google_session("u4")));

    // Events are applied in order, so once u4 lands the bad one was skipped.
    wait_for_user(&manager, |u| u.is_some_and(|u| u.id == "u4")).await;
    manager.shutdown().await;
}

#[tokio::test]
async fn test_token_refresh_does_not_replace_guest() {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&provider, &store);
    manager.start().await;
    let guest = manager.sign_in_as_guest().await.unwrap();

    provider.emit(AuthEvent::TokenRefreshed(google_session("u5")));
    provider.emit(AuthEvent::UserUpdated(google_session("u5")));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(manager.current_user(), Some(guest.clone()));
    assert_eq!(store::load_user(store.as_ref()).await.unwrap(), Some(guest));
    manager.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_unsubscribes() {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&provider, &store);
    manager.start().await;
    assert_eq!(provider.subscriber_count(), 1);

    manager.shutdown().await;
    manager.shutdown().await;
    assert!(eventually(|| provider.subscriber_count() == 0).await);

    provider.emit(AuthEvent::SignedIn(google_session("late")));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(manager.current_user().is_none());
}

#[tokio::test]
async fn test_start_twice_subscribes_once() {
    let provider = Arc::new(MockIdentityProvider::new());
    let store = Arc::new(MemoryStore::new());
    let manager = manager(&provider, &store);

    manager.start().await;
    manager.start().await;
    assert_eq!(provider.subscriber_count(), 1);
    manager.shutdown().await;
}

/// Store whose first user read lets the provider sign out mid-read.
struct SignOutDuringRead {
    inner: MemoryStore,
    provider: Arc<MockIdentityProvider>,
    fired: AtomicBool,
}

#[async_trait]
impl SessionStore for SignOutDuringRead {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let value = self.inner.get(key).await?;
        if key == keys::USER && !self.fired.swap(true, Ordering::SeqCst) {
            self.provider.emit(AuthEvent::SignedOut);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        self.inner.remove(key).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sign_out_during_initialization_wins() {
    let provider = Arc::new(MockIdentityProvider::new());
    let backing = MemoryStore::new();
    store::save_user(&backing, &stored_guest("guest_stale"))
        .await
        .unwrap();
    let store = Arc::new(SignOutDuringRead {
        inner: backing.clone(),
        provider: provider.clone(),
        fired: AtomicBool::new(false),
    });

    let manager = SessionManager::new(provider.clone(), store, REDIRECT);
    manager.start().await;
    assert!(!manager.is_loading());

    // The sign-out is applied after the restore, never overwritten by it.
    wait_for_user(&manager, |u| u.is_none()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(manager.current_user().is_none());
    assert!(!backing.contains(keys::USER));
    manager.shutdown().await;
}

// ─── Persistence across restarts ─────────────────────────────

#[tokio::test]
async fn test_guest_survives_restart_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    let provider = Arc::new(MockIdentityProvider::new());

    let guest = {
        let store: Arc<dyn SessionStore> = Arc::new(FileStore::new(&path));
        let manager = SessionManager::new(provider.clone(), store, REDIRECT);
        manager.start().await;
        let guest = manager.sign_in_as_guest().await.unwrap();
        manager.shutdown().await;
        guest
    };

    let store: Arc<dyn SessionStore> = Arc::new(FileStore::new(&path));
    let manager = SessionManager::new(provider.clone(), store, REDIRECT);
    manager.start().await;

    assert_eq!(manager.current_user(), Some(guest));
    manager.shutdown().await;
}
