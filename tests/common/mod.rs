// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared fixtures: a local axum server standing in for both the FoodMagic
//! backend (`/api/...`) and Supabase Auth (`/auth/v1/...`).

#![allow(dead_code)]

use axum::{
    extract::{Multipart, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use foodmagic::models::{ProviderSession, ProviderUser, UserMetadata};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const ANON_KEY: &str = "test_anon_key";
pub const GOOD_ACCESS_TOKEN: &str = "good-token";
pub const GOOD_REFRESH_TOKEN: &str = "rt-1";
pub const REFRESHED_ACCESS_TOKEN: &str = "refreshed-token";

/// Multipart upload as received by the fake backend.
#[derive(Debug, Clone)]
pub struct Upload {
    pub field: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Scripted behavior and recorded requests.
pub struct FakeState {
    pub image_response: Mutex<(StatusCode, String)>,
    pub suggest_response: Mutex<(StatusCode, String)>,
    /// Per-call delays, consumed in order; empty means no delay.
    pub image_delays: Mutex<VecDeque<Duration>>,
    pub suggest_delays: Mutex<VecDeque<Duration>>,
    pub image_calls: AtomicUsize,
    pub suggest_calls: AtomicUsize,
    pub last_upload: Mutex<Option<Upload>>,
    pub suggest_bodies: Mutex<Vec<Vec<String>>>,
    pub logout_status: Mutex<StatusCode>,
    pub logout_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    /// Forces this status on the token endpoint when set.
    pub token_status: Mutex<Option<StatusCode>>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            image_response: Mutex::new((StatusCode::OK, json!("tomate, cebolla").to_string())),
            suggest_response: Mutex::new((StatusCode::OK, sample_recipes_json())),
            image_delays: Mutex::new(VecDeque::new()),
            suggest_delays: Mutex::new(VecDeque::new()),
            image_calls: AtomicUsize::new(0),
            suggest_calls: AtomicUsize::new(0),
            last_upload: Mutex::new(None),
            suggest_bodies: Mutex::new(Vec::new()),
            logout_status: Mutex::new(StatusCode::NO_CONTENT),
            logout_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            token_status: Mutex::new(None),
        }
    }
}

impl FakeState {
    pub async fn set_image_response(&self, status: StatusCode, body: impl Into<String>) {
        *self.image_response.lock().await = (status, body.into());
    }

    pub async fn set_suggest_response(&self, status: StatusCode, body: impl Into<String>) {
        *self.suggest_response.lock().await = (status, body.into());
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn suggest_calls(&self) -> usize {
        self.suggest_calls.load(Ordering::SeqCst)
    }
}

pub struct FakeServer {
    pub addr: SocketAddr,
    pub state: Arc<FakeState>,
}

impl FakeServer {
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn supabase_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Test config pointing at this server.
    pub fn config(&self) -> foodmagic::config::Config {
        let mut config = foodmagic::config::Config::test_default();
        config.api_url = self.api_url();
        config.supabase_url = self.supabase_url();
        config.supabase_anon_key = ANON_KEY.to_string();
        config
    }
}

/// Start the fake server on an ephemeral port.
pub async fn spawn_server() -> FakeServer {
    let state = Arc::new(FakeState::default());

    let app = Router::new()
        .route("/api/process-image/", post(process_image))
        .route("/api/suggest-recipes/", post(suggest_recipes))
        .route("/auth/v1/user", get(auth_user))
        .route("/auth/v1/token", post(auth_token))
        .route("/auth/v1/logout", post(auth_logout))
        .route("/auth/v1/settings", get(auth_settings))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });

    FakeServer { addr, state }
}

async fn next_delay(queue: &Mutex<VecDeque<Duration>>) {
    let delay = queue.lock().await.pop_front();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

// ─── FoodMagic backend ───────────────────────────────────────

async fn process_image(
    State(state): State<Arc<FakeState>>,
    mut multipart: Multipart,
) -> (StatusCode, String) {
    state.image_calls.fetch_add(1, Ordering::SeqCst);

    while let Ok(Some(field)) = multipart.next_field().await {
        let upload = Upload {
            field: field.name().map(str::to_string),
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            bytes: field.bytes().await.map(|b| b.to_vec()).unwrap_or_default(),
        };
        *state.last_upload.lock().await = Some(upload);
    }

    next_delay(&state.image_delays).await;
    state.image_response.lock().await.clone()
}

async fn suggest_recipes(
    State(state): State<Arc<FakeState>>,
    Json(ingredients): Json<Vec<String>>,
) -> (StatusCode, String) {
    state.suggest_calls.fetch_add(1, Ordering::SeqCst);
    state.suggest_bodies.lock().await.push(ingredients);

    next_delay(&state.suggest_delays).await;
    state.suggest_response.lock().await.clone()
}

// ─── Supabase Auth ───────────────────────────────────────────

fn has_anon_key(headers: &HeaderMap) -> bool {
    headers
        .get("apikey")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == ANON_KEY)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn user_json() -> Value {
    json!({
        "id": "5b1d-google-user",
        "aud": "authenticated",
        "email": "ana@example.com",
        "user_metadata": {
            "full_name": "Ana Quispe",
            "picture": "https://lh3.googleusercontent.com/a/ana"
        }
    })
}

async fn auth_user(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !has_anon_key(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"msg": "no apikey"})));
    }
    match bearer(&headers).as_deref() {
        Some(GOOD_ACCESS_TOKEN) | Some(REFRESHED_ACCESS_TOKEN) => {
            (StatusCode::OK, Json(user_json()))
        }
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"msg": "invalid JWT"}))),
    }
}

async fn auth_token(
    State(state): State<Arc<FakeState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    if let Some(status) = *state.token_status.lock().await {
        return (status, Json(json!({"msg": "unavailable"})));
    }

    let grant_ok = query.get("grant_type").map(String::as_str) == Some("refresh_token");
    let token_ok = body["refresh_token"] == GOOD_REFRESH_TOKEN;

    if !has_anon_key(&headers) || !grant_ok || !token_ok {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "Invalid Refresh Token"})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "access_token": REFRESHED_ACCESS_TOKEN,
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "rt-2",
            "user": user_json()
        })),
    )
}

async fn auth_logout(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> StatusCode {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    if bearer(&headers).is_none() {
        return StatusCode::UNAUTHORIZED;
    }
    *state.logout_status.lock().await
}

async fn auth_settings(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !has_anon_key(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"msg": "no apikey"})));
    }
    (
        StatusCode::OK,
        Json(json!({"external": {"google": true, "github": false}, "disable_signup": false})),
    )
}

// ─── Sample data ─────────────────────────────────────────────

pub fn sample_recipes_json() -> String {
    json!([
        {
            "nombre": "Lomo saltado",
            "descripcion": "Salteado de carne con cebolla y tomate.",
            "ingredientes": ["carne", "cebolla", "tomate"],
            "pasos": ["1. Saltea la carne.", "2. Agrega cebolla y tomate."]
        },
        {
            "nombre": "Salsa criolla",
            "descripcion": "Acompañamiento fresco.",
            "ingredientes": ["cebolla", "limón"],
            "pasos": ["1. Corta la cebolla en pluma."]
        }
    ])
    .to_string()
}

/// Provider session as the identity provider would report it.
pub fn google_session(user_id: &str) -> ProviderSession {
    ProviderSession {
        access_token: "access".to_string(),
        refresh_token: "refresh".to_string(),
        expires_at: Some(foodmagic::time_utils::unix_now() + 3600),
        user: ProviderUser {
            id: user_id.to_string(),
            email: Some(format!("{user_id}@example.com")),
            user_metadata: UserMetadata {
                full_name: Some("Ana Quispe".to_string()),
                avatar_url: None,
                picture: Some("https://img.example/ana.png".to_string()),
            },
        },
    }
}

/// Poll `check` until it holds or the deadline passes.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
