// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! FoodMagic: ingredient detection and recipe suggestion client.
//!
//! This crate provides the session manager (who is signed in, persisted
//! across restarts, kept in sync with Supabase Auth) and the suggestion
//! pipeline (photo → ingredients → recipes) behind the FoodMagic app.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod store;
pub mod time_utils;

use anyhow::Context;
use std::sync::Arc;

use config::Config;
use services::{FoodMagicClient, SessionManager, SuggestionPipeline, SupabaseAuthClient};
use store::{FileStore, SessionStore};

/// Shared application state, built once and passed to every front end.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SessionStore>,
    pub auth: Arc<SupabaseAuthClient>,
    pub session: SessionManager,
    pub pipeline: SuggestionPipeline,
}

impl AppState {
    /// Wire up the production dependencies and initialize the session.
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn SessionStore> = Arc::new(FileStore::new(config.store_path.clone()));
        let auth = Arc::new(
            SupabaseAuthClient::new(&config, store.clone())
                .context("failed to initialize Supabase auth client")?,
        );

        let session = SessionManager::new(auth.clone(), store.clone(), config.redirect_url.clone());
        session.start().await;

        let pipeline = SuggestionPipeline::new(FoodMagicClient::from_config(&config));

        Ok(Self {
            config,
            store,
            auth,
            session,
            pipeline,
        })
    }

    pub async fn shutdown(&self) {
        self.session.shutdown().await;
    }
}
