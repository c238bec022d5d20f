// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod foodmagic_api;
pub mod identity;
pub mod pipeline;
pub mod session_manager;
pub mod supabase;

pub use foodmagic_api::FoodMagicClient;
pub use identity::{AuthEvent, IdentityProvider, MockIdentityProvider, OAuthStart};
pub use pipeline::{
    DetectionOutcome, ImageSource, PipelineInput, SuggestionOutcome, SuggestionPipeline,
};
pub use session_manager::{SessionManager, SessionState, Subscription};
pub use supabase::{AuthSettings, SupabaseAuthClient};
