// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod ingredients;
pub mod recipe;
pub mod session;
pub mod user;

pub use ingredients::IngredientList;
pub use recipe::{parse_recipes, Recipe};
pub use session::{ProviderSession, ProviderUser, UserMetadata};
pub use user::{AuthProvider, User};
