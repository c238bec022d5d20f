// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FoodMagic backend client.
//!
//! Handles:
//! - Image upload for ingredient detection (`/process-image/`)
//! - Recipe suggestion for an ingredient list (`/suggest-recipes/`)
//!
//! Every request carries its own timeout. Nothing is retried here; the
//! caller decides what the user sees.

use reqwest::multipart;
use std::time::Duration;

use crate::config::Config;
use crate::error::RemoteError;
use crate::models::recipe::json_kind;
use crate::models::{parse_recipes, IngredientList, Recipe};

/// Upload filename and content type expected by the backend.
const UPLOAD_FILENAME: &str = "photo.jpg";
const UPLOAD_MIME: &str = "image/jpeg";

/// FoodMagic API client.
#[derive(Clone)]
pub struct FoodMagicClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl FoodMagicClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.api_url.clone(), config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload an image and return the raw comma-separated ingredient string.
    pub async fn process_image(&self, image: Vec<u8>) -> Result<String, RemoteError> {
        let url = format!("{}/process-image/", self.base_url);
        let size = image.len();

        let part = multipart::Part::bytes(image)
            .file_name(UPLOAD_FILENAME)
            .mime_str(UPLOAD_MIME)
            .map_err(|e| RemoteError::Transport(format!("invalid upload part: {e}")))?;
        let form = multipart::Form::new().part("file", part);

        tracing::debug!(url = %url, bytes = size, "Uploading image for analysis");

        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;

        let body = check_response_text(response).await?;

        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(serde_json::Value::String(ingredients)) => Ok(ingredients),
            Ok(other) => Err(RemoteError::Parse(format!(
                "expected a JSON string of ingredients, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(RemoteError::Parse(format!("image analysis body is not JSON: {e}"))),
        }
    }

    /// Ask for recipes matching the ingredient list.
    ///
    /// An empty vector is a valid answer meaning nothing matched.
    pub async fn suggest_recipes(
        &self,
        ingredients: &IngredientList,
    ) -> Result<Vec<Recipe>, RemoteError> {
        let url = format!("{}/suggest-recipes/", self.base_url);

        tracing::debug!(url = %url, count = ingredients.len(), "Requesting recipe suggestions");

        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(ingredients)
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;

        let body = check_response_text(response).await?;
        parse_recipes(&body)
    }
}

/// Check response status and return the body text.
async fn check_response_text(response: reqwest::Response) -> Result<String, RemoteError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, "FoodMagic API returned an error status");
        return Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response.text().await.map_err(RemoteError::from_reqwest)
}
