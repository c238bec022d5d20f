// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Recipe suggestions returned by the suggestion endpoint.
//!
//! The backend answers with Spanish keys (`nombre`, `descripcion`,
//! `ingredientes`, `pasos`). English keys are accepted as well.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::RemoteError;

/// A single suggested recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Recipe {
    #[serde(alias = "nombre")]
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[serde(alias = "descripcion", default)]
    pub description: String,
    #[serde(alias = "ingredientes", default)]
    pub ingredients: Vec<String>,
    #[serde(alias = "pasos", default)]
    pub steps: Vec<String>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Parse the suggestion endpoint body into validated recipes.
///
/// Anything other than a JSON array of well-formed records is rejected.
pub fn parse_recipes(body: &str) -> Result<Vec<Recipe>, RemoteError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| RemoteError::Parse(format!("suggestion body is not JSON: {e}")))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        other => {
            return Err(RemoteError::Parse(format!(
                "expected a JSON array of recipes, got {}",
                json_kind(&other)
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let recipe: Recipe = serde_json::from_value(item)
                .map_err(|e| RemoteError::Parse(format!("recipe {index}: {e}")))?;
            recipe
                .validate()
                .map_err(|e| RemoteError::Parse(format!("recipe {index}: {e}")))?;
            Ok(recipe)
        })
        .collect()
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
