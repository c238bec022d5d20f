// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent user-facing notices.

use serde::Serialize;

/// Failure of a single remote call (FoodMagic backend or identity provider).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Parse(String),
}

impl RemoteError {
    /// Classify a reqwest send/receive failure.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout
        } else if err.is_decode() {
            RemoteError::Parse(err.to_string())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }

    /// True for failures that never produced a usable response body.
    pub fn is_transport(&self) -> bool {
        !matches!(self, RemoteError::Parse(_))
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, RemoteError::Parse(_))
    }
}

/// Application error type that converts to user-facing notices.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Image processing failed: {0}")]
    Processing(RemoteError),

    #[error("Recipe suggestion failed: {0}")]
    Suggestion(RemoteError),

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True when the underlying cause is a network/transport failure.
    pub fn is_transport(&self) -> bool {
        match self {
            AppError::Processing(e) | AppError::Suggestion(e) => e.is_transport(),
            _ => false,
        }
    }

    /// True when the remote answered with a body we could not accept.
    pub fn is_parse(&self) -> bool {
        match self {
            AppError::Processing(e) | AppError::Suggestion(e) => e.is_parse(),
            _ => false,
        }
    }

    /// Convert the error into the dialog shown to the user.
    ///
    /// Transport and parse failures of the same stage share one wording.
    pub fn notice(&self) -> Notice {
        match self {
            AppError::PermissionDenied(_) => Notice::new(
                "Permission required",
                "Camera or gallery access is needed to analyze a photo.",
            ),
            AppError::Processing(e) => {
                tracing::warn!(error = %e, "Image analysis failed");
                Notice::new("Error", "Could not analyze the image.")
            }
            AppError::Suggestion(e) => {
                tracing::warn!(error = %e, "Recipe suggestion failed");
                Notice::new("Error", "Could not fetch recipes.")
            }
            AppError::Provider(msg) => {
                tracing::warn!(error = %msg, "Identity provider error");
                Notice::new("Error", "Could not complete the sign-in request.")
            }
            AppError::Persistence(msg) => {
                tracing::error!(error = %msg, "Persistence error");
                Notice::new("Error", "Could not save your session.")
            }
            AppError::NotAuthenticated => {
                Notice::new("Sign in required", "Sign in or continue as a guest first.")
            }
            AppError::BadRequest(msg) => Notice::new("Error", msg.clone()),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                Notice::new("Error", "Something went wrong.")
            }
        }
    }
}

/// Title and message of a dialog shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, AppError>;
