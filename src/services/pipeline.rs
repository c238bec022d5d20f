// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Two-stage suggestion pipeline: image → ingredients → recipes.
//!
//! Each invocation takes a new generation number. Starting a newer
//! invocation supersedes any older one still in flight: the older one
//! resolves to `Superseded` and its remote results are dropped.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;

use crate::error::{AppError, Notice, Result};
use crate::models::{IngredientList, Recipe};
use crate::services::FoodMagicClient;

/// Image handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Local file (camera capture or gallery pick).
    File(PathBuf),
    /// Encoded image already in memory.
    Bytes(Vec<u8>),
    /// `data:image/...;base64,...` URI as produced by a browser file input.
    DataUri(String),
}

impl ImageSource {
    /// Interpret a command-line argument: `data:` URIs inline, anything else a path.
    pub fn from_arg(arg: &str) -> Self {
        if arg.starts_with("data:") {
            ImageSource::DataUri(arg.to_string())
        } else {
            ImageSource::File(PathBuf::from(arg))
        }
    }

    /// Load the encoded image bytes.
    pub async fn load(&self) -> Result<Vec<u8>> {
        match self {
            ImageSource::File(path) => tokio::fs::read(path).await.map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    AppError::PermissionDenied(format!("cannot read {}", path.display()))
                }
                _ => AppError::BadRequest(format!("Cannot read image {}: {}", path.display(), e)),
            }),
            ImageSource::Bytes(bytes) => Ok(bytes.clone()),
            ImageSource::DataUri(uri) => decode_data_uri(uri),
        }
    }
}

/// Decode the payload of a base64 `data:` URI.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| AppError::BadRequest("Not a data URI".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| AppError::BadRequest("Data URI without payload".to_string()))?;

    if !meta.split(';').any(|part| part == "base64") {
        return Err(AppError::BadRequest(
            "Only base64 data URIs are supported".to_string(),
        ));
    }

    BASE64
        .decode(payload.trim())
        .map_err(|e| AppError::BadRequest(format!("Invalid base64 image: {e}")))
}

/// What the user asked to analyze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineInput {
    Image(ImageSource),
    /// Free-text, comma-separated manual entry.
    Text(String),
    Ingredients(IngredientList),
}

/// Result of a full pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionOutcome {
    Recipes {
        ingredients: IngredientList,
        recipes: Vec<Recipe>,
    },
    /// The suggestion service answered with an empty list.
    NoRecipes { ingredients: IngredientList },
    /// Nothing left to suggest from; no suggestion request was made.
    NoIngredients,
    /// A newer request replaced this one.
    Superseded,
}

impl SuggestionOutcome {
    /// Notice to show, if any. Recipes and supersession show none.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            SuggestionOutcome::Recipes { .. } | SuggestionOutcome::Superseded => None,
            SuggestionOutcome::NoRecipes { .. } => Some(Notice::new(
                "No results",
                "No recipes were suggested for these ingredients.",
            )),
            SuggestionOutcome::NoIngredients => Some(Notice::new(
                "Nothing to suggest",
                "Enter or detect at least one ingredient.",
            )),
        }
    }
}

/// Result of running only the image stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionOutcome {
    Detected(IngredientList),
    NoIngredients,
    Superseded,
}

/// Generation ticket of one invocation.
struct Ticket {
    id: u64,
    rx: watch::Receiver<u64>,
}

impl Ticket {
    fn is_current(&self) -> bool {
        *self.rx.borrow() == self.id
    }

    /// Resolves once a newer invocation has started.
    async fn superseded(&mut self) {
        let id = self.id;
        if self.rx.wait_for(|generation| *generation != id).await.is_err() {
            // Pipeline dropped; nothing can supersede us any more.
            std::future::pending::<()>().await;
        }
    }

    /// Run `fut` unless superseded first; `None` means superseded.
    async fn guard<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        let output = tokio::select! {
            biased;
            _ = self.superseded() => None,
            out = fut => Some(out),
        };
        output.filter(|_| self.is_current())
    }
}

/// Decrements the in-flight counter when dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Sequential image → ingredients → recipes pipeline.
pub struct SuggestionPipeline {
    client: FoodMagicClient,
    generation: watch::Sender<u64>,
    in_flight: AtomicUsize,
}

impl SuggestionPipeline {
    pub fn new(client: FoodMagicClient) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            client,
            generation,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// True while any invocation is outstanding.
    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    fn begin(&self) -> (Ticket, InFlight<'_>) {
        let mut id = 0;
        self.generation.send_modify(|generation| {
            *generation += 1;
            id = *generation;
        });
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let ticket = Ticket {
            id,
            rx: self.generation.subscribe(),
        };
        (ticket, InFlight(&self.in_flight))
    }

    /// Run the whole pipeline for one user action.
    pub async fn analyze(&self, input: PipelineInput) -> Result<SuggestionOutcome> {
        let (mut ticket, _in_flight) = self.begin();
        tracing::info!(request = ticket.id, "Suggestion pipeline started");

        let ingredients = match input {
            PipelineInput::Image(image) => match self.detect_stage(&mut ticket, &image).await? {
                Some(list) => list,
                None => {
                    log_superseded(&ticket);
                    return Ok(SuggestionOutcome::Superseded);
                }
            },
            PipelineInput::Text(text) => IngredientList::parse(&text),
            PipelineInput::Ingredients(list) => list,
        };

        self.suggest_stage(&mut ticket, ingredients).await
    }

    /// Run only the image stage, so the list can be reviewed before suggesting.
    pub async fn detect_ingredients(&self, image: &ImageSource) -> Result<DetectionOutcome> {
        let (mut ticket, _in_flight) = self.begin();

        match self.detect_stage(&mut ticket, image).await? {
            Some(list) if list.is_empty() => Ok(DetectionOutcome::NoIngredients),
            Some(list) => Ok(DetectionOutcome::Detected(list)),
            None => {
                log_superseded(&ticket);
                Ok(DetectionOutcome::Superseded)
            }
        }
    }

    /// Run only the suggestion stage for a known list.
    pub async fn suggest(&self, ingredients: IngredientList) -> Result<SuggestionOutcome> {
        let (mut ticket, _in_flight) = self.begin();
        self.suggest_stage(&mut ticket, ingredients).await
    }

    /// Step A. `Ok(None)` when superseded.
    async fn detect_stage(
        &self,
        ticket: &mut Ticket,
        image: &ImageSource,
    ) -> Result<Option<IngredientList>> {
        let work = async {
            let bytes = image.load().await?;
            let raw = self
                .client
                .process_image(bytes)
                .await
                .map_err(AppError::Processing)?;
            Ok::<_, AppError>(IngredientList::parse(&raw))
        };

        let Some(result) = ticket.guard(work).await else {
            return Ok(None);
        };
        let ingredients = result?;

        tracing::info!(
            request = ticket.id,
            count = ingredients.len(),
            "Ingredients detected"
        );
        Ok(Some(ingredients))
    }

    /// Step B, with the empty-list short circuit.
    async fn suggest_stage(
        &self,
        ticket: &mut Ticket,
        ingredients: IngredientList,
    ) -> Result<SuggestionOutcome> {
        if ingredients.is_empty() {
            tracing::info!(request = ticket.id, "No ingredients, skipping suggestion");
            return Ok(SuggestionOutcome::NoIngredients);
        }

        let Some(result) = ticket.guard(self.client.suggest_recipes(&ingredients)).await else {
            log_superseded(ticket);
            return Ok(SuggestionOutcome::Superseded);
        };
        let recipes = result.map_err(AppError::Suggestion)?;

        tracing::info!(
            request = ticket.id,
            ingredients = ingredients.len(),
            recipes = recipes.len(),
            "Recipe suggestions received"
        );

        if recipes.is_empty() {
            return Ok(SuggestionOutcome::NoRecipes { ingredients });
        }
        Ok(SuggestionOutcome::Recipes {
            ingredients,
            recipes,
        })
    }
}

fn log_superseded(ticket: &Ticket) {
    tracing::info!(request = ticket.id, "Request superseded by a newer one");
}
