// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FoodMagic command-line client.
//!
//! Signs in (Google via Supabase, or as a guest), then detects ingredients
//! from a photo or a typed list and prints suggested recipes.

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use foodmagic::config::Config;
use foodmagic::error::{AppError, Notice};
use foodmagic::logging::init_logging;
use foodmagic::models::{IngredientList, Recipe};
use foodmagic::services::{
    DetectionOutcome, IdentityProvider, ImageSource, PipelineInput, SuggestionOutcome,
};
use foodmagic::time_utils::format_unix_rfc3339;
use foodmagic::AppState;

/// Detect ingredients in food photos and get recipe suggestions
#[derive(Parser)]
#[command(name = "foodmagic")]
#[command(version, long_about = None)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show who is signed in
    Status,

    /// Sign in
    Login {
        #[command(subcommand)]
        method: LoginMethod,
    },

    /// Finish Google sign-in with the URL the browser was redirected to
    Callback {
        /// Full redirect URL including the `#access_token=...` fragment
        redirect_url: String,
    },

    /// Sign out and forget the saved session
    Logout,

    /// Suggest recipes for a comma-separated ingredient list
    Suggest {
        /// e.g. "tomate, cebolla, ajo"
        ingredients: String,
    },

    /// Detect ingredients in a photo, then suggest recipes
    Scan {
        /// Image path, or a `data:image/...;base64,...` URI
        image: String,

        /// Stop after detection and print the ingredient list
        #[arg(long)]
        ingredients_only: bool,
    },
}

#[derive(Subcommand)]
enum LoginMethod {
    /// Continue without an account
    Guest,
    /// Print the Google sign-in URL to open in a browser
    Google,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(
        api_url = %config.api_url,
        store = %config.store_path.display(),
        "Configuration loaded"
    );

    let state = match AppState::start(config).await {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Startup failed: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(&state, cli.command).await;
    state.shutdown().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_notice(&e.notice());
            ExitCode::FAILURE
        }
    }
}

async fn run(state: &AppState, command: Commands) -> Result<(), AppError> {
    // No decision about the signed-in user before initialization completes.
    let session = state.session.wait_until_ready().await?;

    match command {
        Commands::Status => {
            match &session.user {
                Some(user) => {
                    println!("Signed in as {} ({:?})", user.name, user.provider);
                    if !user.email.is_empty() {
                        println!("  email:  {}", user.email);
                    }
                    if let Some(avatar) = &user.avatar {
                        println!("  avatar: {}", avatar);
                    }
                    println!("  id:     {}", user.id);
                }
                None => println!("Not signed in"),
            }
            if let Ok(Some(auth)) = state.auth.current_session().await {
                let expiry = auth
                    .expires_at
                    .and_then(format_unix_rfc3339)
                    .unwrap_or_else(|| "unknown".to_string());
                println!("  provider session expires: {}", expiry);
            }
        }
        Commands::Login { method } => match method {
            LoginMethod::Guest => {
                let user = state.session.sign_in_as_guest().await?;
                println!("Signed in as {}", user.name);
            }
            LoginMethod::Google => {
                let start = state.session.begin_google_sign_in().await?;
                println!("Open this URL in a browser to sign in with Google:");
                println!("{}", start.url);
                println!();
                println!("Then run: foodmagic callback '<redirect url>'");
            }
        },
        Commands::Callback { redirect_url } => {
            let user = state.session.complete_oauth_redirect(&redirect_url).await?;
            println!("Signed in as {} <{}>", user.name, user.email);
        }
        Commands::Logout => {
            state.session.sign_out().await?;
            println!("Signed out");
        }
        Commands::Suggest { ingredients } => {
            state.session.require_user().await?;
            let outcome = state
                .pipeline
                .analyze(PipelineInput::Text(ingredients))
                .await?;
            print_outcome(&outcome);
        }
        Commands::Scan {
            image,
            ingredients_only,
        } => {
            state.session.require_user().await?;
            let source = ImageSource::from_arg(&image);

            if ingredients_only {
                match state.pipeline.detect_ingredients(&source).await? {
                    DetectionOutcome::Detected(list) => print_ingredients(&list),
                    DetectionOutcome::NoIngredients => print_notice(&Notice::new(
                        "No results",
                        "No ingredients were detected.",
                    )),
                    DetectionOutcome::Superseded => {}
                }
            } else {
                let outcome = state.pipeline.analyze(PipelineInput::Image(source)).await?;
                print_outcome(&outcome);
            }
        }
    }

    Ok(())
}

fn print_outcome(outcome: &SuggestionOutcome) {
    if let Some(notice) = outcome.notice() {
        print_notice(&notice);
    }

    if let SuggestionOutcome::Recipes {
        ingredients,
        recipes,
    } = outcome
    {
        print_ingredients(ingredients);
        println!();
        for recipe in recipes {
            print_recipe(recipe);
        }
    }
}

fn print_ingredients(list: &IngredientList) {
    println!("Ingredients: {}", list.to_display_string());
}

fn print_recipe(recipe: &Recipe) {
    println!("== {} ==", recipe.name);
    if !recipe.description.is_empty() {
        println!("{}", recipe.description);
    }
    if !recipe.ingredients.is_empty() {
        println!("Ingredients:");
        for item in &recipe.ingredients {
            println!("  - {}", item);
        }
    }
    if !recipe.steps.is_empty() {
        println!("Steps:");
        for step in &recipe.steps {
            println!("  {}", step);
        }
    }
    println!();
}

fn print_notice(notice: &Notice) {
    eprintln!("{}: {}", notice.title, notice.message);
}
