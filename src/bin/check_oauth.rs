// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth configuration check.
//!
//! Reports which settings are present, checks that Supabase Auth answers,
//! and generates the OAuth URL a sign-in would open. Always exits 0; the
//! output is meant for a human.

use std::sync::Arc;

use foodmagic::config::{var_with_fallback, Config};
use foodmagic::logging::init_logging;
use foodmagic::services::{IdentityProvider, SupabaseAuthClient};
use foodmagic::store::MemoryStore;

#[tokio::main]
async fn main() {
    init_logging(0);
    dotenvy::dotenv().ok();

    println!("Checking OAuth configuration...\n");

    println!("Environment:");
    let url = var_with_fallback("SUPABASE_URL", "EXPO_PUBLIC_SUPABASE_URL");
    let key = var_with_fallback("SUPABASE_ANON_KEY", "EXPO_PUBLIC_SUPABASE_ANON_KEY");
    println!("  SUPABASE_URL:      {}", presence(url.is_some()));
    println!("  SUPABASE_ANON_KEY: {}", presence(key.is_some()));
    println!(
        "  REDIRECT_URL:      {}\n",
        var_with_fallback("REDIRECT_URL", "EXPO_PUBLIC_REDIRECT_URL")
            .unwrap_or_else(|| "exp://localhost:8081 (default)".to_string())
    );

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("Cannot continue: {e}");
            print_next_steps();
            return;
        }
    };

    // Scratch store: the check must not touch the real saved session.
    let client = match SupabaseAuthClient::new(&config, Arc::new(MemoryStore::new())) {
        Ok(client) => client,
        Err(e) => {
            println!("Cannot build HTTP client: {e:#}");
            return;
        }
    };

    match client.settings().await {
        Ok(settings) => {
            println!("Connected to Supabase Auth");
            if settings.provider_enabled("google") {
                println!("Google provider: enabled");
            } else {
                println!("Google provider: NOT enabled");
                println!("  Possible causes:");
                println!("   - Google provider not enabled in the Supabase dashboard");
                println!("   - Client ID/secret not configured");
            }
        }
        Err(e) => println!("Could not reach Supabase Auth: {e}"),
    }

    match client
        .sign_in_with_oauth("google", &config.redirect_url)
        .await
    {
        Ok(start) => {
            println!("\nOAuth URL generated:");
            println!("  {}", start.url);
            println!("\nSigning in will open this URL.");
        }
        Err(e) => println!("\nCould not generate OAuth URL: {e}"),
    }

    print_next_steps();
}

fn presence(present: bool) -> &'static str {
    if present {
        "set"
    } else {
        "MISSING"
    }
}

fn print_next_steps() {
    println!("\nIf anything above failed:");
    println!("1. Create an OAuth 2.0 Client ID in Google Cloud Console");
    println!("2. Copy the client ID and secret into the Supabase dashboard");
    println!("3. Add the redirect URL to the allowed redirect URLs");
}
