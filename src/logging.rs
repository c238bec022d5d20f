// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Structured JSON logging on stderr.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter for a verbosity count (`-v` debug, `-vv` trace).
pub fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "foodmagic=info,warn",
        1 => "foodmagic=debug,info",
        _ => "foodmagic=trace,debug",
    }
}

/// Initialize logging. `RUST_LOG` overrides the verbosity default.
pub fn init_logging(verbose: u8) {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true)
        .with_writer(std::io::stderr);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
