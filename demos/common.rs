//! Shared utilities for demos.
//!
//! Provides common functionality used across all demos:
//! - Command-line argument parsing
//! - Logging initialization
//! - Graceful exit handling

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    pub no_wait: bool,
    pub headless: bool,
    pub binary: Option<PathBuf>,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self {
            debug: args.iter().any(|a| a == "--debug"),
            no_wait: args.iter().any(|a| a == "--no-wait"),
            headless: args.iter().any(|a| a == "--headless"),
            binary: args
                .iter()
                .find_map(|a| a.strip_prefix("--binary="))
                .map(PathBuf::from),
        }
    }

    /// Applies the shared flags to a session builder.
    pub fn apply(&self, mut builder: proton::SessionBuilder) -> proton::SessionBuilder {
        builder = builder.debug(self.debug);
        if self.headless {
            builder = builder.headless();
        }
        if let Some(binary) = &self.binary {
            builder = builder.binary(binary);
        }
        builder
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
pub fn init_logging(debug: bool) {
    let filter = if debug { "proton=debug" } else { "proton=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

/// Wait for the session to end, Ctrl+C, or skip if `--no-wait` is set.
pub async fn wait_for_exit(session: &proton::Session, no_wait: bool) {
    if no_wait {
        println!("[--no-wait] Skipping wait");
        return;
    }

    println!("Close the window or press Ctrl+C to exit...");
    tokio::select! {
        () = session.done() => println!("Browser window closed"),
        _ = tokio::signal::ctrl_c() => {}
    }
}
