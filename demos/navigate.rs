//! Navigation and window demonstration.
//!
//! Demonstrates:
//! - Navigating and reading page state
//! - Browser version and window bounds
//! - Page events through the event stream
//!
//! Usage:
//!   cargo run --example navigate
//!   cargo run --example navigate -- --no-wait

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use common::Args;
use proton::{Bounds, Result, Session};

// ============================================================================
// Constants
// ============================================================================

const TEST_URL: &str = "https://example.com";

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Navigate ===\n");

    println!("[Setup] Launching browser...");
    let session = args
        .apply(Session::builder().window_size(1024, 768))
        .launch()
        .await?;

    let version = session.version().await?;
    println!("        ✓ {} (protocol {})\n", version.product, version.protocol_version);

    // ========================================================================
    // Navigation
    // ========================================================================

    let mut events = session.events();

    println!("[1] Navigating to {TEST_URL}...");
    session.navigate(TEST_URL).await?;

    let loaded = tokio::time::timeout(Duration::from_secs(10), async {
        while let Ok(event) = events.recv().await {
            if event.method == "Page.loadEventFired" {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    println!("    ✓ Load event seen: {loaded}\n");

    let title: String = session.eval_as("document.title").await?;
    println!("[2] Title: {title}\n");

    // ========================================================================
    // Window
    // ========================================================================

    if session.window_id().is_some() {
        println!("[3] Moving window");
        session.set_bounds(Bounds::new(40, 40, 900, 700)).await?;
        let bounds = session.bounds().await?;
        println!("    ✓ {bounds:?}\n");
    }

    common::wait_for_exit(&session, args.no_wait).await;
    session.close().await?;
    println!("=== Done ===");
    Ok(())
}
