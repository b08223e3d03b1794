//! Function binding demonstration.
//!
//! Demonstrates:
//! - Sync and async Rust functions callable from page script
//! - Value, error-only and value-plus-error return shapes
//! - Rejected promises for wrong argument counts
//!
//! Usage:
//!   cargo run --example bind
//!   cargo run --example bind -- --headless --no-wait
//!   cargo run --example bind -- --debug --binary=/usr/bin/chromium

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use common::Args;
use proton::{Result, Session};
use serde_json::json;

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
    println!("=== Bind: Rust functions in the page ===\n");

    // ========================================================================
    // Setup
    // ========================================================================

    println!("[Setup] Launching browser...");
    let session = args
        .apply(Session::builder().title("proton bind demo").window_size(800, 600))
        .launch()
        .await?;
    println!("        ✓ Session ready (target={})\n", session.target_id());

    // ========================================================================
    // Bindings
    // ========================================================================

    session.bind("add", |a: i64, b: i64| a + b).await?;
    session
        .bind("divide", |a: f64, b: f64| -> std::result::Result<f64, String> {
            if b == 0.0 {
                Err("division by zero".to_string())
            } else {
                Ok(a / b)
            }
        })
        .await?;
    session
        .bind_async("slow_echo", |text: String| async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            text
        })
        .await?;
    println!("[1] Bound: {:?}\n", session.binding_names());

    // ========================================================================
    // Calls from the page
    // ========================================================================

    println!("[2] add(2, 3)");
    let sum = session.eval("window.add(2, 3)").await?;
    assert_eq!(sum, json!(5));
    println!("    ✓ {sum}\n");

    println!("[3] divide(1, 0) rejects");
    let message = session
        .eval("window.divide(1, 0).catch(e => String(e))")
        .await?;
    println!("    ✓ {message}\n");

    println!("[4] Concurrent slow_echo calls");
    let echoes = session
        .eval("Promise.all(['a', 'b', 'c'].map(t => window.slow_echo(t)))")
        .await?;
    assert_eq!(echoes, json!(["a", "b", "c"]));
    println!("    ✓ {echoes}\n");

    println!("[5] add(1) rejects with an arity error");
    let message = session.eval("window.add(1).catch(e => String(e))").await?;
    println!("    ✓ {message}\n");

    common::wait_for_exit(&session, args.no_wait).await;
    session.close().await?;
    println!("=== Done ===");
    Ok(())
}
