//! Caller-facing session API.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Session`] | Browser page handle: commands, bindings, lifecycle |
//! | [`DoneSignal`] | Completion signal of a session |
//! | [`Version`] | Browser version information |
//!
//! # Example
//!
//! ```no_run
//! use proton::{Result, Session};
//!
//! # async fn example() -> Result<()> {
//! let session = Session::builder().url("https://example.com").launch().await?;
//! let title: String = session.eval_as("document.title").await?;
//! println!("{title}");
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Session completion tracking.
pub mod lifecycle;

/// Browser session handle.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use lifecycle::DoneSignal;
pub use session::{Session, Version};
