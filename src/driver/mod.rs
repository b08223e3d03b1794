//! Browser launching and process management.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SessionBuilder`] | Fluent launch configuration |
//! | [`BrowserOptions`] | Browser launch options |
//! | [`Flavor`] | Browser family and binary discovery |
//! | [`BrowserProcess`] | Supervised browser subprocess |
//! | [`Profile`] | User data directory management |
//!
//! # Example
//!
//! ```no_run
//! use proton::{Flavor, Session};
//!
//! # async fn example() -> proton::Result<()> {
//! let session = Session::builder()
//!     .flavor(Flavor::Edge)
//!     .url("https://example.com")
//!     .window_size(1280, 720)
//!     .launch()
//!     .await?;
//!
//! session.done().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Blank start page.
pub mod assets;

/// Browser binary discovery.
pub mod binary;

/// Fluent builder pattern for session configuration.
pub mod builder;

/// Startup sequencing.
pub(crate) mod launcher;

/// Browser launch options.
pub mod options;

/// Browser subprocess supervision.
pub mod process;

/// User data directory management.
pub mod profile;

// ============================================================================
// Re-exports
// ============================================================================

pub use binary::Flavor;
pub use builder::SessionBuilder;
pub use options::{BrowserOptions, DEFAULT_BROWSER_ARGS, DEFAULT_STARTUP_TIMEOUT};
pub use process::{BrowserProcess, KILL_GRACE_PERIOD, ProcessExit, ProcessMonitor};
pub use profile::Profile;
