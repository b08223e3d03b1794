//! Proton - drive a local Chromium-family browser over the DevTools protocol.
//!
//! This library launches Chrome, Chromium or Edge, attaches to its page
//! over one WebSocket, and lets Rust functions be called from page script.
//!
//! # Architecture
//!
//! - **Process**: the browser runs as a supervised subprocess and announces
//!   its DevTools endpoint on stderr
//! - **Session**: one page target, one protocol session, multiplexed over
//!   `Target.sendMessageToTarget`
//! - **Event loop**: one task owns the socket, correlates replies by id and
//!   routes events
//! - **Bindings**: page calls to bound names run Rust functions in their own
//!   tasks and settle the page's promise with the result
//!
//! # Quick Start
//!
//! ```no_run
//! use proton::{Result, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = Session::builder()
//!         .title("Hello")
//!         .window_size(800, 600)
//!         .launch()
//!         .await?;
//!
//!     session.bind("greet", |name: String| format!("Hello, {name}!")).await?;
//!     let greeting = session.eval("window.greet('world')").await?;
//!     println!("{greeting}");
//!
//!     // Returns once the user closes the window.
//!     session.done().await;
//!     session.close().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`browser`] | [`Session`] handle and completion signal |
//! | [`bridge`] | Host function bindings |
//! | [`driver`] | Launch configuration and process management |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | DevTools message types |
//! | [`transport`] | WebSocket connection and session negotiation |

// ============================================================================
// Modules
// ============================================================================

/// Session handle and lifecycle.
pub mod browser;

/// Host function bindings callable from page script.
pub mod bridge;

/// Launch configuration and process management.
///
/// Use [`Session::builder()`] to configure and launch a browser.
pub mod driver;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// DevTools protocol message types.
pub mod protocol;

/// WebSocket transport layer.
pub mod transport;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Session types
pub use browser::{DoneSignal, Session, Version};

// Binding types
pub use bridge::{BindingError, BindingFn, BindingResult, IntoBindingResult, Json, binding_fn};

// Driver types
pub use driver::{BrowserOptions, Flavor, Profile, SessionBuilder};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CallId, ExecutionContextId, SessionId, TargetId, WindowId};

// Protocol types
pub use protocol::{Bounds, Command, Event, WindowState};

// Transport types
pub use transport::{Connection, DisconnectReason};
