//! WebSocket transport layer.
//!
//! This module handles communication between the local end (Rust) and the
//! browser's DevTools endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Session (Rust) │                              │  Browser        │
//! │                 │         WebSocket            │                 │
//! │  Endpoint       │◄────────────────────────────►│  DevTools       │
//! │  → negotiate    │   ws://127.0.0.1:PORT/...    │  endpoint       │
//! │  → Connection   │                              │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. [`Endpoint::from_log_line`] - Parse the announced endpoint
//! 2. [`Endpoint::connect`] - Open the WebSocket
//! 3. [`negotiate`] - Discover the page target and attach a session
//! 4. [`Connection`] - Send calls, receive replies and events
//! 5. [`Connection::shutdown`] - Close the socket
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Correlator and event loop |
//! | `endpoint` | Endpoint parsing and WebSocket connect |
//! | `negotiator` | Target discovery and session attach |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// DevTools endpoint parsing and connect.
pub mod endpoint;

/// Target discovery and session attach.
pub mod negotiator;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, DisconnectReason};
pub use endpoint::{Endpoint, WsStream};
pub use negotiator::{Negotiated, negotiate};
