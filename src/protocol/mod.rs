//! DevTools protocol message types.
//!
//! This module defines the message format for communication between the
//! local end (Rust) and the browser.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Local → Browser | Command call |
//! | `Message` (reply) | Browser → Local | Call result or error |
//! | `Event` | Browser → Local | Unsolicited notification |
//!
//! Page-scoped traffic is wrapped twice: the inner envelope is serialized to
//! a string and carried by an outer `Target.sendMessageToTarget` /
//! `Target.receivedMessageFromTarget` envelope naming the session.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command definitions by domain |
//! | `event` | Event types and binding payloads |
//! | `request` | Request and reply envelopes |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions organized by domain.
pub mod command;

/// Event message types.
pub mod event;

/// Request and reply message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    Bounds, BrowserCommand, Command, LogCommand, NetworkCommand, PageCommand,
    PerformanceCommand, RawCommand, RuntimeCommand, SecurityCommand, TargetCommand, WindowState,
};
pub use event::{BindingInvocation, Event, ParsedEvent};
pub use request::{Message, ProtocolError, Request};
