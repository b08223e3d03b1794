//! Type-safe identifiers for protocol entities.
//!
//! Newtype wrappers keep call ids, target ids, session ids and window ids
//! from being mixed up at compile time.
//!
//! | Type | Wire form | Minted by |
//! |------|-----------|-----------|
//! | [`CallId`] | integer | local end, strictly increasing |
//! | [`TargetId`] | string | browser |
//! | [`SessionId`] | string | browser |
//! | [`WindowId`] | integer | browser |
//! | [`ExecutionContextId`] | integer | browser |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// CallId
// ============================================================================

/// Identifier correlating an outbound call with its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(u64);

impl CallId {
    /// Id reserved for target discovery during negotiation.
    pub const DISCOVER: Self = Self(0);

    /// Id reserved for session attachment during negotiation.
    pub const ATTACH: Self = Self(1);

    /// First id handed out once the dispatcher owns the connection.
    pub const FIRST_GENERAL: Self = Self(2);

    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// CallIdSequence
// ============================================================================

/// Monotonic source of [`CallId`]s for one connection.
///
/// Starts above the ids reserved for negotiation.
#[derive(Debug)]
pub struct CallIdSequence {
    next: AtomicU64,
}

impl CallIdSequence {
    /// Creates a sequence starting at [`CallId::FIRST_GENERAL`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(CallId::FIRST_GENERAL.0),
        }
    }

    /// Returns the next id. Never returns the same id twice.
    #[inline]
    pub fn next(&self) -> CallId {
        CallId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for CallIdSequence {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// String Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a browser-issued id.
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the id as a string slice.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }
    };
}

string_id! {
    /// Identifier of an inspectable target (a page or tab).
    TargetId
}

string_id! {
    /// Identifier of a debugging session attached to a target.
    SessionId
}

// ============================================================================
// Integer Identifiers
// ============================================================================

/// Identifier of a browser window, used for bounds operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(i64);

impl WindowId {
    /// Wraps a browser-issued window id.
    #[inline]
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a JavaScript execution context inside the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContextId(i64);

impl ExecutionContextId {
    /// Wraps a browser-issued context id.
    #[inline]
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ExecutionContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
