//! Command definitions organized by protocol domain.
//!
//! Commands follow the DevTools `Domain.methodName` format. Only the methods
//! the engine itself issues are typed here; anything else goes through
//! [`RawCommand`].
//!
//! # Command Domains
//!
//! | Domain | Commands |
//! |--------|----------|
//! | `Target` | Discovery, attachment, session messaging |
//! | `Page` | Navigation, script injection |
//! | `Runtime` | Evaluation, bindings |
//! | `Browser` | Version, windows, shutdown |
//! | `Network` | Enable, cache and cookie clearing |
//! | `Security` / `Performance` / `Log` | Enable |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::{ExecutionContextId, SessionId, TargetId, WindowId};

// ============================================================================
// Command Wrapper
// ============================================================================

/// All protocol commands organized by domain.
///
/// This enum wraps domain-specific command enums for unified serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Target domain commands.
    Target(TargetCommand),
    /// Page domain commands.
    Page(PageCommand),
    /// Runtime domain commands.
    Runtime(RuntimeCommand),
    /// Browser domain commands.
    Browser(BrowserCommand),
    /// Network domain commands.
    Network(NetworkCommand),
    /// Security domain commands.
    Security(SecurityCommand),
    /// Performance domain commands.
    Performance(PerformanceCommand),
    /// Log domain commands.
    Log(LogCommand),
    /// Any other method, with free-form params.
    Raw(RawCommand),
}

impl Command {
    /// Splits the command into its wire `method` and `params` object.
    ///
    /// Commands without parameters yield an empty object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails, or
    /// [`Error::Protocol`] if the command does not serialize to an object
    /// with a `method` field.
    pub fn into_parts(self) -> Result<(String, Value)> {
        let Value::Object(mut object) = serde_json::to_value(self)? else {
            return Err(Error::protocol("command did not serialize to an object"));
        };

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err(Error::protocol("command is missing its method")),
        };

        let params = match object.remove("params") {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(params) => params,
        };

        Ok((method, params))
    }
}

// ============================================================================
// Target Commands
// ============================================================================

/// Target domain commands for discovery and session multiplexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum TargetCommand {
    /// Enable `targetCreated` / `targetDestroyed` notifications.
    #[serde(rename = "Target.setDiscoverTargets")]
    SetDiscoverTargets {
        /// Whether to discover targets.
        discover: bool,
    },

    /// Attach a debugging session to a target.
    #[serde(rename = "Target.attachToTarget")]
    AttachToTarget {
        /// Target to attach to.
        #[serde(rename = "targetId")]
        target_id: TargetId,
    },

    /// Carry an inner message to an attached session.
    #[serde(rename = "Target.sendMessageToTarget")]
    SendMessageToTarget {
        /// JSON-encoded inner envelope.
        message: String,
        /// Session the message is for.
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },

    /// Attach to child targets automatically.
    #[serde(rename = "Target.setAutoAttach")]
    SetAutoAttach {
        /// Whether to auto-attach.
        #[serde(rename = "autoAttach")]
        auto_attach: bool,
        /// Whether new targets pause until resumed.
        #[serde(rename = "waitForDebuggerOnStart")]
        wait_for_debugger_on_start: bool,
    },
}

// ============================================================================
// Page Commands
// ============================================================================

/// Page domain commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum PageCommand {
    /// Enable page notifications.
    #[serde(rename = "Page.enable")]
    Enable,

    /// Navigate the page to a URL.
    #[serde(rename = "Page.navigate")]
    Navigate {
        /// Destination URL.
        url: String,
    },

    /// Reload the page.
    #[serde(rename = "Page.reload")]
    Reload {
        /// Bypass the cache.
        #[serde(rename = "ignoreCache", skip_serializing_if = "Option::is_none")]
        ignore_cache: Option<bool>,
    },

    /// Stop all pending navigations and fetches.
    #[serde(rename = "Page.stopLoading")]
    StopLoading,

    /// Activate the page's tab.
    #[serde(rename = "Page.bringToFront")]
    BringToFront,

    /// Run a script in every future document before its own scripts.
    #[serde(rename = "Page.addScriptToEvaluateOnNewDocument")]
    AddScriptToEvaluateOnNewDocument {
        /// Script source.
        source: String,
    },
}

// ============================================================================
// Runtime Commands
// ============================================================================

/// Runtime domain commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum RuntimeCommand {
    /// Enable runtime notifications (console, contexts, bindings).
    #[serde(rename = "Runtime.enable")]
    Enable,

    /// Evaluate an expression.
    #[serde(rename = "Runtime.evaluate")]
    Evaluate {
        /// Expression to evaluate.
        expression: String,
        /// Context to evaluate in; the page's main context if absent.
        #[serde(rename = "contextId", skip_serializing_if = "Option::is_none")]
        context_id: Option<ExecutionContextId>,
        /// Wait for a returned promise to settle.
        #[serde(rename = "awaitPromise", skip_serializing_if = "Option::is_none")]
        await_promise: Option<bool>,
        /// Return the result as a JSON value instead of a remote reference.
        #[serde(rename = "returnByValue", skip_serializing_if = "Option::is_none")]
        return_by_value: Option<bool>,
    },

    /// Expose a raw binding function on the page's global object.
    #[serde(rename = "Runtime.addBinding")]
    AddBinding {
        /// Global name of the binding.
        name: String,
    },
}

impl RuntimeCommand {
    /// Evaluates `expression`, awaiting promises and returning by value.
    #[must_use]
    pub fn evaluate(expression: impl Into<String>) -> Self {
        Self::Evaluate {
            expression: expression.into(),
            context_id: None,
            await_promise: Some(true),
            return_by_value: Some(true),
        }
    }

    /// Evaluates `expression` inside a specific execution context.
    #[must_use]
    pub fn evaluate_in(expression: impl Into<String>, context_id: ExecutionContextId) -> Self {
        Self::Evaluate {
            expression: expression.into(),
            context_id: Some(context_id),
            await_promise: None,
            return_by_value: None,
        }
    }
}

// ============================================================================
// Browser Commands
// ============================================================================

/// Browser domain commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum BrowserCommand {
    /// Get product and protocol version information.
    #[serde(rename = "Browser.getVersion")]
    GetVersion,

    /// Close the browser gracefully.
    #[serde(rename = "Browser.close")]
    Close,

    /// Resolve the window hosting a target.
    #[serde(rename = "Browser.getWindowForTarget")]
    GetWindowForTarget {
        /// Target whose window to resolve.
        #[serde(rename = "targetId")]
        target_id: TargetId,
    },

    /// Get a window's position and size.
    #[serde(rename = "Browser.getWindowBounds")]
    GetWindowBounds {
        /// Window to query.
        #[serde(rename = "windowId")]
        window_id: WindowId,
    },

    /// Set a window's position, size or state.
    #[serde(rename = "Browser.setWindowBounds")]
    SetWindowBounds {
        /// Window to change.
        #[serde(rename = "windowId")]
        window_id: WindowId,
        /// New bounds.
        bounds: Bounds,
    },
}

// ============================================================================
// Network / Security / Performance / Log Commands
// ============================================================================

/// Network domain commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum NetworkCommand {
    /// Enable network notifications.
    #[serde(rename = "Network.enable")]
    Enable,

    /// Clear the browser cache.
    #[serde(rename = "Network.clearBrowserCache")]
    ClearBrowserCache,

    /// Clear all browser cookies.
    #[serde(rename = "Network.clearBrowserCookies")]
    ClearBrowserCookies,
}

/// Security domain commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum SecurityCommand {
    /// Enable security notifications.
    #[serde(rename = "Security.enable")]
    Enable,
}

/// Performance domain commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum PerformanceCommand {
    /// Enable metric collection.
    #[serde(rename = "Performance.enable")]
    Enable,
}

/// Log domain commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum LogCommand {
    /// Enable log entry notifications.
    #[serde(rename = "Log.enable")]
    Enable,
}

// ============================================================================
// RawCommand
// ============================================================================

/// An untyped command: any method with any params object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCommand {
    /// Method in `Domain.methodName` form.
    pub method: String,
    /// Parameters object.
    pub params: Value,
}

impl RawCommand {
    /// Creates a raw command.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

// ============================================================================
// Bounds
// ============================================================================

/// State of a browser window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowState {
    /// Regular window.
    #[default]
    Normal,
    /// Maximized window.
    Maximized,
    /// Minimized window.
    Minimized,
    /// Fullscreen window.
    Fullscreen,
}

/// Position, size and state of a browser window.
///
/// Only [`WindowState::Normal`] windows accept position and size; for any
/// other state only the state itself is sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    /// Offset from the left edge of the screen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<i64>,
    /// Offset from the top edge of the screen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<i64>,
    /// Window width in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    /// Window height in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    /// Window state.
    #[serde(rename = "windowState", default)]
    pub window_state: WindowState,
}

impl Bounds {
    /// Bounds for a normal window at the given position and size.
    #[must_use]
    pub const fn new(left: i64, top: i64, width: i64, height: i64) -> Self {
        Self {
            left: Some(left),
            top: Some(top),
            width: Some(width),
            height: Some(height),
            window_state: WindowState::Normal,
        }
    }

    /// Bounds that only change the window state.
    #[must_use]
    pub const fn state(window_state: WindowState) -> Self {
        Self {
            left: None,
            top: None,
            width: None,
            height: None,
            window_state,
        }
    }

    /// Strips position and size when the state is not [`WindowState::Normal`].
    #[must_use]
    pub const fn normalized(self) -> Self {
        match self.window_state {
            WindowState::Normal => self,
            state => Self::state(state),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
