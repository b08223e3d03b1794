//! Request and reply message types.
//!
//! Defines the envelope format for calls and replies between the local end
//! (Rust) and the browser, including the two-level session wrapping.
//!
//! # Envelopes
//!
//! Outbound call:
//! ```json
//! { "id": 7, "method": "Runtime.evaluate", "params": { ... } }
//! ```
//!
//! Session-scoped calls are serialized to a string and carried inside an
//! outer `Target.sendMessageToTarget` envelope:
//! ```json
//! { "id": 7, "method": "Target.sendMessageToTarget",
//!   "params": { "sessionId": "...", "message": "{\"id\":7,...}" } }
//! ```
//!
//! Inbound messages share one shape; replies carry `id` with `result` or
//! `error`, events carry `method` and `params`.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{CallId, SessionId};

use super::{Command, TargetCommand};

// ============================================================================
// Request
// ============================================================================

/// An outbound call envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// Unique identifier for call/reply correlation.
    pub id: CallId,

    /// Method in `Domain.methodName` form.
    pub method: String,

    /// Parameters object.
    pub params: Value,
}

impl Request {
    /// Creates a request from a typed command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be serialized.
    pub fn new(id: CallId, command: Command) -> Result<Self> {
        let (method, params) = command.into_parts()?;
        Ok(Self { id, method, params })
    }

    /// Wraps this request for delivery to an attached session.
    ///
    /// The outer envelope reuses the inner id, so a transport-level failure
    /// of the outer call can be routed to the same pending caller.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn into_session_envelope(self, session_id: &SessionId) -> Result<Self> {
        let message = serde_json::to_string(&self)?;
        let outer = Command::Target(TargetCommand::SendMessageToTarget {
            message,
            session_id: session_id.clone(),
        });
        Self::new(self.id, outer)
    }

    /// Serializes the request to JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    #[inline]
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Message
// ============================================================================

/// Any inbound envelope: reply or event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    /// Call id (replies only).
    #[serde(default)]
    pub id: Option<CallId>,

    /// Event name (events only).
    #[serde(default)]
    pub method: Option<String>,

    /// Event params.
    #[serde(default)]
    pub params: Value,

    /// Reply payload.
    #[serde(default)]
    pub result: Option<Value>,

    /// Reply error.
    #[serde(default)]
    pub error: Option<ProtocolError>,
}

/// Error object carried by a failed reply.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ProtocolError {
    /// Numeric error code.
    #[serde(default)]
    pub code: Option<i64>,

    /// Human-readable message.
    #[serde(default)]
    pub message: String,

    /// Extra detail, if any.
    #[serde(default)]
    pub data: Option<Value>,
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol {
            code: err.code,
            message: err.message,
        }
    }
}

impl Message {
    /// Parses an inbound message from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the text is not a valid envelope.
    #[inline]
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Returns `true` if this message is an event.
    #[inline]
    #[must_use]
    pub fn is_event(&self) -> bool {
        self.id.is_none() && self.method.is_some()
    }

    /// Returns the event method, or an empty string for replies.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or_default()
    }

    /// Classifies a reply into the caller's outcome.
    ///
    /// Checked in priority order:
    ///
    /// 1. a top-level `error` object fails with [`Error::Protocol`];
    /// 2. `result.exceptionDetails.exception.value` fails with
    ///    [`Error::Script`] built from that value;
    /// 3. a `result.result` of type `object` and subtype `error` fails with
    ///    [`Error::Script`] built from its description;
    /// 4. a typed `result.result` yields its `value`;
    /// 5. anything else yields the raw `result` payload.
    ///
    /// # Errors
    ///
    /// See the list above.
    pub fn into_outcome(self) -> Result<Value> {
        if let Some(error) = self.error {
            return Err(error.into());
        }

        let Some(result) = self.result else {
            return Ok(Value::Null);
        };

        let typed = RemoteReply::deserialize(&result).unwrap_or_default();

        if let Some(value) = typed
            .exception_details
            .and_then(|details| details.exception)
            .and_then(|exception| exception.value)
        {
            return Err(Error::script(exception_message(value)));
        }

        if let Some(object) = typed.result
            && let Some(kind) = object.kind
        {
            if kind == "object" && object.subtype.as_deref() == Some("error") {
                return Err(Error::script(object.description.unwrap_or_default()));
            }
            return Ok(object.value.unwrap_or(Value::Null));
        }

        Ok(result)
    }
}

/// Renders an exception value the way the page would show it.
fn exception_message(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

// ============================================================================
// RemoteReply
// ============================================================================

/// Typed view of an evaluation-style `result` payload.
#[derive(Debug, Default, Deserialize)]
struct RemoteReply {
    #[serde(default)]
    result: Option<RemoteObject>,

    #[serde(rename = "exceptionDetails", default)]
    exception_details: Option<ExceptionDetails>,
}

/// Mirror of the protocol's `Runtime.RemoteObject`.
#[derive(Debug, Default, Deserialize)]
struct RemoteObject {
    #[serde(rename = "type", default)]
    kind: Option<String>,

    #[serde(default)]
    subtype: Option<String>,

    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    value: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ExceptionDetails {
    #[serde(default)]
    exception: Option<ExceptionObject>,
}

#[derive(Debug, Default, Deserialize)]
struct ExceptionObject {
    #[serde(default)]
    value: Option<Value>,
}

// ============================================================================
// Tests
// ============================================================================
