//! Event message types.
//!
//! Events are unsolicited notifications from the browser. They arrive either
//! at the browser level (target lifecycle, session traffic) or, unwrapped
//! from a session envelope, at the page level (console, exceptions, binding
//! calls).
//!
//! # Event Types
//!
//! | Domain | Events |
//! |--------|--------|
//! | `Target` | `targetCreated`, `targetDestroyed`, `receivedMessageFromTarget` |
//! | `Runtime` | `consoleAPICalled`, `exceptionThrown`, `bindingCalled` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::{ExecutionContextId, SessionId, TargetId};

use super::Message;

// ============================================================================
// Event
// ============================================================================

/// An event notification from the browser.
///
/// # Format
///
/// ```json
/// { "method": "Domain.eventName", "params": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Event {
    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,
}

impl Event {
    /// Creates an event.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Returns the domain from the method.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let event = Event::new("Page.loadEventFired", json!({}));
    /// assert_eq!(event.domain(), "Page");
    /// ```
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns the event name from the method.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.method.split('.').nth(1).unwrap_or_default()
    }

    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        self.parse_internal()
    }
}

impl Message {
    /// Converts the message into an event, or `None` if it is a reply.
    #[must_use]
    pub fn into_event(self) -> Option<Event> {
        match (self.id, self.method) {
            (None, Some(method)) => Some(Event::new(method, self.params)),
            _ => None,
        }
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// A new target appeared.
    TargetCreated {
        /// Target ID.
        target_id: TargetId,
        /// Target type (`page`, `iframe`, `service_worker`, `other`, ...).
        kind: String,
        /// Target URL.
        url: String,
    },

    /// A target went away.
    TargetDestroyed {
        /// Target ID.
        target_id: TargetId,
    },

    /// A session-scoped message arrived inside an outer envelope.
    ReceivedMessageFromTarget {
        /// Session the message belongs to.
        session_id: SessionId,
        /// JSON-encoded inner envelope.
        message: String,
    },

    /// Page script wrote to the console.
    ConsoleApiCalled {
        /// Console method (`log`, `warn`, `error`, ...).
        kind: String,
        /// Argument remote objects.
        args: Vec<Value>,
    },

    /// An exception went uncaught in the page.
    ExceptionThrown {
        /// Exception summary text.
        text: String,
        /// Exception description, when available.
        description: Option<String>,
    },

    /// Page script called a raw binding.
    BindingCalled {
        /// Binding name.
        name: String,
        /// String payload passed to the binding.
        payload: String,
        /// Context the call came from.
        execution_context_id: ExecutionContextId,
    },

    /// Any other event.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Event Parsing Implementation
// ============================================================================

impl Event {
    /// Internal parsing implementation.
    fn parse_internal(&self) -> ParsedEvent {
        match self.method.as_str() {
            "Target.targetCreated" => {
                let info = self.params.get("targetInfo").unwrap_or(&Value::Null);
                ParsedEvent::TargetCreated {
                    target_id: TargetId::new(get_string(info, "targetId")),
                    kind: get_string(info, "type"),
                    url: get_string(info, "url"),
                }
            }

            "Target.targetDestroyed" => ParsedEvent::TargetDestroyed {
                target_id: TargetId::new(get_string(&self.params, "targetId")),
            },

            "Target.receivedMessageFromTarget" => ParsedEvent::ReceivedMessageFromTarget {
                session_id: SessionId::new(get_string(&self.params, "sessionId")),
                message: get_string(&self.params, "message"),
            },

            "Runtime.consoleAPICalled" => ParsedEvent::ConsoleApiCalled {
                kind: get_string(&self.params, "type"),
                args: self
                    .params
                    .get("args")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
            },

            "Runtime.exceptionThrown" => {
                let details = self
                    .params
                    .get("exceptionDetails")
                    .unwrap_or(&Value::Null);
                ParsedEvent::ExceptionThrown {
                    text: get_string(details, "text"),
                    description: details
                        .get("exception")
                        .and_then(|e| e.get("description"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                }
            }

            "Runtime.bindingCalled" => ParsedEvent::BindingCalled {
                name: get_string(&self.params, "name"),
                payload: get_string(&self.params, "payload"),
                execution_context_id: ExecutionContextId::new(
                    self.params
                        .get("executionContextId")
                        .and_then(Value::as_i64)
                        .unwrap_or_default(),
                ),
            },

            _ => ParsedEvent::Unknown {
                method: self.method.clone(),
                params: self.params.clone(),
            },
        }
    }
}

/// Gets a string field, empty if missing.
#[inline]
fn get_string(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// BindingInvocation
// ============================================================================

/// Payload the page-side proxy sends through a raw binding.
///
/// # Format
///
/// ```json
/// { "name": "add", "seq": 3, "args": [1, 2] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingInvocation {
    /// Binding name.
    pub name: String,

    /// Per-proxy sequence number matching the pending promise.
    pub seq: u64,

    /// Call arguments, still encoded.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl BindingInvocation {
    /// Decodes an invocation from a binding payload string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if the payload is malformed.
    #[inline]
    pub fn parse(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_domain_and_name() {
        let event = Event::new("Page.loadEventFired", json!({}));
        assert_eq!(event.domain(), "Page");
        assert_eq!(event.event_name(), "loadEventFired");
    }

    #[test]
    fn test_target_created_parsing() {
        let event: Event = serde_json::from_str(
            r#"{"method":"Target.targetCreated","params":{"targetInfo":{
                "targetId":"T1","type":"page","url":"about:blank","attached":false}}}"#,
        )
        .expect("parse event");

        match event.parse() {
            ParsedEvent::TargetCreated {
                target_id,
                kind,
                url,
            } => {
                assert_eq!(target_id.as_str(), "T1");
                assert_eq!(kind, "page");
                assert_eq!(url, "about:blank");
            }
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_received_message_parsing() {
        let event = Event::new(
            "Target.receivedMessageFromTarget",
            json!({"sessionId": "S1", "message": "{\"id\":2,\"result\":{}}", "targetId": "T1"}),
        );

        match event.parse() {
            ParsedEvent::ReceivedMessageFromTarget {
                session_id,
                message,
            } => {
                assert_eq!(session_id.as_str(), "S1");
                assert!(message.contains("\"id\":2"));
            }
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_binding_called_parsing() {
        let event = Event::new(
            "Runtime.bindingCalled",
            json!({
                "name": "add",
                "payload": "{\"name\":\"add\",\"seq\":1,\"args\":[1,2]}",
                "executionContextId": 4
            }),
        );

        let ParsedEvent::BindingCalled {
            name,
            payload,
            execution_context_id,
        } = event.parse()
        else {
            panic!("expected BindingCalled");
        };

        assert_eq!(name, "add");
        assert_eq!(execution_context_id, ExecutionContextId::new(4));

        let invocation = BindingInvocation::parse(&payload).expect("payload");
        assert_eq!(invocation.seq, 1);
        assert_eq!(invocation.args, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_exception_thrown_parsing() {
        let event = Event::new(
            "Runtime.exceptionThrown",
            json!({"exceptionDetails": {
                "text": "Uncaught",
                "exception": {"description": "Error: nope"}
            }}),
        );

        assert_eq!(
            event.parse(),
            ParsedEvent::ExceptionThrown {
                text: "Uncaught".into(),
                description: Some("Error: nope".into()),
            }
        );
    }

    #[test]
    fn test_unknown_event() {
        let event = Event::new("Network.requestWillBeSent", json!({"requestId": "R1"}));
        match event.parse() {
            ParsedEvent::Unknown { method, params } => {
                assert_eq!(method, "Network.requestWillBeSent");
                assert_eq!(params["requestId"], "R1");
            }
            other => panic!("expected Unknown variant, got {other:?}"),
        }
    }

    #[test]
    fn test_reply_is_not_an_event() {
        let message = Message::parse(r#"{"id":3,"result":{}}"#).expect("parse");
        assert!(message.into_event().is_none());
    }

    #[test]
    fn test_malformed_binding_payload() {
        assert!(BindingInvocation::parse("not json").is_err());
    }
}
