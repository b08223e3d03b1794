//! Target discovery and session attach.
//!
//! Runs directly over the WebSocket before the event loop exists, using the
//! reserved call ids `0` and `1`:
//!
//! 1. `Target.setDiscoverTargets { discover: true }`, then read until a
//!    `Target.targetCreated` event for a `page` target
//! 2. `Target.attachToTarget { targetId }`, then read until reply `1`
//!
//! Everything else seen on the wire meanwhile is skipped.

// ============================================================================
// Imports
// ============================================================================

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{CallId, SessionId, TargetId};
use crate::protocol::{Command, Message, ParsedEvent, Request, TargetCommand};

use super::endpoint::WsStream;

// ============================================================================
// Constants
// ============================================================================

/// Target type the session attaches to.
const PAGE_TARGET_TYPE: &str = "page";

// ============================================================================
// Negotiated
// ============================================================================

/// Outcome of a successful negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// Page target the session is attached to.
    pub target_id: TargetId,
    /// Session carrying page-scoped traffic.
    pub session_id: SessionId,
}

// ============================================================================
// Negotiation
// ============================================================================

/// Discovers the page target and attaches a session to it.
///
/// # Errors
///
/// - [`Error::Negotiation`] if discovery or attach is rejected
/// - [`Error::ConnectionClosed`] if the stream ends first
/// - [`Error::WebSocket`] on socket failure
pub async fn negotiate(ws: &mut WsStream) -> Result<Negotiated> {
    let target_id = discover_page_target(ws).await?;
    debug!(%target_id, "Page target discovered");

    let session_id = attach_to_target(ws, &target_id).await?;
    info!(%target_id, %session_id, "Attached to page target");

    Ok(Negotiated {
        target_id,
        session_id,
    })
}

/// Enables target discovery and waits for the first page target.
async fn discover_page_target(ws: &mut WsStream) -> Result<TargetId> {
    send_call(
        ws,
        CallId::DISCOVER,
        Command::Target(TargetCommand::SetDiscoverTargets { discover: true }),
    )
    .await?;

    loop {
        let message = next_message(ws).await?;

        if message.id == Some(CallId::DISCOVER) {
            if let Some(error) = message.error {
                return Err(Error::negotiation(format!(
                    "Target discovery rejected: {}",
                    error.message
                )));
            }
            continue;
        }

        let Some(event) = message.into_event() else {
            continue;
        };

        match event.parse() {
            ParsedEvent::TargetCreated { target_id, kind, .. } if kind == PAGE_TARGET_TYPE => {
                return Ok(target_id);
            }
            ParsedEvent::TargetCreated { target_id, kind, .. } => {
                trace!(%target_id, %kind, "Skipping non-page target");
            }
            _ => trace!(method = %event.method, "Skipping event during discovery"),
        }
    }
}

/// Attaches to the target and returns the session id.
async fn attach_to_target(ws: &mut WsStream, target_id: &TargetId) -> Result<SessionId> {
    send_call(
        ws,
        CallId::ATTACH,
        Command::Target(TargetCommand::AttachToTarget {
            target_id: target_id.clone(),
        }),
    )
    .await?;

    loop {
        let message = next_message(ws).await?;

        if message.id != Some(CallId::ATTACH) {
            continue;
        }

        if let Some(error) = message.error {
            return Err(Error::negotiation(error.message));
        }

        return message
            .result
            .as_ref()
            .and_then(|result| result.get("sessionId"))
            .and_then(|id| id.as_str())
            .map(SessionId::new)
            .ok_or_else(|| Error::negotiation("Attach reply carried no sessionId"));
    }
}

// ============================================================================
// Wire Helpers
// ============================================================================

/// Writes one top-level call.
async fn send_call(ws: &mut WsStream, id: CallId, command: Command) -> Result<()> {
    let text = Request::new(id, command)?.to_json()?;
    trace!(%id, "Sending negotiation call");
    ws.send(WsMessage::Text(text.into())).await?;
    Ok(())
}

/// Reads the next parseable text frame.
async fn next_message(ws: &mut WsStream) -> Result<Message> {
    loop {
        match ws.next().await {
            Some(Ok(WsMessage::Text(text))) => match Message::parse(&text) {
                Ok(message) => return Ok(message),
                Err(e) => warn!(error = %e, "Skipping unparseable frame"),
            },
            Some(Ok(WsMessage::Close(_))) | None => return Err(Error::ConnectionClosed),
            Some(Err(e)) => return Err(e.into()),
            Some(Ok(_)) => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBrowser, MockOptions};
    use crate::transport::Endpoint;

    async fn open(mock: &MockBrowser) -> WsStream {
        Endpoint::parse(mock.url())
            .expect("endpoint")
            .connect()
            .await
            .expect("connect")
    }

    #[tokio::test]
    async fn test_negotiation_selects_page_target() {
        let mock = MockBrowser::start().await;
        let mut ws = open(&mock).await;

        let negotiated = negotiate(&mut ws).await.expect("negotiate");
        assert_eq!(negotiated.target_id.as_str(), MockBrowser::PAGE_TARGET);
        assert_eq!(negotiated.session_id.as_str(), MockBrowser::SESSION);
    }

    #[tokio::test]
    async fn test_negotiation_skips_other_targets() {
        let options = MockOptions {
            leading_targets: vec!["other".into(), "other".into()],
            ..MockOptions::default()
        };
        let mock = MockBrowser::start_with_options(options, |_| None).await;
        let mut ws = open(&mock).await;

        let negotiated = negotiate(&mut ws).await.expect("negotiate");
        assert_eq!(negotiated.target_id.as_str(), MockBrowser::PAGE_TARGET);
    }

    #[tokio::test]
    async fn test_attach_error_is_negotiation_error() {
        let options = MockOptions {
            attach_error: Some("No target with given id found".into()),
            ..MockOptions::default()
        };
        let mock = MockBrowser::start_with_options(options, |_| None).await;
        let mut ws = open(&mock).await;

        let err = negotiate(&mut ws).await.unwrap_err();
        assert!(err.is_startup_error());
        match err {
            Error::Negotiation { message } => assert!(message.contains("No target")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stream_end_during_discovery() {
        let options = MockOptions {
            close_on_discover: true,
            ..MockOptions::default()
        };
        let mock = MockBrowser::start_with_options(options, |_| None).await;
        let mut ws = open(&mock).await;

        let err = negotiate(&mut ws).await.unwrap_err();
        assert!(err.is_connection_error());
    }
}
