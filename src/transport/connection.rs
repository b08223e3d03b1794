//! WebSocket connection and event loop.
//!
//! This module owns the DevTools WebSocket once the session is attached,
//! including call/reply correlation, session filtering and event routing.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming envelopes from the browser (replies, events, binding calls)
//! - Outgoing calls from the Rust API, serialized through one writer
//! - Call/reply correlation by [`CallId`]
//! - Teardown when the attached target is destroyed or the socket drops
//!
//! # Inbound Classification
//!
//! | Envelope | Action |
//! |----------|--------|
//! | `Target.targetDestroyed` for the active target | Stop the loop |
//! | `Target.receivedMessageFromTarget`, other session | Discard |
//! | Inner reply | Resolve the pending caller |
//! | Inner `Runtime.consoleAPICalled` / `exceptionThrown` | Log |
//! | Inner `Runtime.bindingCalled` | Spawn the bound callable |
//! | Other inner events | Broadcast to subscribers |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, trace, warn};

use crate::bridge::{self, BindingRegistry};
use crate::error::{Error, Result};
use crate::identifiers::{CallId, CallIdSequence, SessionId, TargetId};
use crate::protocol::{Command, Event, Message, ParsedEvent, RawCommand, Request};

use super::endpoint::WsStream;
use super::negotiator::Negotiated;

// ============================================================================
// Constants
// ============================================================================

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// Types
// ============================================================================

/// Map of call IDs to reply channels.
type CorrelationMap = FxHashMap<CallId, oneshot::Sender<Result<Value>>>;

/// Why the event loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The attached target was destroyed (window closed).
    TargetDestroyed,
    /// The socket failed or the browser closed it.
    Closed,
    /// [`Connection::shutdown`] was called.
    Shutdown,
}

/// Whether the event loop keeps running after a message.
enum Flow {
    Continue,
    Stop(DisconnectReason),
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write an already-registered call to the socket.
    Send { id: CallId, text: String },
    /// Close the socket and stop.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// Attached DevTools session connection.
///
/// Handles call/reply correlation, event routing and binding dispatch.
/// The connection spawns an internal event loop task.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and cheap to clone. Any number of tasks may
/// call [`send`](Self::send) concurrently.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Pending calls awaiting a reply.
    correlation: Mutex<CorrelationMap>,
    /// Set once the event loop has stopped.
    closed: AtomicBool,
    /// Call id source.
    ids: CallIdSequence,
    /// Attached page target.
    target_id: TargetId,
    /// Attached session.
    session_id: SessionId,
    /// Bound host functions.
    bindings: BindingRegistry,
    /// Page events not consumed internally.
    events: broadcast::Sender<Event>,
    /// Published once when the loop stops.
    disconnect: watch::Sender<Option<DisconnectReason>>,
    /// Log page console output at `info` instead of `trace`.
    debug: bool,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("target_id", self.target_id())
            .field("session_id", self.session_id())
            .field("closed", &self.is_closed())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Creates a connection over a negotiated WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    pub(crate) fn new(ws_stream: WsStream, negotiated: Negotiated, debug: bool) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (disconnect, _) = watch::channel(None);

        let connection = Self {
            inner: Arc::new(ConnectionInner {
                command_tx,
                correlation: Mutex::new(CorrelationMap::default()),
                closed: AtomicBool::new(false),
                ids: CallIdSequence::new(),
                target_id: negotiated.target_id,
                session_id: negotiated.session_id,
                bindings: BindingRegistry::new(),
                events,
                disconnect,
                debug,
            }),
        };

        debug!(
            target_id = %connection.inner.target_id,
            session_id = %connection.inner.session_id,
            "Starting connection event loop"
        );

        tokio::spawn(Self::run_event_loop(ws_stream, command_rx, connection.clone()));

        connection
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the attached target ID.
    #[inline]
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        &self.inner.target_id
    }

    /// Returns the attached session ID.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.inner.session_id
    }

    /// Returns the binding registry.
    #[inline]
    pub(crate) fn bindings(&self) -> &BindingRegistry {
        &self.inner.bindings
    }

    /// Returns the number of pending calls.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.correlation.lock().len()
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Subscribes to page events not consumed by the connection itself.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    /// Waits until the event loop stops and returns why.
    pub async fn closed(&self) -> DisconnectReason {
        let mut rx = self.inner.disconnect.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(reason) => (*reason).unwrap_or(DisconnectReason::Closed),
            Err(_) => DisconnectReason::Closed,
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Sends a command to the attached session and waits for its reply.
    ///
    /// There is no timeout; the call resolves when the reply arrives or the
    /// connection goes away.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is or becomes closed
    /// - [`Error::Connection`] if the socket write fails
    /// - [`Error::Protocol`] / [`Error::Script`] per the reply
    pub async fn send(&self, command: Command) -> Result<Value> {
        let (_, reply_rx) = self.dispatch(command)?;
        reply_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Sends a command and waits at most `request_timeout` for the reply.
    ///
    /// On expiry the pending slot is removed, so a late reply is discarded.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send), plus [`Error::RequestTimeout`].
    pub async fn send_with_timeout(
        &self,
        command: Command,
        request_timeout: Duration,
    ) -> Result<Value> {
        let (id, reply_rx) = self.dispatch(command)?;

        match timeout(request_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                self.inner.correlation.lock().remove(&id);
                debug!(%id, "Removed timed-out call");
                let timeout_ms = u64::try_from(request_timeout.as_millis()).unwrap_or(u64::MAX);
                Err(Error::request_timeout(id, timeout_ms))
            }
        }
    }

    /// Sends a method by name with raw params.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn send_raw(&self, method: impl Into<String>, params: Value) -> Result<Value> {
        self.send(Command::Raw(RawCommand::new(method, params))).await
    }

    /// Registers a pending slot and queues the call for the writer.
    fn dispatch(&self, command: Command) -> Result<(CallId, oneshot::Receiver<Result<Value>>)> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let id = self.inner.ids.next();
        let request = Request::new(id, command)?;
        trace!(%id, method = %request.method, "Sending call");
        let text = request
            .into_session_envelope(&self.inner.session_id)?
            .to_json()?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner.correlation.lock().insert(id, reply_tx);

        let queued = self
            .inner
            .command_tx
            .send(ConnectionCommand::Send { id, text })
            .is_ok();

        // The loop may have drained the map between the check above and the insert.
        if !queued || self.is_closed() {
            self.inner.correlation.lock().remove(&id);
            return Err(Error::ConnectionClosed);
        }

        Ok((id, reply_rx))
    }

    /// Shuts down the connection.
    ///
    /// Pending calls fail with [`Error::ConnectionClosed`]. Calling this on a
    /// closed connection has no effect.
    pub fn shutdown(&self) {
        let _ = self.inner.command_tx.send(ConnectionCommand::Shutdown);
    }

    // ========================================================================
    // Event Loop
    // ========================================================================

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: WsStream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        connection: Connection,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        let reason = loop {
            tokio::select! {
                // Incoming envelopes from the browser
                message = ws_read.next() => {
                    match message {
                        Some(Ok(WsMessage::Text(text))) => {
                            if let Flow::Stop(reason) = connection.handle_incoming_message(&text) {
                                break reason;
                            }
                        }

                        Some(Ok(WsMessage::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break DisconnectReason::Closed;
                        }

                        Some(Err(e)) => {
                            debug!(error = %e, "WebSocket read failed");
                            break DisconnectReason::Closed;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break DisconnectReason::Closed;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Calls from the Rust API
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { id, text }) => {
                            if let Err(e) = ws_write.send(WsMessage::Text(text.into())).await {
                                warn!(%id, error = %e, "Failed to write call");
                                if let Some(tx) = connection.inner.correlation.lock().remove(&id) {
                                    let _ = tx.send(Err(Error::connection(e.to_string())));
                                }
                            }
                        }

                        Some(ConnectionCommand::Shutdown) | None => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break DisconnectReason::Shutdown;
                        }
                    }
                }
            }
        };

        connection.inner.closed.store(true, Ordering::Release);
        connection.fail_pending_requests();
        connection.inner.disconnect.send_replace(Some(reason));

        info!(?reason, "Connection event loop terminated");
    }

    /// Handles one outer envelope.
    fn handle_incoming_message(&self, text: &str) -> Flow {
        let message = match Message::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Failed to parse incoming message");
                return Flow::Continue;
            }
        };

        // Outer replies acknowledge `Target.sendMessageToTarget`. Only a
        // failed acknowledgement matters: the inner reply will never come.
        if let Some(id) = message.id {
            if let Some(error) = message.error {
                debug!(%id, message = %error.message, "Outer call failed");
                if let Some(tx) = self.inner.correlation.lock().remove(&id) {
                    let _ = tx.send(Err(error.into()));
                }
            }
            return Flow::Continue;
        }

        let Some(event) = message.into_event() else {
            return Flow::Continue;
        };

        match event.parse() {
            ParsedEvent::TargetDestroyed { target_id } if target_id == self.inner.target_id => {
                info!(%target_id, "Attached target destroyed");
                Flow::Stop(DisconnectReason::TargetDestroyed)
            }

            ParsedEvent::ReceivedMessageFromTarget {
                session_id,
                message,
            } => {
                if session_id == self.inner.session_id {
                    self.handle_session_message(&message);
                } else {
                    trace!(%session_id, "Discarding message for another session");
                }
                Flow::Continue
            }

            _ => {
                trace!(method = %event.method, "Browser event");
                Flow::Continue
            }
        }
    }

    /// Handles one inner envelope of the attached session.
    fn handle_session_message(&self, text: &str) {
        let message = match Message::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Failed to parse session message");
                return;
            }
        };

        if let Some(id) = message.id {
            let tx = self.inner.correlation.lock().remove(&id);

            match tx {
                Some(tx) => {
                    let _ = tx.send(message.into_outcome());
                }
                None => trace!(%id, "Reply for unknown call"),
            }
            return;
        }

        let Some(event) = message.into_event() else {
            return;
        };

        match event.parse() {
            ParsedEvent::ConsoleApiCalled { kind, args } => {
                let text = console_text(&args);
                if self.inner.debug {
                    info!(kind = %kind, "console: {text}");
                } else {
                    trace!(kind = %kind, "console: {text}");
                }
            }

            ParsedEvent::ExceptionThrown { text, description } => {
                let description = description.unwrap_or_default();
                if self.inner.debug {
                    info!(%text, %description, "Uncaught page exception");
                } else {
                    trace!(%text, %description, "Uncaught page exception");
                }
            }

            ParsedEvent::BindingCalled {
                name,
                payload,
                execution_context_id,
            } => {
                bridge::dispatch_invocation(self, &name, &payload, execution_context_id);
            }

            _ => {
                // No subscribers is fine.
                let _ = self.inner.events.send(event);
            }
        }
    }

    /// Fails all pending calls with `ConnectionClosed`.
    fn fail_pending_requests(&self) {
        let pending: Vec<_> = self.inner.correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending calls on shutdown");
        }
    }
}

/// Joins console arguments the way the page console prints them.
fn console_text(args: &[Value]) -> String {
    args.iter()
        .map(|arg| match arg.get("value") {
            Some(Value::String(text)) => text.clone(),
            Some(value) => value.to_string(),
            None => arg
                .get("description")
                .and_then(Value::as_str)
                .or_else(|| arg.get("type").and_then(Value::as_str))
                .unwrap_or_default()
                .to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Tests
// ============================================================================
