//! In-process DevTools endpoint for tests.
//!
//! [`MockBrowser`] accepts one WebSocket client on `127.0.0.1:0`, answers the
//! negotiation calls like a browser with a single page target, unwraps every
//! session call, records it, and replies through a responder closure. Tests
//! can also push arbitrary frames to the client.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::transport::{Connection, Endpoint, negotiate};

// ============================================================================
// Constants
// ============================================================================

/// How long [`MockBrowser::next_call`] waits before failing the test.
const CALL_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

/// A session call received by the mock.
#[derive(Debug, Clone)]
pub(crate) struct MockCall {
    pub id: u64,
    pub method: String,
    pub params: Value,
}

/// Produces the `result` payload for a call, or `None` to stay silent.
type Responder = Arc<dyn Fn(&MockCall) -> Option<Value> + Send + Sync>;

/// Negotiation behaviour.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockOptions {
    /// Target types announced before the page target.
    pub leading_targets: Vec<String>,
    /// Reject `Target.attachToTarget` with this message.
    pub attach_error: Option<String>,
    /// Drop the socket instead of answering discovery.
    pub close_on_discover: bool,
}

enum Outbound {
    Frame(String),
    Close,
}

// ============================================================================
// MockBrowser
// ============================================================================

/// Scripted DevTools endpoint.
pub(crate) struct MockBrowser {
    url: String,
    calls: mpsc::UnboundedReceiver<MockCall>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl MockBrowser {
    /// Target id of the page the mock announces.
    pub const PAGE_TARGET: &'static str = "PAGE-TARGET-1";

    /// Session id the mock hands out on attach.
    pub const SESSION: &'static str = "SESSION-1";

    /// Starts a mock answering every call with [`default_reply`].
    pub async fn start() -> Self {
        Self::start_with(default_reply).await
    }

    /// Starts a mock with a custom responder.
    pub async fn start_with<F>(responder: F) -> Self
    where
        F: Fn(&MockCall) -> Option<Value> + Send + Sync + 'static,
    {
        Self::start_with_options(MockOptions::default(), responder).await
    }

    /// Starts a mock with custom negotiation behaviour.
    pub async fn start_with_options<F>(options: MockOptions, responder: F) -> Self
    where
        F: Fn(&MockCall) -> Option<Value> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
            .await
            .expect("bind mock listener");
        let port = listener.local_addr().expect("mock addr").port();

        let (calls_tx, calls) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(serve(
            listener,
            options,
            Arc::new(responder),
            calls_tx,
            outbound_rx,
        ));

        Self {
            url: format!("ws://127.0.0.1:{port}/devtools/browser/mock"),
            calls,
            outbound,
        }
    }

    /// Returns the endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connects, negotiates and returns a running connection.
    pub async fn attach(&self) -> Connection {
        let endpoint = Endpoint::parse(&self.url).expect("mock endpoint");
        let mut ws = endpoint.connect().await.expect("connect to mock");
        let negotiated = negotiate(&mut ws).await.expect("negotiate with mock");
        Connection::new(ws, negotiated, false)
    }

    /// Waits for the next session call.
    pub async fn next_call(&mut self) -> MockCall {
        timeout(CALL_TIMEOUT, self.calls.recv())
            .await
            .expect("timed out waiting for a call")
            .expect("mock server stopped")
    }

    /// Sends an inner message wrapped for the attached session.
    pub fn send_session(&self, inner: Value) {
        self.send_outer(session_envelope(&inner));
    }

    /// Sends a top-level frame.
    pub fn send_outer(&self, outer: Value) {
        let _ = self.outbound.send(Outbound::Frame(outer.to_string()));
    }

    /// Closes the WebSocket from the browser side.
    pub fn disconnect(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Replies the way an idle page would.
pub(crate) fn default_reply(call: &MockCall) -> Option<Value> {
    let result = match call.method.as_str() {
        "Runtime.evaluate" => json!({"result": {"type": "undefined"}}),
        "Browser.getWindowForTarget" => json!({
            "windowId": 1,
            "bounds": {"left": 0, "top": 0, "width": 1024, "height": 768, "windowState": "normal"}
        }),
        "Browser.getWindowBounds" => json!({
            "bounds": {"left": 0, "top": 0, "width": 1024, "height": 768, "windowState": "normal"}
        }),
        "Browser.getVersion" => json!({
            "protocolVersion": "1.3",
            "product": "MockBrowser/1.0",
            "revision": "@0",
            "userAgent": "Mozilla/5.0 MockBrowser/1.0",
            "jsVersion": "12.0"
        }),
        "Page.navigate" => json!({"frameId": "FRAME-1", "loaderId": "LOADER-1"}),
        _ => json!({}),
    };
    Some(result)
}

fn session_envelope(inner: &Value) -> Value {
    json!({
        "method": "Target.receivedMessageFromTarget",
        "params": {
            "sessionId": MockBrowser::SESSION,
            "targetId": MockBrowser::PAGE_TARGET,
            "message": inner.to_string()
        }
    })
}

// ============================================================================
// Server Loop
// ============================================================================

async fn serve(
    listener: TcpListener,
    options: MockOptions,
    responder: Responder,
    calls_tx: mpsc::UnboundedSender<MockCall>,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
) {
    let Ok((stream, _)) = listener.accept().await else {
        return;
    };
    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };

    loop {
        tokio::select! {
            frame = ws.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    if !handle_frame(&mut ws, &text, &options, &responder, &calls_tx).await {
                        break;
                    }
                }
                Some(Ok(WsMessage::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },

            outbound = outbound_rx.recv() => match outbound {
                Some(Outbound::Frame(text)) => {
                    if ws.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = ws.close(None).await;
                    break;
                }
            },
        }
    }
}

/// Answers one client frame. Returns `false` to drop the connection.
async fn handle_frame(
    ws: &mut WebSocketStream<TcpStream>,
    text: &str,
    options: &MockOptions,
    responder: &Responder,
    calls_tx: &mpsc::UnboundedSender<MockCall>,
) -> bool {
    let Ok(outer) = serde_json::from_str::<Value>(text) else {
        return true;
    };
    let id = outer["id"].clone();

    let mut replies = Vec::new();

    match outer["method"].as_str().unwrap_or_default() {
        "Target.setDiscoverTargets" => {
            if options.close_on_discover {
                return false;
            }
            replies.push(json!({"id": id, "result": {}}));
            for (index, kind) in options.leading_targets.iter().enumerate() {
                replies.push(target_created(&format!("OTHER-{index}"), kind));
            }
            replies.push(target_created(MockBrowser::PAGE_TARGET, "page"));
        }

        "Target.attachToTarget" => match &options.attach_error {
            Some(message) => {
                replies.push(json!({"id": id, "error": {"code": -32602, "message": message}}));
            }
            None => {
                replies.push(json!({"id": id, "result": {"sessionId": MockBrowser::SESSION}}));
            }
        },

        "Target.sendMessageToTarget" => {
            replies.push(json!({"id": id, "result": {}}));

            let inner = outer["params"]["message"]
                .as_str()
                .and_then(|message| serde_json::from_str::<Value>(message).ok())
                .unwrap_or_default();
            let call = MockCall {
                id: inner["id"].as_u64().unwrap_or_default(),
                method: inner["method"].as_str().unwrap_or_default().to_string(),
                params: inner["params"].clone(),
            };

            if let Some(result) = responder(&call) {
                replies.push(session_envelope(&json!({"id": call.id, "result": result})));
            }
            let _ = calls_tx.send(call);
        }

        _ => replies.push(json!({"id": id, "result": {}})),
    }

    for reply in replies {
        if ws.send(WsMessage::Text(reply.to_string().into())).await.is_err() {
            return false;
        }
    }
    true
}

fn target_created(target_id: &str, kind: &str) -> Value {
    json!({
        "method": "Target.targetCreated",
        "params": {"targetInfo": {
            "targetId": target_id,
            "type": kind,
            "title": "",
            "url": "about:blank",
            "attached": false
        }}
    })
}
