//! DevTools endpoint discovery and WebSocket connection.
//!
//! The browser is launched with `--remote-debugging-port=0` and announces the
//! port it picked on stderr:
//!
//! ```text
//! DevTools listening on ws://127.0.0.1:38147/devtools/browser/0b6c...
//! ```
//!
//! # Connection Flow
//!
//! 1. Process supervisor reads stderr until [`Endpoint::from_log_line`] matches
//! 2. [`Endpoint::connect`] opens the WebSocket
//! 3. The negotiator runs over the raw stream
//! 4. The stream is handed to [`super::Connection`]

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// WebSocket stream type used for the DevTools connection.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Pattern of the stderr line announcing the control endpoint.
static ENDPOINT_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^DevTools listening on (wss?://\S+)").ok());

// ============================================================================
// Endpoint
// ============================================================================

/// A validated DevTools WebSocket endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Parses and validates an endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL is malformed or not `ws`/`wss`.
    pub fn parse(url: &str) -> Result<Self> {
        let url = Url::parse(url.trim())
            .map_err(|e| Error::config(format!("Invalid endpoint '{url}': {e}")))?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::config(format!(
                    "Endpoint scheme must be ws or wss, got '{other}'"
                )));
            }
        }

        if url.host_str().is_none() {
            return Err(Error::config(format!("Endpoint '{url}' has no host")));
        }

        Ok(Self { url })
    }

    /// Extracts the endpoint from one line of browser diagnostic output.
    ///
    /// Returns `None` for lines that do not announce an endpoint.
    #[must_use]
    pub fn from_log_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let captures = ENDPOINT_PATTERN.as_ref()?.captures(line)?;
        Self::parse(captures.get(1)?.as_str()).ok()
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the port the browser is listening on.
    #[inline]
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.url.port_or_known_default()
    }

    /// Opens the WebSocket connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the handshake fails.
    pub async fn connect(&self) -> Result<WsStream> {
        debug!(url = %self.url, "Connecting to DevTools endpoint");

        let (stream, response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::connection(format!("WebSocket connect to {} failed: {e}", self.url)))?;

        info!(
            url = %self.url,
            status = response.status().as_u16(),
            "WebSocket connection established"
        );

        Ok(stream)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str =
        "DevTools listening on ws://127.0.0.1:38147/devtools/browser/0b6c1f6e-8e0a-4f5c";

    #[test]
    fn test_from_log_line_matches() {
        let endpoint = Endpoint::from_log_line(LINE).expect("endpoint");
        assert_eq!(endpoint.port(), Some(38147));
        assert_eq!(endpoint.url().path(), "/devtools/browser/0b6c1f6e-8e0a-4f5c");
    }

    #[test]
    fn test_from_log_line_tolerates_crlf() {
        let line = format!("{LINE}\r\n");
        assert!(Endpoint::from_log_line(&line).is_some());
    }

    #[test]
    fn test_from_log_line_ignores_other_output() {
        assert!(Endpoint::from_log_line("[1234:ERROR:gpu_init.cc] oops").is_none());
        assert!(Endpoint::from_log_line("").is_none());
        assert!(Endpoint::from_log_line(&format!("prefix {LINE}")).is_none());
    }

    #[test]
    fn test_parse_rejects_http() {
        let err = Endpoint::parse("http://127.0.0.1:9222").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Endpoint::parse("not a url").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        let endpoint = Endpoint::parse("ws://localhost:9222/devtools/browser/x").expect("parse");
        assert_eq!(endpoint.to_string(), "ws://localhost:9222/devtools/browser/x");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let endpoint = Endpoint::parse(&format!("ws://127.0.0.1:{port}/")).expect("parse");
        let err = endpoint.connect().await.unwrap_err();
        assert!(err.is_connection_error());
    }
}
