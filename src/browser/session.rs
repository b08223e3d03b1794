//! Browser session handle.
//!
//! A [`Session`] owns:
//! - One browser process (absent when attached to an external browser)
//! - One WebSocket connection attached to the page target
//! - One user data directory
//!
//! # Example
//!
//! ```no_run
//! use proton::Session;
//!
//! # async fn example() -> proton::Result<()> {
//! let session = Session::builder().title("Demo").launch().await?;
//!
//! session.bind("add", |a: i64, b: i64| a + b).await?;
//! let sum = session.eval("window.add(1, 2)").await?;
//! assert_eq!(sum, 3);
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::bridge::{self, AsyncBinding, BindingFn, SyncBinding};
use crate::driver::options::DEFAULT_STARTUP_TIMEOUT;
use crate::driver::{BrowserOptions, BrowserProcess, Profile, SessionBuilder, launcher};
use crate::error::{Error, Result};
use crate::identifiers::{SessionId, TargetId, WindowId};
use crate::protocol::{
    Bounds, BrowserCommand, Command, Event, NetworkCommand, PageCommand, RawCommand,
    RuntimeCommand,
};
use crate::transport::{Connection, Endpoint};

use super::lifecycle::{self, DoneSignal};

// ============================================================================
// Version
// ============================================================================

/// Browser version information from `Browser.getVersion`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    /// DevTools protocol version.
    pub protocol_version: String,
    /// Product name and version.
    pub product: String,
    /// Product revision.
    pub revision: String,
    /// User agent string.
    pub user_agent: String,
    /// JavaScript engine version.
    pub js_version: String,
}

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for a session.
struct SessionInner {
    /// Attached page connection.
    connection: Connection,
    /// Launched browser process.
    process: Option<BrowserProcess>,
    /// User data directory, taken on close.
    profile: Mutex<Option<Profile>>,
    /// Window hosting the page, absent when headless.
    window_id: Option<WindowId>,
    /// Completion signal.
    done: DoneSignal,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.connection.shutdown();
    }
}

// ============================================================================
// Session
// ============================================================================

/// A handle to a browser page driven over the DevTools protocol.
///
/// Cheap to clone; all clones control the same session. The browser is
/// killed when the last clone is dropped.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

// ============================================================================
// Session - Display
// ============================================================================

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("target_id", self.target_id())
            .field("session_id", self.session_id())
            .field("window_id", &self.inner.window_id)
            .field("pid", &self.pid())
            .field("done", &self.is_done())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session - Constructors
// ============================================================================

impl Session {
    /// Creates a launch configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Launches a browser with `options` and attaches to its page.
    ///
    /// # Errors
    ///
    /// Returns the first failing startup step. The browser is not left
    /// running on failure.
    pub async fn launch(options: BrowserOptions) -> Result<Self> {
        let launched = launcher::launch(&options).await?;
        let done = lifecycle::spawn(
            launched.connection.clone(),
            Some(launched.process.monitor()),
        );

        Ok(Self::from_parts(
            launched.connection,
            Some(launched.process),
            Some(launched.profile),
            launched.window_id,
            done,
        ))
    }

    /// Attaches to an already running browser at `ws_url`.
    ///
    /// The session ends when the connection does; closing it leaves the
    /// browser running.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `ws_url` is not a WebSocket URL
    /// - Connection and negotiation errors
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let endpoint = Endpoint::parse(ws_url)?;
        let connection = launcher::attach(&endpoint, DEFAULT_STARTUP_TIMEOUT, false).await?;

        if let Err(e) = launcher::enable_domains(&connection).await {
            connection.shutdown();
            return Err(e);
        }

        let window_id = match launcher::window_for_target(&connection).await {
            Ok(window_id) => Some(window_id),
            Err(e) => {
                debug!(error = %e, "No window for target");
                None
            }
        };

        let done = lifecycle::spawn(connection.clone(), None);
        info!(endpoint = %endpoint, target_id = %connection.target_id(), "Attached to browser");

        Ok(Self::from_parts(connection, None, None, window_id, done))
    }

    fn from_parts(
        connection: Connection,
        process: Option<BrowserProcess>,
        profile: Option<Profile>,
        window_id: Option<WindowId>,
        done: DoneSignal,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                connection,
                process,
                profile: Mutex::new(profile),
                window_id,
                done,
            }),
        }
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl Session {
    /// Returns the attached page target.
    #[inline]
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        self.inner.connection.target_id()
    }

    /// Returns the protocol session.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        self.inner.connection.session_id()
    }

    /// Returns the window hosting the page, if any.
    #[inline]
    #[must_use]
    pub fn window_id(&self) -> Option<WindowId> {
        self.inner.window_id
    }

    /// Returns the browser process id, if launched by this session.
    #[inline]
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.inner.process.as_ref().and_then(BrowserProcess::pid)
    }

    /// Returns the user data directory until the session is closed.
    #[must_use]
    pub fn user_data_dir(&self) -> Option<PathBuf> {
        self.inner
            .profile
            .lock()
            .as_ref()
            .map(|profile| profile.path().to_path_buf())
    }

    /// Returns the underlying connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.inner.connection
    }

    /// Subscribes to page events not handled internally.
    ///
    /// Console messages, exceptions and binding calls are not delivered here.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.inner.connection.subscribe()
    }
}

// ============================================================================
// Session - Commands
// ============================================================================

impl Session {
    /// Sends a protocol call by method name.
    ///
    /// # Errors
    ///
    /// Returns the browser's error for the call, or a connection error.
    pub async fn send(&self, method: impl Into<String>, params: Value) -> Result<Value> {
        self.execute(Command::Raw(RawCommand::new(method, params)))
            .await
    }

    /// Sends a typed command.
    ///
    /// # Errors
    ///
    /// Returns the browser's error for the call, or a connection error.
    pub async fn execute(&self, command: Command) -> Result<Value> {
        self.inner.connection.send(command).await
    }

    /// Sends a typed command, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestTimeout`] if no reply arrives in time.
    pub async fn send_with_timeout(&self, command: Command, timeout: Duration) -> Result<Value> {
        self.inner.connection.send_with_timeout(command, timeout).await
    }

    /// Evaluates a script expression in the page.
    ///
    /// Promises are awaited; the result is returned by value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Script`] if the expression throws.
    pub async fn eval(&self, expression: impl Into<String>) -> Result<Value> {
        self.execute(Command::Runtime(RuntimeCommand::evaluate(expression)))
            .await
    }

    /// Evaluates a script expression and decodes its result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Script`] if the expression throws, or
    /// [`Error::Json`] if the result does not decode as `T`.
    pub async fn eval_as<T: DeserializeOwned>(&self, expression: impl Into<String>) -> Result<T> {
        let value = self.eval(expression).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Navigates the page to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the browser rejects the URL.
    pub async fn navigate(&self, url: impl Into<String>) -> Result<()> {
        let url = url.into();
        debug!(url = %url, "Navigating");

        let reply = self
            .execute(Command::Page(PageCommand::Navigate { url }))
            .await?;

        match reply.get("errorText").and_then(Value::as_str) {
            Some(text) if !text.is_empty() => Err(Error::protocol(text)),
            _ => Ok(()),
        }
    }

    /// Reloads the page.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the call cannot complete.
    pub async fn reload(&self, ignore_cache: bool) -> Result<()> {
        self.execute(Command::Page(PageCommand::Reload {
            ignore_cache: Some(ignore_cache),
        }))
        .await?;
        Ok(())
    }

    /// Stops pending navigations.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the call cannot complete.
    pub async fn stop_loading(&self) -> Result<()> {
        self.execute(Command::Page(PageCommand::StopLoading)).await?;
        Ok(())
    }

    /// Brings the page's tab to the front.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the call cannot complete.
    pub async fn bring_to_front(&self) -> Result<()> {
        self.execute(Command::Page(PageCommand::BringToFront)).await?;
        Ok(())
    }

    /// Runs `source` in every document loaded from now on.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the call cannot complete.
    pub async fn add_init_script(&self, source: impl Into<String>) -> Result<()> {
        self.execute(Command::Page(PageCommand::AddScriptToEvaluateOnNewDocument {
            source: source.into(),
        }))
        .await?;
        Ok(())
    }

    /// Returns browser version information.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the reply is malformed.
    pub async fn version(&self) -> Result<Version> {
        let reply = self
            .execute(Command::Browser(BrowserCommand::GetVersion))
            .await?;
        Ok(serde_json::from_value(reply)?)
    }

    /// Clears the browser cache.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the call cannot complete.
    pub async fn clear_browser_cache(&self) -> Result<()> {
        self.execute(Command::Network(NetworkCommand::ClearBrowserCache))
            .await?;
        Ok(())
    }

    /// Clears all browser cookies.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the call cannot complete.
    pub async fn clear_browser_cookies(&self) -> Result<()> {
        self.execute(Command::Network(NetworkCommand::ClearBrowserCookies))
            .await?;
        Ok(())
    }
}

// ============================================================================
// Session - Window
// ============================================================================

impl Session {
    /// Returns the window's position, size and state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the session has no window.
    pub async fn bounds(&self) -> Result<Bounds> {
        let window_id = self.require_window()?;
        let reply = self
            .execute(Command::Browser(BrowserCommand::GetWindowBounds { window_id }))
            .await?;

        let bounds = reply
            .get("bounds")
            .cloned()
            .ok_or_else(|| Error::protocol("Browser.getWindowBounds reply has no bounds"))?;
        Ok(serde_json::from_value(bounds)?)
    }

    /// Changes the window's position, size or state.
    ///
    /// Position and size are dropped unless the state is normal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the session has no window.
    pub async fn set_bounds(&self, bounds: Bounds) -> Result<()> {
        let window_id = self.require_window()?;
        self.execute(Command::Browser(BrowserCommand::SetWindowBounds {
            window_id,
            bounds: bounds.normalized(),
        }))
        .await?;
        Ok(())
    }

    fn require_window(&self) -> Result<WindowId> {
        self.inner
            .window_id
            .ok_or_else(|| Error::config("Session has no browser window (headless)"))
    }
}

// ============================================================================
// Session - Bindings
// ============================================================================

impl Session {
    /// Exposes a function to page script as `window[name]`.
    ///
    /// Arguments are decoded from the page call; the return value resolves
    /// the page promise. Binding an existing name swaps the function.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example(session: &proton::Session) -> proton::Result<()> {
    /// session.bind("greet", |name: String| format!("Hello, {name}")).await?;
    /// session.bind("check", |n: i64| -> Result<(), String> {
    ///     if n < 0 { Err("negative".into()) } else { Ok(()) }
    /// }).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::Binding`] if the browser rejects the install.
    pub async fn bind<F, Args>(&self, name: &str, f: F) -> Result<()>
    where
        F: SyncBinding<Args>,
    {
        self.bind_raw(name, f.into_binding_fn()).await
    }

    /// Exposes an async function to page script as `window[name]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Binding`] if the browser rejects the install.
    pub async fn bind_async<F, Args>(&self, name: &str, f: F) -> Result<()>
    where
        F: AsyncBinding<Args>,
    {
        self.bind_raw(name, f.into_binding_fn()).await
    }

    /// Exposes an untyped function receiving the raw argument list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Binding`] if the browser rejects the install.
    pub async fn bind_raw(&self, name: &str, binding: BindingFn) -> Result<()> {
        bridge::bind(&self.inner.connection, name, binding).await
    }

    /// Returns the bound names, sorted.
    #[must_use]
    pub fn binding_names(&self) -> Vec<String> {
        self.inner.connection.bindings().names()
    }
}

// ============================================================================
// Session - Lifecycle
// ============================================================================

impl Session {
    /// Waits until the session has ended.
    ///
    /// Completes when the browser exits, the page closes, or the session is
    /// closed.
    pub async fn done(&self) {
        self.inner.done.wait().await;
    }

    /// Returns a handle to the completion signal.
    #[inline]
    #[must_use]
    pub fn done_signal(&self) -> DoneSignal {
        self.inner.done.clone()
    }

    /// Returns `true` once the session has ended.
    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.inner.done.is_done()
    }

    /// Ends the session: kills the browser, closes the connection and
    /// removes the user data directory unless it is kept.
    ///
    /// Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if the user data directory cannot be
    /// removed.
    pub async fn close(&self) -> Result<()> {
        debug!(target_id = %self.target_id(), "Closing session");

        if let Some(process) = &self.inner.process {
            process.kill().await?;
        }
        self.inner.connection.shutdown();
        self.inner.done.wait().await;

        let profile = self.inner.profile.lock().take();
        if let Some(profile) = profile {
            profile.close()?;
        }

        info!(target_id = %self.target_id(), "Session closed");
        Ok(())
    }

    /// Asks the browser to exit gracefully, then closes the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Profile`] if the user data directory cannot be
    /// removed.
    pub async fn close_browser(&self) -> Result<()> {
        match self.execute(Command::Browser(BrowserCommand::Close)).await {
            Ok(_) => {}
            Err(e) if e.is_connection_error() => {
                debug!(error = %e, "Browser went away while closing");
            }
            Err(e) => return Err(e),
        }
        self.close().await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::timeout;

    use super::*;
    use crate::protocol::WindowState;
    use crate::testing::{MockBrowser, default_reply};

    /// Skips the seven domain calls and the window lookup issued by connect.
    async fn skip_startup_calls(mock: &mut MockBrowser) {
        for _ in 0..8 {
            mock.next_call().await;
        }
    }

    #[tokio::test]
    async fn test_connect_enables_domains_and_window() {
        let mut mock = MockBrowser::start().await;
        let session = Session::connect(mock.url()).await.expect("connect");

        assert_eq!(session.target_id().as_str(), MockBrowser::PAGE_TARGET);
        assert_eq!(session.session_id().as_str(), MockBrowser::SESSION);
        assert_eq!(session.window_id(), Some(WindowId::new(1)));
        assert!(session.pid().is_none());
        assert!(session.user_data_dir().is_none());

        let first = mock.next_call().await;
        assert_eq!(first.method, "Page.enable");
    }

    #[tokio::test]
    async fn test_connect_rejects_http_url() {
        let err = Session::connect("http://127.0.0.1:9222")
            .await
            .expect_err("not a websocket url");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_eval_returns_value() {
        let mut mock = MockBrowser::start_with(|call| {
            if call.method == "Runtime.evaluate" {
                Some(json!({"result": {"type": "number", "value": 42}}))
            } else {
                default_reply(call)
            }
        })
        .await;
        let session = Session::connect(mock.url()).await.expect("connect");
        skip_startup_calls(&mut mock).await;

        let value = session.eval("6 * 7").await.expect("eval");
        assert_eq!(value, json!(42));

        let answer: u32 = session.eval_as("6 * 7").await.expect("eval_as");
        assert_eq!(answer, 42);

        let call = mock.next_call().await;
        assert_eq!(call.params["expression"], "6 * 7");
        assert_eq!(call.params["awaitPromise"], true);
        assert_eq!(call.params["returnByValue"], true);
    }

    #[tokio::test]
    async fn test_eval_exception_is_script_error() {
        let mock = MockBrowser::start_with(|call| {
            if call.method == "Runtime.evaluate" {
                Some(json!({
                    "result": {"type": "object", "subtype": "error"},
                    "exceptionDetails": {"exception": {"value": "bad thing"}}
                }))
            } else {
                default_reply(call)
            }
        })
        .await;
        let session = Session::connect(mock.url()).await.expect("connect");

        let err = session.eval("throw 'bad thing'").await.expect_err("throws");
        assert!(matches!(err, Error::Script { .. }));
        assert!(err.to_string().contains("bad thing"));
    }

    #[tokio::test]
    async fn test_navigate_error_text() {
        let mock = MockBrowser::start_with(|call| {
            if call.method == "Page.navigate" {
                Some(json!({"frameId": "F", "errorText": "net::ERR_NAME_NOT_RESOLVED"}))
            } else {
                default_reply(call)
            }
        })
        .await;
        let session = Session::connect(mock.url()).await.expect("connect");

        let err = session
            .navigate("https://invalid.invalid")
            .await
            .expect_err("navigation error");
        assert!(err.to_string().contains("ERR_NAME_NOT_RESOLVED"));
    }

    #[tokio::test]
    async fn test_navigate_sends_url() {
        let mut mock = MockBrowser::start().await;
        let session = Session::connect(mock.url()).await.expect("connect");
        skip_startup_calls(&mut mock).await;

        session.navigate("https://example.com").await.expect("navigate");

        let call = mock.next_call().await;
        assert_eq!(call.method, "Page.navigate");
        assert_eq!(call.params["url"], "https://example.com");
    }

    #[tokio::test]
    async fn test_version() {
        let mock = MockBrowser::start().await;
        let session = Session::connect(mock.url()).await.expect("connect");

        let version = session.version().await.expect("version");
        assert_eq!(version.product, "MockBrowser/1.0");
        assert_eq!(version.protocol_version, "1.3");
    }

    #[tokio::test]
    async fn test_set_bounds_normalizes() {
        let mut mock = MockBrowser::start().await;
        let session = Session::connect(mock.url()).await.expect("connect");
        skip_startup_calls(&mut mock).await;

        let mut bounds = Bounds::new(0, 0, 800, 600);
        bounds.window_state = WindowState::Minimized;
        session.set_bounds(bounds).await.expect("set bounds");

        let call = mock.next_call().await;
        assert_eq!(call.method, "Browser.setWindowBounds");
        assert_eq!(call.params["windowId"], 1);
        assert_eq!(call.params["bounds"], json!({"windowState": "minimized"}));

        let current = session.bounds().await.expect("bounds");
        assert_eq!(current.width, Some(1024));
        assert_eq!(current.window_state, WindowState::Normal);
    }

    #[tokio::test]
    async fn test_raw_send() {
        let mut mock = MockBrowser::start().await;
        let session = Session::connect(mock.url()).await.expect("connect");
        skip_startup_calls(&mut mock).await;

        session
            .send("Emulation.setTouchEmulationEnabled", json!({"enabled": true}))
            .await
            .expect("raw send");

        let call = mock.next_call().await;
        assert_eq!(call.method, "Emulation.setTouchEmulationEnabled");
        assert_eq!(call.params["enabled"], true);
    }

    #[tokio::test]
    async fn test_bind_registers_name() {
        let mock = MockBrowser::start().await;
        let session = Session::connect(mock.url()).await.expect("connect");

        session.bind("add", |a: i64, b: i64| a + b).await.expect("bind");
        session
            .bind_async("later", || async { "done" })
            .await
            .expect("bind async");

        assert_eq!(session.binding_names(), ["add", "later"]);
    }

    #[tokio::test]
    async fn test_events_forwarded() {
        let mock = MockBrowser::start().await;
        let session = Session::connect(mock.url()).await.expect("connect");
        let mut events = session.events();

        mock.send_session(json!({
            "method": "Page.loadEventFired",
            "params": {"timestamp": 1.5}
        }));

        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("event in time")
            .expect("event");
        assert_eq!(event.method, "Page.loadEventFired");
    }

    #[tokio::test]
    async fn test_target_destroyed_fires_done_without_close() {
        let mock = MockBrowser::start().await;
        let session = Session::connect(mock.url()).await.expect("connect");
        assert!(!session.is_done());

        mock.send_outer(json!({
            "method": "Target.targetDestroyed",
            "params": {"targetId": MockBrowser::PAGE_TARGET}
        }));

        timeout(Duration::from_secs(5), session.done())
            .await
            .expect("done fired");
        assert!(session.is_done());
        assert!(session.connection().is_closed());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mock = MockBrowser::start().await;
        let session = Session::connect(mock.url()).await.expect("connect");
        let signal = session.done_signal();

        session.close().await.expect("first close");
        session.close().await.expect("second close");
        assert!(signal.is_done());

        let err = session.eval("1").await.expect_err("closed");
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_close_browser_sends_close() {
        let mut mock = MockBrowser::start().await;
        let session = Session::connect(mock.url()).await.expect("connect");
        skip_startup_calls(&mut mock).await;

        session.close_browser().await.expect("close browser");

        let call = mock.next_call().await;
        assert_eq!(call.method, "Browser.close");
        assert!(session.is_done());
    }
}
