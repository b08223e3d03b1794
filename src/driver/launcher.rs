//! Startup sequencing.
//!
//! Launch runs in a fixed order and aborts on the first failure, killing
//! the subprocess before returning:
//!
//! 1. Validate options, resolve binary, prepare profile
//! 2. Spawn the browser and read its endpoint from stderr
//! 3. Connect the WebSocket and negotiate a page session
//! 4. Enable protocol domains
//! 5. Resolve the window (skipped when headless)

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::WindowId;
use crate::protocol::{
    Bounds, BrowserCommand, Command, LogCommand, NetworkCommand, PageCommand,
    PerformanceCommand, RuntimeCommand, SecurityCommand, TargetCommand, WindowState,
};
use crate::transport::{Connection, Endpoint, negotiate};

use super::options::BrowserOptions;
use super::process::BrowserProcess;
use super::profile::Profile;

// ============================================================================
// Launched
// ============================================================================

/// Everything a freshly started browser session owns.
#[derive(Debug)]
pub(crate) struct Launched {
    pub connection: Connection,
    pub process: BrowserProcess,
    pub profile: Profile,
    pub window_id: Option<WindowId>,
}

// ============================================================================
// Launch
// ============================================================================

/// Starts a browser and attaches a session to its page.
///
/// # Errors
///
/// Returns the first error of the startup sequence. The subprocess is
/// killed and the profile released before returning.
pub(crate) async fn launch(options: &BrowserOptions) -> Result<Launched> {
    options.validate()?;

    let binary = options.resolve_binary()?;
    let profile = Profile::prepare(options.user_data_dir.as_deref(), options.keep_user_data_dir)?;
    let args = options.to_args(profile.path());

    debug!(
        binary = %binary.display(),
        profile = %profile.path().display(),
        arg_count = args.len(),
        "Launching browser"
    );

    let mut process = match BrowserProcess::spawn(&binary, &args) {
        Ok(process) => process,
        Err(e) => {
            release_profile(profile);
            return Err(e);
        }
    };

    match start(&mut process, options).await {
        Ok((connection, window_id)) => {
            info!(
                pid = process.pid(),
                target_id = %connection.target_id(),
                session_id = %connection.session_id(),
                "Browser session ready"
            );
            Ok(Launched {
                connection,
                process,
                profile,
                window_id,
            })
        }
        Err(e) => {
            warn!(pid = process.pid(), error = %e, "Browser startup failed");
            if let Err(kill_err) = process.kill().await {
                debug!(error = %kill_err, "Failed to kill browser after startup failure");
            }
            release_profile(profile);
            Err(e)
        }
    }
}

async fn start(
    process: &mut BrowserProcess,
    options: &BrowserOptions,
) -> Result<(Connection, Option<WindowId>)> {
    let endpoint = process.wait_for_endpoint(options.startup_timeout).await?;
    let connection = attach(&endpoint, options.startup_timeout, options.debug).await?;

    let window_id = match initialize(&connection, options).await {
        Ok(window_id) => window_id,
        Err(e) => {
            connection.shutdown();
            return Err(e);
        }
    };

    Ok((connection, window_id))
}

fn release_profile(profile: Profile) {
    if let Err(e) = profile.close() {
        debug!(error = %e, "Failed to release profile");
    }
}

// ============================================================================
// Attach
// ============================================================================

/// Connects to `endpoint` and negotiates a page session within `limit`.
///
/// # Errors
///
/// - [`Error::ConnectionTimeout`] if `limit` elapses
/// - [`Error::Connection`] if the socket cannot be opened
/// - [`Error::Negotiation`] if the browser refuses the session
pub(crate) async fn attach(endpoint: &Endpoint, limit: Duration, debug: bool) -> Result<Connection> {
    let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);

    timeout(limit, async {
        let mut ws = endpoint.connect().await?;
        let negotiated = negotiate(&mut ws).await?;
        Ok::<_, Error>(Connection::new(ws, negotiated, debug))
    })
    .await
    .map_err(|_| Error::connection_timeout(timeout_ms))?
}

// ============================================================================
// Initialize
// ============================================================================

/// Enables domains, then resolves and shapes the window.
async fn initialize(connection: &Connection, options: &BrowserOptions) -> Result<Option<WindowId>> {
    enable_domains(connection).await?;

    if options.is_headless() {
        debug!("Headless session, no window to resolve");
        return Ok(None);
    }

    let window_id = window_for_target(connection).await?;

    if options.window_state != WindowState::Normal {
        let bounds = Bounds::state(options.window_state);
        connection
            .send(Command::Browser(BrowserCommand::SetWindowBounds { window_id, bounds }))
            .await?;
        debug!(window_id = %window_id, state = ?options.window_state, "Applied window state");
    }

    Ok(Some(window_id))
}

/// Domains enabled on every session, in order.
fn domain_commands() -> [Command; 7] {
    [
        Command::Page(PageCommand::Enable),
        Command::Target(TargetCommand::SetAutoAttach {
            auto_attach: true,
            wait_for_debugger_on_start: false,
        }),
        Command::Network(NetworkCommand::Enable),
        Command::Runtime(RuntimeCommand::Enable),
        Command::Security(SecurityCommand::Enable),
        Command::Performance(PerformanceCommand::Enable),
        Command::Log(LogCommand::Enable),
    ]
}

pub(crate) async fn enable_domains(connection: &Connection) -> Result<()> {
    for command in domain_commands() {
        connection.send(command).await?;
    }
    debug!("Protocol domains enabled");
    Ok(())
}

pub(crate) async fn window_for_target(connection: &Connection) -> Result<WindowId> {
    let reply = connection
        .send(Command::Browser(BrowserCommand::GetWindowForTarget {
            target_id: connection.target_id().clone(),
        }))
        .await?;

    let window_id = reply
        .get("windowId")
        .and_then(Value::as_i64)
        .map(WindowId::new)
        .ok_or_else(|| Error::protocol("Browser.getWindowForTarget reply has no windowId"))?;

    debug!(window_id = %window_id, "Window resolved");
    Ok(window_id)
}

// ============================================================================
// Tests
// ============================================================================
