//! Host function bindings callable from page script.
//!
//! A binding makes a Rust function appear as an async function on `window`.
//! Calling it from the page returns a promise that settles with the Rust
//! function's outcome.
//!
//! # Flow
//!
//! ```text
//! page: await window.add(1, 2)
//!   → proxy allocates seq, calls raw binding with {"name","seq","args"}
//!   → Runtime.bindingCalled arrives on the session
//!   → event loop spawns the bound function
//!   → Runtime.evaluate(settle script) in the calling context
//!   → promise for seq resolves with 3
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `adapter` | Typed function adapters and return conversion |
//! | `registry` | Name to callable map |
//! | `script` | Proxy and settle scripts |

// ============================================================================
// Submodules
// ============================================================================

/// Typed function adapters.
pub mod adapter;

/// Binding registry.
pub mod registry;

/// Page-side scripts.
pub mod script;

// ============================================================================
// Re-exports
// ============================================================================

pub use adapter::{
    AsyncBinding, BindingError, BindingFn, BindingResult, IntoBindingResult, Json, SyncBinding,
    binding_fn,
};
pub use registry::BindingRegistry;

// ============================================================================
// Imports
// ============================================================================

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ExecutionContextId;
use crate::protocol::{BindingInvocation, Command, PageCommand, RuntimeCommand};
use crate::transport::Connection;

// ============================================================================
// Install
// ============================================================================

/// Binds `binding` under `name` on the connection's page.
///
/// Re-binding an existing name only swaps the callable. The page-side proxy
/// keeps its pending promises.
///
/// # Errors
///
/// Returns [`Error::Binding`] if the browser rejects any install step. The
/// registry entry is removed again in that case, unless a later `bind` has
/// already replaced it.
pub(crate) async fn bind(connection: &Connection, name: &str, binding: BindingFn) -> Result<()> {
    if !connection.bindings().insert(name, binding.clone()) {
        debug!(name, "Replaced existing binding");
        return Ok(());
    }

    match install(connection, name).await {
        Ok(()) => {
            debug!(name, "Binding installed");
            Ok(())
        }
        Err(e) => {
            if !connection.bindings().remove_if_same(name, &binding) {
                debug!(name, "Binding replaced during install, keeping replacement");
            }
            warn!(name, error = %e, "Binding install failed");
            Err(Error::binding(name, e.to_string()))
        }
    }
}

/// Registers the raw binding and the proxy script.
async fn install(connection: &Connection, name: &str) -> Result<()> {
    connection
        .send(Command::Runtime(RuntimeCommand::AddBinding {
            name: name.to_string(),
        }))
        .await?;

    let source = script::proxy_script(name);

    connection
        .send(Command::Page(PageCommand::AddScriptToEvaluateOnNewDocument {
            source: source.clone(),
        }))
        .await?;

    connection
        .send(Command::Runtime(RuntimeCommand::evaluate(source)))
        .await?;

    Ok(())
}

// ============================================================================
// Invocation
// ============================================================================

/// Starts a binding invocation reported by `Runtime.bindingCalled`.
///
/// Never blocks the caller: the bound function runs in its own task.
pub(crate) fn dispatch_invocation(
    connection: &Connection,
    name: &str,
    payload: &str,
    context_id: ExecutionContextId,
) {
    let Some(binding) = connection.bindings().get(name) else {
        trace!(name, "Call for unbound name");
        return;
    };

    let invocation = match BindingInvocation::parse(payload) {
        Ok(invocation) => invocation,
        Err(e) => {
            warn!(name, error = %e, "Malformed binding payload");
            return;
        }
    };

    trace!(name, seq = invocation.seq, "Binding called");
    tokio::spawn(invoke(connection.clone(), binding, invocation, context_id));
}

/// Runs the bound function and settles the page promise.
async fn invoke(
    connection: Connection,
    binding: BindingFn,
    invocation: BindingInvocation,
    context_id: ExecutionContextId,
) {
    let BindingInvocation { name, seq, args } = invocation;

    let outcome = AssertUnwindSafe(async move { binding(args).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(BindingError::from_panic(panic)));

    if let Err(e) = &outcome {
        debug!(%name, seq, error = %e, "Binding rejected");
    }

    let expression = script::settle_script(&name, seq, &outcome);
    if let Err(e) = connection
        .send(Command::Runtime(RuntimeCommand::evaluate_in(expression, context_id)))
        .await
    {
        warn!(%name, seq, error = %e, "Failed to settle binding promise");
    }
}

// ============================================================================
// Tests
// ============================================================================
