//! Page-side scripts for the binding bridge.
//!
//! The proxy script replaces `window[name]` (the raw binding installed by
//! `Runtime.addBinding`) with an async function that keeps its own pending
//! promise bookkeeping:
//!
//! | Property | Content |
//! |----------|---------|
//! | `callbacks` | `Map<seq, resolve>` |
//! | `errors` | `Map<seq, reject>` |
//! | `lastSeq` | Last sequence number handed out |
//!
//! The settle script runs once per invocation and resolves or rejects the
//! promise for one `seq`, then forgets it.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use super::BindingResult;

// ============================================================================
// Scripts
// ============================================================================

/// Builds the proxy installed for a binding name.
#[must_use]
pub fn proxy_script(name: &str) -> String {
    PROXY_TEMPLATE.replace("$NAME", &json_string(name))
}

/// Builds the script settling the promise of invocation `seq`.
#[must_use]
pub fn settle_script(name: &str, seq: u64, outcome: &BindingResult) -> String {
    let (settle, payload) = match outcome {
        Ok(value) => ("callbacks", value.to_string()),
        Err(error) => ("errors", json_string(error.message())),
    };

    format!(
        r#"(() => {{
    const me = window[{name}];
    const settle = me['{settle}'].get({seq});
    me['callbacks'].delete({seq});
    me['errors'].delete({seq});
    if (settle) {{
        settle({payload});
    }}
}})();"#,
        name = json_string(name),
    )
}

/// Escapes a string for safe use in JavaScript.
fn json_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

// ============================================================================
// Templates
// ============================================================================

const PROXY_TEMPLATE: &str = r#"(() => {
    const bindingName = $NAME;
    const binding = window[bindingName];
    window[bindingName] = async (...args) => {
        const me = window[bindingName];
        let callbacks = me['callbacks'];
        let errors = me['errors'];
        if (!callbacks) {
            callbacks = new Map();
            me['callbacks'] = callbacks;
        }
        if (!errors) {
            errors = new Map();
            me['errors'] = errors;
        }
        const seq = (me['lastSeq'] || 0) + 1;
        me['lastSeq'] = seq;
        const promise = new Promise((resolve, reject) => {
            callbacks.set(seq, resolve);
            errors.set(seq, reject);
        });
        binding(JSON.stringify({ name: bindingName, seq, args }));
        return promise;
    };
})();"#;

// ============================================================================
// Tests
// ============================================================================
