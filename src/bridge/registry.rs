//! Registry of bound functions for one session.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::BindingFn;

// ============================================================================
// BindingRegistry
// ============================================================================

/// Name to callable map shared by the bridge and the event loop.
///
/// Lookups clone the `Arc` out so the lock is never held while a binding
/// runs.
#[derive(Default)]
pub struct BindingRegistry {
    bindings: Mutex<FxHashMap<String, BindingFn>>,
}

impl BindingRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a callable, replacing any previous one.
    ///
    /// Returns `true` if the name was not bound before.
    pub fn insert(&self, name: &str, binding: BindingFn) -> bool {
        self.bindings
            .lock()
            .insert(name.to_string(), binding)
            .is_none()
    }

    /// Returns the callable bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<BindingFn> {
        self.bindings.lock().get(name).cloned()
    }

    /// Removes the callable bound to `name`.
    pub fn remove(&self, name: &str) -> Option<BindingFn> {
        self.bindings.lock().remove(name)
    }

    /// Removes `name` only while it is still bound to `binding`.
    ///
    /// Returns `true` if the entry was removed.
    pub fn remove_if_same(&self, name: &str, binding: &BindingFn) -> bool {
        let mut bindings = self.bindings.lock();
        match bindings.get(name) {
            Some(current) if Arc::ptr_eq(current, binding) => {
                bindings.remove(name);
                true
            }
            _ => false,
        }
    }

    /// Returns `true` if `name` is bound.
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.lock().contains_key(name)
    }

    /// Returns the bound names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.bindings.lock().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of bindings.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.lock().len()
    }

    /// Returns `true` if nothing is bound.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.lock().is_empty()
    }
}

impl std::fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("names", &self.names())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
