//! Blossom handlers and their registry.
//!
//! A blossom is the host-supplied implementation behind a leaf action call.
//! Handlers are registered once under a `(group, name)` pair before any
//! execution and are shared read-only with every worker afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use crate::item::BlossomItem;
use crate::value::ValueMap;

/// A host-supplied action implementation.
///
/// Handlers may be called from several workers at once, each with its own
/// item instance; they must not assume mutual exclusion.
pub trait Blossom: Send + Sync {
    /// Static check of the call's declared values, run by the validator
    /// before any execution. Must be free of side effects.
    fn validate_input(&self, item: &BlossomItem) -> Result<(), String>;

    /// Performs the action. May block on I/O and may set `item.output`.
    fn execute(&self, item: &mut BlossomItem, env: &ValueMap) -> Result<(), String>;
}

/// Flat registry of blossom handlers, keyed by `(group, name)`.
#[derive(Default)]
pub struct BlossomRegistry {
    blossoms: HashMap<(String, String), Arc<dyn Blossom>>,
}

impl BlossomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler. Returns `false` without replacing when the
    /// `(group, name)` pair is already taken.
    pub fn add_blossom(
        &mut self,
        group: impl Into<String>,
        name: impl Into<String>,
        handler: Arc<dyn Blossom>,
    ) -> bool {
        let key = (group.into(), name.into());
        if self.blossoms.contains_key(&key) {
            return false;
        }
        self.blossoms.insert(key, handler);
        true
    }

    pub fn get_blossom(&self, group: &str, name: &str) -> Option<Arc<dyn Blossom>> {
        self.blossoms
            .get(&(group.to_string(), name.to_string()))
            .cloned()
    }

    pub fn has_blossom(&self, group: &str, name: &str) -> bool {
        self.blossoms
            .contains_key(&(group.to_string(), name.to_string()))
    }
}

impl std::fmt::Debug for BlossomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlossomRegistry")
            .field("registered", &self.blossoms.len())
            .finish()
    }
}
