//! Correlation-state registry
//!
//! Small local map from correlation id to provider, kept while an attempt is
//! in flight so a completion signal can still be attributed after the popup
//! navigates away and back. Entries are cleared on terminal transitions.

use gwc_types::Provider;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Registry of in-flight correlation ids
#[derive(Default)]
pub struct StateRegistry {
    entries: Mutex<HashMap<String, Provider>>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt's correlation id
    pub fn store(&self, state: impl Into<String>, provider: Provider) {
        self.entries.lock().insert(state.into(), provider);
    }

    /// Look up the provider for a correlation id
    pub fn lookup(&self, state: &str) -> Option<Provider> {
        self.entries.lock().get(state).copied()
    }

    /// Remove a single entry
    pub fn remove(&self, state: &str) -> Option<Provider> {
        self.entries.lock().remove(state)
    }

    /// Drop all entries
    pub fn clear_all(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
