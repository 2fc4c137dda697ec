//! Observable attribute container.

use std::fmt;
use std::sync::Arc;

use crate::value::{Attributes, Value};

/// Callback receiving the names of changed attributes.
pub type ChangeListener = Arc<dyn Fn(&[String]) + Send + Sync>;

/// Attribute map with change tracking and listeners.
#[derive(Clone, Default)]
pub struct AttributeStore {
    attributes: Attributes,
    changed: Vec<String>,
    listeners: Vec<ChangeListener>,
}

impl fmt::Debug for AttributeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeStore")
            .field("attributes", &self.attributes)
            .field("changed", &self.changed)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl PartialEq for AttributeStore {
    fn eq(&self, other: &Self) -> bool {
        self.attributes == other.attributes
    }
}

impl AttributeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Get an attribute mutably.
    ///
    /// Mutations through this reference are not tracked.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.attributes.get_mut(name)
    }

    /// Check if an attribute is set to a non-null value.
    pub fn has(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|v| !v.is_null())
    }

    /// Store attributes and record which ones changed.
    ///
    /// Listeners are notified once with every changed key unless `silent`.
    pub fn set(&mut self, attributes: Attributes, silent: bool) -> &[String] {
        self.changed.clear();
        for (name, value) in attributes {
            if self.attributes.get(&name) != Some(&value) {
                self.changed.push(name.clone());
            }
            self.attributes.insert(name, value);
        }
        if !silent {
            self.notify();
        }
        &self.changed
    }

    /// Remove an attribute.
    pub fn unset(&mut self, name: &str, silent: bool) -> Option<Value> {
        let removed = self.attributes.shift_remove(name);
        self.changed.clear();
        if removed.is_some() {
            self.changed.push(name.to_string());
            if !silent {
                self.notify();
            }
        }
        removed
    }

    /// Keys changed by the last `set` or `unset`.
    pub fn changed(&self) -> &[String] {
        &self.changed
    }

    /// Forget which keys changed.
    pub fn clear_changed(&mut self) {
        self.changed.clear();
    }

    /// Register a change listener.
    pub fn on_change(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }

    /// All attributes in insertion order.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Number of stored attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    fn notify(&self) {
        if self.changed.is_empty() {
            return;
        }
        for listener in &self.listeners {
            listener(&self.changed);
        }
    }
}
