//! Runtime configuration options read by the core.
//!
//! Option values live outside the core (usually a configuration table owned by
//! the host application). The core only needs a lookup by symbolic key with a
//! compiled-in default per option.

use std::collections::HashMap;

use crate::decision::Decision;

/// A configuration option the core consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigurationOption {
    /// Decision applied when no hierarchy rule bears on a node.
    DefaultHierarchyAccessRule,
}

impl ConfigurationOption {
    /// Symbolic key under which the option is stored.
    pub const fn key(&self) -> &'static str {
        match self {
            ConfigurationOption::DefaultHierarchyAccessRule => "hierarchy.default_rule",
        }
    }

    /// Compiled-in default.
    pub const fn default_value(&self) -> &'static str {
        match self {
            ConfigurationOption::DefaultHierarchyAccessRule => Decision::ALLOW_SENTINEL,
        }
    }
}

/// Lookup of configuration values by option.
pub trait Configuration: Send + Sync {
    /// The stored value, if any.
    fn get_value(&self, option: ConfigurationOption) -> Option<String>;

    /// The stored value or the option's compiled-in default.
    fn value_or_default(&self, option: ConfigurationOption) -> String {
        self.get_value(option)
            .unwrap_or_else(|| option.default_value().to_owned())
    }
}

/// In-memory configuration keyed by option key.
#[derive(Debug, Clone, Default)]
pub struct StaticConfiguration {
    values: HashMap<String, String>,
}

impl StaticConfiguration {
    /// Create an empty configuration (every option at its default).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, option: ConfigurationOption, value: impl Into<String>) -> Self {
        self.set(option, value);
        self
    }

    /// Set an option value.
    pub fn set(&mut self, option: ConfigurationOption, value: impl Into<String>) {
        self.values.insert(option.key().to_owned(), value.into());
    }

    /// Remove an option value, restoring its default.
    pub fn unset(&mut self, option: ConfigurationOption) {
        self.values.remove(option.key());
    }
}

impl Configuration for StaticConfiguration {
    fn get_value(&self, option: ConfigurationOption) -> Option<String> {
        self.values.get(option.key()).cloned()
    }
}
