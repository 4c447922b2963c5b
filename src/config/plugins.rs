//! Configuration structures for the plugins that run every collection cycle.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A single enabled plugin together with its plugin-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct PluginEntry {
    /// Registered plugin name, used to look up the factory.
    #[validate(length(min = 1, message = "Plugin name must not be empty"))]
    pub name: String,

    /// Free-form settings handed to the plugin's `configure` hook.
    #[serde(default)]
    pub config: toml::Table,
}

impl PluginEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: toml::Table::new(),
        }
    }

    pub fn with_config(mut self, config: toml::Table) -> Self {
        self.config = config;
        self
    }
}

/// The set of plugins enabled for this agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct PluginsConfig {
    #[validate(nested)]
    pub enabled: Vec<PluginEntry>,
}

impl PluginsConfig {
    /// Return enabled plugin names in configuration order.
    pub fn enabled_names(&self) -> Vec<&str> {
        self.enabled.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn find(&self, name: &str) -> Option<&PluginEntry> {
        self.enabled.iter().find(|p| p.name == name)
    }
}
