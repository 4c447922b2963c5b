use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use super::{error::CollectorError, traits::Plugin, types::CollectorResult};
use crate::config::plugins::PluginsConfig;

/// Object-safe view of a [`Plugin`].
///
/// It lets the registry and the orchestrator hold plugins with different
/// output types side by side. Output is converted to a `serde_json::Value`
/// at the boundary.
#[async_trait::async_trait]
pub trait DynPlugin: Send + Sync {
    /// Name the plugin was registered under.
    fn name(&self) -> &str;

    fn description(&self) -> &'static str;

    fn sample_config(&self) -> &'static str;

    fn configure(&mut self, settings: &toml::Table) -> CollectorResult<()>;

    async fn start(&self) -> CollectorResult<()>;

    async fn stop(&self);

    /// Runs one collection and serializes its output.
    async fn collect_value(&self) -> CollectorResult<serde_json::Value>;
}

/// Turns any concrete [`Plugin`] into a [`DynPlugin`] trait object.
pub struct PluginWrapper<T> {
    inner: T,
    name: String,
}

impl<T> PluginWrapper<T> {
    pub fn new(name: impl Into<String>, inner: T) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

#[async_trait::async_trait]
impl<T: Plugin> DynPlugin for PluginWrapper<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &'static str {
        self.inner.description()
    }

    fn sample_config(&self) -> &'static str {
        self.inner.sample_config()
    }

    fn configure(&mut self, settings: &toml::Table) -> CollectorResult<()> {
        self.inner.configure(settings)
    }

    async fn start(&self) -> CollectorResult<()> {
        self.inner.start().await
    }

    async fn stop(&self) {
        self.inner.stop().await
    }

    async fn collect_value(&self) -> CollectorResult<serde_json::Value> {
        let output = self.inner.collect().await?;
        serde_json::to_value(output).map_err(|source| CollectorError::Serialization {
            name: self.name.clone(),
            source,
        })
    }
}

/// Creates a fresh, unconfigured plugin instance.
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn DynPlugin> + Send + Sync>;

/// Link-time registration record submitted by [`register_plugin!`].
pub struct PluginMeta {
    pub name: &'static str,
    pub factory: fn() -> Box<dyn DynPlugin>,
}

inventory::collect!(PluginMeta);

/// A plugin instance bound to its settings, ready to be collected.
#[derive(Clone)]
pub struct ConfiguredPlugin {
    pub name: String,
    pub instance: Arc<dyn DynPlugin>,
}

impl ConfiguredPlugin {
    pub fn new(name: impl Into<String>, instance: Arc<dyn DynPlugin>) -> Self {
        Self {
            name: name.into(),
            instance,
        }
    }
}

impl std::fmt::Debug for ConfiguredPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredPlugin")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Name → factory table for every plugin the agent knows about.
///
/// Filled once at startup, then only read. It is passed around explicitly
/// rather than living in a global.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from every plugin submitted with `register_plugin!`.
    pub fn from_inventory() -> Self {
        let mut registry = Self::new();
        for meta in inventory::iter::<PluginMeta> {
            let factory = meta.factory;
            registry.register(meta.name, move || factory());
        }
        registry
    }

    /// Inserts a factory. A later registration under the same name replaces
    /// the earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn DynPlugin> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Retrieves the factory registered under `name`.
    pub fn lookup(&self, name: &str) -> CollectorResult<PluginFactory> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| CollectorError::PluginNotFound(name.to_string()))
    }

    /// Creates a fresh instance of the plugin registered under `name`.
    pub fn instantiate(&self, name: &str) -> CollectorResult<Box<dyn DynPlugin>> {
        Ok((self.lookup(name)?)())
    }

    /// Registered names in lexical order.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.list_names())
            .finish()
    }
}

/// Binds every enabled plugin to its settings table.
///
/// Each entry gets its own fresh instance. Fails on the first unknown name,
/// duplicate name or rejected configuration.
pub fn configure_plugins(
    registry: &PluginRegistry,
    config: &PluginsConfig,
) -> CollectorResult<Vec<ConfiguredPlugin>> {
    let mut seen = HashSet::with_capacity(config.enabled.len());
    let mut configured = Vec::with_capacity(config.enabled.len());

    for entry in &config.enabled {
        if !seen.insert(entry.name.as_str()) {
            return Err(CollectorError::InvalidPluginConfig {
                plugin: entry.name.clone(),
                reason: "plugin is enabled more than once".to_string(),
            });
        }

        let mut instance = registry.instantiate(&entry.name)?;
        instance.configure(&entry.config)?;
        tracing::debug!("Configured plugin '{}'", entry.name);

        configured.push(ConfiguredPlugin::new(
            entry.name.clone(),
            Arc::from(instance),
        ));
    }

    Ok(configured)
}

/// Registers a plugin type with the link-time inventory.
///
/// The type must implement `Plugin` and `Default`.
#[macro_export]
macro_rules! register_plugin {
    ($plugin_type:ty, $name:expr) => {
        inventory::submit! {
            $crate::core::collectors::registry::PluginMeta {
                name: $name,
                factory: || {
                    Box::new(
                        $crate::core::collectors::registry::PluginWrapper::new(
                            $name,
                            <$plugin_type>::default(),
                        )
                    ) as Box<dyn $crate::core::collectors::registry::DynPlugin>
                },
            }
        }
    };
}
