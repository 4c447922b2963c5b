use serde::Serialize;

use super::types::CollectorResult;

/// Contract for a system probe: one category of host data read from the
/// operating environment.
///
/// The orchestrator treats every probe identically: it calls `produce` once
/// per cycle and either keeps the value or substitutes `Output::default()`.
/// Implementations are `'static` so they can be shared into spawned tasks.
#[async_trait::async_trait]
pub trait DataProducer: Send + Sync + 'static {
    /// The structured data this probe returns.
    type Output: Send + Sync + 'static;

    /// Reads the probed source and returns the parsed value.
    async fn produce(&self) -> CollectorResult<Self::Output>;
}

/// Contract for a pluggable collector unit.
///
/// Only [`Plugin::collect`] is invoked during a collection cycle. `start` and
/// `stop` are lifecycle hooks called once per activation by the agent, and
/// `configure` binds a freshly created instance to its settings table before
/// it is handed to the orchestrator.
#[async_trait::async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Structured result of one collection.
    type Output: Serialize + Send + 'static;

    /// Human readable one-liner shown by the CLI.
    fn description(&self) -> &'static str;

    /// Example settings block for this plugin, in TOML.
    fn sample_config(&self) -> &'static str;

    /// Applies the plugin's settings table.
    fn configure(&mut self, _settings: &toml::Table) -> CollectorResult<()> {
        Ok(())
    }

    async fn start(&self) -> CollectorResult<()> {
        Ok(())
    }

    async fn stop(&self) {}

    /// Runs one collection.
    async fn collect(&self) -> CollectorResult<Self::Output>;
}
