//! One collection cycle: fan out every probe and plugin, wait for all of
//! them, fan in to a [`Snapshot`].

use std::{collections::HashSet, sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn, Instrument};

use super::{
    assembler::{assemble, Snapshot, SystemData, TaskResult},
    collectors::{
        error::CollectorError, host::HostInfo, probes::ProbeSet, processes::ProcessInfo,
        registry::ConfiguredPlugin, traits::DataProducer, types::CollectorResult,
    },
};
use crate::config::agent::AgentConfig;

/// Runs the fixed probes and the configured plugins concurrently.
///
/// A failing probe degrades its field to the default value and a failing
/// plugin degrades its slot to `null`; neither affects any other task.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    probes: ProbeSet,
    plugin_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(probes: ProbeSet) -> Self {
        Self {
            probes,
            plugin_timeout: None,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(ProbeSet::from_config(config)).with_plugin_timeout(config.plugin_timeout())
    }

    /// Abandons any plugin still running after `timeout`. `None` waits
    /// indefinitely.
    pub fn with_plugin_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.plugin_timeout = timeout;
        self
    }

    pub fn plugin_timeout(&self) -> Option<Duration> {
        self.plugin_timeout
    }

    /// Collects one snapshot.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::InvalidRequest` if a plugin name is empty or
    /// appears twice. Nothing is started in that case. Probe and plugin
    /// failures are never returned; they are logged and degraded.
    #[instrument(skip_all, fields(plugins = plugins.len()))]
    pub async fn collect_all(&self, plugins: &[ConfiguredPlugin]) -> CollectorResult<Snapshot> {
        validate_plugins(plugins)?;

        let ((system, processes, host), results) =
            tokio::join!(self.collect_system(), self.collect_plugins(plugins));

        let failed = results.iter().filter(|r| !r.is_ok()).count();
        debug!(
            "Collection finished: {} plugins, {} failed",
            results.len(),
            failed
        );

        Ok(assemble(system, processes, host, results))
    }

    async fn collect_system(&self) -> (SystemData, Vec<ProcessInfo>, HostInfo) {
        let probes = &self.probes;

        let cpu = spawn_probe("cpu", probes.cpu.clone());
        let network = spawn_probe("network", probes.network.clone());
        let disk = spawn_probe("disk", probes.disk.clone());
        let disk_io = spawn_probe("disk_io", probes.disk_io.clone());
        let memory = spawn_probe("memory", probes.memory.clone());
        let uptime = spawn_probe("uptime", probes.uptime.clone());
        let loadavg = spawn_probe("loadavg", probes.loadavg.clone());
        let host = spawn_probe("host", probes.host.clone());
        let processes = spawn_probe("processes", probes.processes.clone());

        let system = SystemData {
            cpu: join_probe("cpu", cpu).await,
            network: join_probe("network", network).await,
            disk: join_probe("disk", disk).await,
            disk_io: join_probe("disk_io", disk_io).await,
            loadavg: join_probe("loadavg", loadavg).await,
            uptime: join_probe("uptime", uptime).await,
            memory: join_probe("memory", memory).await,
        };

        (
            system,
            join_probe("processes", processes).await,
            join_probe("host", host).await,
        )
    }

    async fn collect_plugins(&self, plugins: &[ConfiguredPlugin]) -> Vec<TaskResult> {
        let handles: Vec<(String, JoinHandle<TaskResult>)> = plugins
            .iter()
            .map(|plugin| {
                let name = plugin.name.clone();
                let handle = spawn_plugin(plugin.clone(), self.plugin_timeout);
                (name, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Plugin '{}' task aborted: {}", name, e);
                    TaskResult::failure(name, e)
                }
            };
            results.push(result);
        }
        results
    }
}

/// Rejects empty and duplicate plugin names.
fn validate_plugins(plugins: &[ConfiguredPlugin]) -> CollectorResult<()> {
    let mut seen = HashSet::with_capacity(plugins.len());
    for plugin in plugins {
        if plugin.name.trim().is_empty() {
            return Err(CollectorError::InvalidRequest(
                "plugin name must not be empty".to_string(),
            ));
        }
        if !seen.insert(plugin.name.as_str()) {
            return Err(CollectorError::InvalidRequest(format!(
                "plugin '{}' is configured more than once",
                plugin.name
            )));
        }
    }
    Ok(())
}

fn spawn_probe<T>(
    category: &'static str,
    probe: Arc<dyn DataProducer<Output = T>>,
) -> JoinHandle<T>
where
    T: Default + Send + Sync + 'static,
{
    tokio::spawn(
        async move {
            match probe.produce().await {
                Ok(value) => value,
                Err(e) => {
                    error!("Probe '{}' failed: {}", category, e);
                    T::default()
                }
            }
        }
        .in_current_span(),
    )
}

async fn join_probe<T: Default>(category: &'static str, handle: JoinHandle<T>) -> T {
    match handle.await {
        Ok(value) => value,
        Err(e) => {
            error!("Probe '{}' task aborted: {}", category, e);
            T::default()
        }
    }
}

fn spawn_plugin(plugin: ConfiguredPlugin, timeout: Option<Duration>) -> JoinHandle<TaskResult> {
    tokio::spawn(
        async move {
            let ConfiguredPlugin { name, instance } = plugin;

            let outcome = match timeout {
                Some(after) => match tokio::time::timeout(after, instance.collect_value()).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!("Plugin '{}' did not finish within {:?}", name, after);
                        Err(CollectorError::Timeout {
                            plugin: name.clone(),
                            after,
                        })
                    }
                },
                None => instance.collect_value().await,
            };

            match outcome {
                Ok(value) => {
                    debug!("Collected data from plugin '{}'", name);
                    TaskResult::success(name, value)
                }
                Err(e) => {
                    error!("Can't collect plugin '{}': {}", name, e);
                    TaskResult::failure(name, e)
                }
            }
        }
        .in_current_span(),
    )
}
