//! Periodic collection loop.
//!
//! The `Executor` owns the configured plugins, runs one orchestrated
//! collection per interval and hands each snapshot to a [`Publisher`].
//! Cadence lives here, not in the orchestrator.

use std::{error::Error, sync::Arc};

use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, trace, warn};

use super::{
    assembler::Snapshot,
    collectors::{registry::ConfiguredPlugin, types::CollectorResult},
    orchestrator::Orchestrator,
};

/// Destination for finished snapshots.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, snapshot: &Snapshot) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Writes a one-line summary at info level and the full JSON at debug.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait::async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, snapshot: &Snapshot) -> Result<(), Box<dyn Error + Send + Sync>> {
        info!(
            "Snapshot for '{}': cpu user {:.2}%, memory used {:.2}%, {} processes, {} plugins",
            snapshot.host.host,
            snapshot.system.cpu.user,
            snapshot.system.memory.used_percent,
            snapshot.processes.len(),
            snapshot.plugins.len()
        );
        debug!("{}", serde_json::to_string(snapshot)?);
        Ok(())
    }
}

pub struct Executor {
    orchestrator: Orchestrator,
    plugins: Vec<ConfiguredPlugin>,
    interval: Duration,
    publisher: Arc<dyn Publisher>,
}

impl Executor {
    pub fn new(
        orchestrator: Orchestrator,
        plugins: Vec<ConfiguredPlugin>,
        interval: Duration,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            orchestrator,
            plugins,
            interval,
            publisher,
        }
    }

    pub fn plugins(&self) -> &[ConfiguredPlugin] {
        &self.plugins
    }

    /// Calls `start` on every plugin. A plugin that fails to start is still
    /// collected; its collection errors surface per cycle.
    pub async fn start_plugins(&self) {
        for plugin in &self.plugins {
            match plugin.instance.start().await {
                Ok(()) => debug!("Plugin '{}' started", plugin.name),
                Err(e) => warn!("Plugin '{}' failed to start: {}", plugin.name, e),
            }
        }
    }

    pub async fn stop_plugins(&self) {
        for plugin in &self.plugins {
            plugin.instance.stop().await;
            debug!("Plugin '{}' stopped", plugin.name);
        }
    }

    /// Collects one snapshot and publishes it.
    ///
    /// Publishing failures are logged; only an invalid plugin list is
    /// returned as an error.
    pub async fn run_once(&self) -> CollectorResult<Snapshot> {
        let snapshot = self.orchestrator.collect_all(&self.plugins).await?;
        if let Err(e) = self.publisher.publish(&snapshot).await {
            error!("Publish failed: {}", e);
        }
        Ok(snapshot)
    }

    /// Runs the collection loop indefinitely.
    pub async fn run(&self) -> ! {
        info!(
            "Metrics collection started (interval: {}s, plugins: {})",
            self.interval.as_secs(),
            self.plugins.len()
        );

        loop {
            let start = Instant::now();

            if let Err(e) = self.run_once().await {
                error!("Collection cycle failed: {}", e);
            }
            log_memory_stats().await;

            let elapsed = start.elapsed();
            if elapsed < self.interval {
                sleep(self.interval - elapsed).await;
            } else {
                warn!(
                    "Collection took {:?}, longer than the {:?} interval",
                    elapsed, self.interval
                );
            }
        }
    }
}

/// Logs the agent's own resident memory at trace level.
pub async fn log_memory_stats() {
    match tokio::fs::read_to_string("/proc/self/statm").await {
        Ok(content) => {
            let resident_pages = content
                .split_whitespace()
                .nth(1)
                .and_then(|s| s.parse::<u64>().ok());
            match resident_pages {
                Some(pages) => trace!("Resident memory: {} MiB", pages * 4096 / 1024 / 1024),
                None => debug!("Invalid format in /proc/self/statm"),
            }
        }
        Err(e) => trace!("Could not read /proc/self/statm: {}", e),
    }
}
