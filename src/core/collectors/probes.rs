use std::sync::Arc;

use super::{
    avg::{LoadAverage, LoadAverageCollector},
    cpu::{CpuCollector, CpuUsage},
    disk::{DiskCollector, DiskIo},
    filesys::{FilesystemCollector, VolumeUsage},
    host::{HostCollector, HostInfo},
    network::{InterfaceTraffic, NetworkCollector},
    processes::{ProcessCollector, ProcessInfo},
    procfs::ProcFs,
    ram::{MemoryCollector, MemoryUsage},
    traits::DataProducer,
    uptime::{UptimeCollector, UptimeInfo},
};
use crate::config::agent::AgentConfig;

/// The fixed set of host probes run every cycle, one per snapshot category.
///
/// Fields are public so tests and embedders can swap a single probe without
/// touching the others.
#[derive(Clone)]
pub struct ProbeSet {
    pub cpu: Arc<dyn DataProducer<Output = CpuUsage>>,
    pub network: Arc<dyn DataProducer<Output = Vec<InterfaceTraffic>>>,
    pub disk: Arc<dyn DataProducer<Output = Vec<VolumeUsage>>>,
    pub disk_io: Arc<dyn DataProducer<Output = Vec<DiskIo>>>,
    pub memory: Arc<dyn DataProducer<Output = MemoryUsage>>,
    pub uptime: Arc<dyn DataProducer<Output = UptimeInfo>>,
    pub loadavg: Arc<dyn DataProducer<Output = LoadAverage>>,
    pub host: Arc<dyn DataProducer<Output = HostInfo>>,
    pub processes: Arc<dyn DataProducer<Output = Vec<ProcessInfo>>>,
}

impl ProbeSet {
    /// Builds the Linux procfs probes described by the agent settings.
    pub fn from_config(config: &AgentConfig) -> Self {
        let procfs = ProcFs::new(&config.proc_root);

        Self {
            cpu: Arc::new(CpuCollector::new(procfs.clone(), config.cpu_sample())),
            network: Arc::new(NetworkCollector::new(procfs.clone())),
            disk: Arc::new(FilesystemCollector::new(procfs.clone(), &config.sys_root)),
            disk_io: Arc::new(DiskCollector::new(procfs.clone())),
            memory: Arc::new(MemoryCollector::new(procfs.clone())),
            uptime: Arc::new(UptimeCollector::new(procfs.clone())),
            loadavg: Arc::new(LoadAverageCollector::new(procfs.clone())),
            host: Arc::new(HostCollector::new(
                procfs.clone(),
                &config.machine_id_path,
                &config.os_release_path,
                config.server_key.clone(),
            )),
            processes: Arc::new(ProcessCollector::new(procfs)),
        }
    }
}

impl Default for ProbeSet {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

impl std::fmt::Debug for ProbeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeSet").finish_non_exhaustive()
    }
}
