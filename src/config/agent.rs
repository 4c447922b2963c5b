//! Agent-level settings: collection cadence, plugin deadlines and the
//! locations the host probes read from.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Interval (in seconds) between two collection cycles.
    #[validate(range(min = 1, message = "Collection interval must be at least 1 second"))]
    pub collection_interval: u64,

    /// Optional per-plugin deadline in seconds. Unset means plugins may run
    /// for as long as they need and the cycle waits for them.
    #[validate(range(min = 1, message = "Plugin timeout must be at least 1 second"))]
    pub plugin_timeout: Option<u64>,

    /// Delay (in milliseconds) between the two `/proc/stat` samples used to
    /// compute CPU utilisation. Zero reports usage since boot.
    pub cpu_sample_ms: u64,

    /// Root of the procfs mount read by the probes.
    pub proc_root: PathBuf,

    /// Root of the sysfs mount, used to spot removable block devices.
    pub sys_root: PathBuf,

    /// File holding the persistent machine identifier.
    pub machine_id_path: PathBuf,

    /// os-release file used to report the distribution.
    pub os_release_path: PathBuf,

    /// Key identifying this server to the remote collector.
    pub server_key: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            collection_interval: 60,
            plugin_timeout: None,
            cpu_sample_ms: 1000,
            proc_root: PathBuf::from("/proc"),
            sys_root: PathBuf::from("/sys"),
            machine_id_path: PathBuf::from("/var/lib/hivemon/machine-id"),
            os_release_path: PathBuf::from("/etc/os-release"),
            server_key: String::new(),
        }
    }
}

impl AgentConfig {
    pub fn collection_interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval)
    }

    pub fn plugin_timeout(&self) -> Option<Duration> {
        self.plugin_timeout.map(Duration::from_secs)
    }

    pub fn cpu_sample(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_ms)
    }
}
