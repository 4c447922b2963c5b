//! Snapshot types and the functions that build them from per-task results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    collectors::{
        avg::LoadAverage, cpu::CpuUsage, disk::DiskIo, filesys::VolumeUsage,
        host::HostInfo, network::InterfaceTraffic, processes::ProcessInfo, ram::MemoryUsage, uptime::UptimeInfo,
    },
    parser::Metric,
};

/// Plugin name whose result goes to [`Snapshot::checks`] instead of
/// [`Snapshot::plugins`].
pub const CHECKS_CATEGORY: &str = "checks";

/// Host-wide system measurements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemData {
    pub cpu: CpuUsage,
    pub network: Vec<InterfaceTraffic>,
    /// Capacity of each mounted volume.
    pub disk: Vec<VolumeUsage>,
    /// Cumulative block device I/O counters.
    pub disk_io: Vec<DiskIo>,
    pub loadavg: LoadAverage,
    pub uptime: UptimeInfo,
    pub memory: MemoryUsage,
}

/// Everything gathered in one collection cycle.
///
/// All fields are always present; a failed probe leaves its default value
/// and a failed plugin leaves `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub system: SystemData,
    pub processes: Vec<ProcessInfo>,
    pub host: HostInfo,
    pub plugins: BTreeMap<String, Value>,
    pub checks: Value,
}

/// Outcome of one plugin task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub category: String,
    pub value: Value,
    pub error: Option<String>,
}

impl TaskResult {
    pub fn success(category: impl Into<String>, value: Value) -> Self {
        Self {
            category: category.into(),
            value,
            error: None,
        }
    }

    /// A degraded result: the slot is kept but holds `null`.
    pub fn failure(category: impl Into<String>, error: impl ToString) -> Self {
        Self {
            category: category.into(),
            value: Value::Null,
            error: Some(error.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Gauges of one plugin, keyed by gauge name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaugeGroup {
    pub gauges: BTreeMap<String, String>,
}

/// Groups metrics into `plugin → {"gauges": {gauge → value}}`.
///
/// Metrics with an empty gauge are dropped. A gauge seen twice keeps the
/// last value.
pub fn group_gauges(metrics: impl IntoIterator<Item = Metric>) -> BTreeMap<String, GaugeGroup> {
    let mut grouped: BTreeMap<String, GaugeGroup> = BTreeMap::new();
    for metric in metrics {
        if metric.gauge.is_empty() {
            continue;
        }
        grouped
            .entry(metric.plugin)
            .or_default()
            .gauges
            .insert(metric.gauge, metric.value);
    }
    grouped
}

/// Builds the final snapshot. Each plugin result lands under its own name,
/// except [`CHECKS_CATEGORY`], which fills the `checks` slot.
pub fn assemble(
    system: SystemData,
    processes: Vec<ProcessInfo>,
    host: HostInfo,
    results: Vec<TaskResult>,
) -> Snapshot {
    let mut plugins = BTreeMap::new();
    let mut checks = Value::Null;

    for result in results {
        if result.category == CHECKS_CATEGORY {
            checks = result.value;
        } else {
            plugins.insert(result.category, result.value);
        }
    }

    Snapshot {
        system,
        processes,
        host,
        plugins,
        checks,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn metric(plugin: &str, gauge: &str, value: &str) -> Metric {
        Metric {
            plugin: plugin.to_string(),
            gauge: gauge.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn groups_by_plugin_and_deduplicates() {
        let grouped = group_gauges(vec![
            metric("telegraf.ping", "pingurl:x.average.response.ms", "2.5"),
            metric("telegraf.cpu", "cpucpu:cpu0.usage.user", "1"),
            metric("telegraf.ping", "pingurl:x.packets.received", "1"),
            metric("telegraf.ping", "pingurl:x.average.response.ms", "3.1"),
            metric("telegraf.ping", "", "9"),
        ]);

        assert_eq!(grouped.len(), 2);
        let ping = &grouped["telegraf.ping"].gauges;
        assert_eq!(ping.len(), 2);
        assert_eq!(ping["pingurl:x.average.response.ms"], "3.1");

        let json = serde_json::to_value(&grouped).unwrap();
        assert_eq!(
            json["telegraf.cpu"],
            json!({"gauges": {"cpucpu:cpu0.usage.user": "1"}})
        );
    }

    #[test]
    fn empty_input_yields_empty_map() {
        assert!(group_gauges(Vec::new()).is_empty());
    }

    #[test]
    fn checks_are_routed_to_their_own_slot() {
        let snapshot = assemble(
            SystemData::default(),
            Vec::new(),
            HostInfo::default(),
            vec![
                TaskResult::success("mysql", json!({"gauges": {}})),
                TaskResult::success(CHECKS_CATEGORY, json!([{"command": "true"}])),
                TaskResult::failure("redis", "connection refused"),
            ],
        );

        assert_eq!(snapshot.plugins.len(), 2);
        assert!(!snapshot.plugins.contains_key(CHECKS_CATEGORY));
        assert_eq!(snapshot.plugins["redis"], Value::Null);
        assert_eq!(snapshot.checks, json!([{"command": "true"}]));
    }

    #[test]
    fn serializes_every_field_in_schema_order() {
        let snapshot = Snapshot::default();
        let json = serde_json::to_string(&snapshot).unwrap();

        let positions: Vec<usize> = ["\"system\"", "\"processes\"", "\"host\"", "\"plugins\"", "\"checks\""]
            .iter()
            .map(|key| json.find(key).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        let value: Value = serde_json::from_str(&json).unwrap();
        for key in [
            "cpu", "network", "disk", "disk_io", "loadavg", "uptime", "memory",
        ] {
            assert!(value["system"].get(key).is_some(), "missing system.{}", key);
        }
        assert_eq!(value["checks"], Value::Null);
    }
}
