use std::sync::Arc;

use async_trait::async_trait;
use hivemon::core::{
    assembler::CHECKS_CATEGORY,
    collectors::{
        avg::LoadAverage,
        cpu::CpuUsage,
        error::CollectorError,
        host::HostInfo,
        probes::ProbeSet,
        ram::MemoryUsage,
        registry::{configure_plugins, ConfiguredPlugin, PluginRegistry, PluginWrapper},
        traits::{DataProducer, Plugin},
        types::CollectorResult,
        uptime::UptimeInfo,
    },
    orchestrator::Orchestrator,
    parser::parse_line,
};
use serde_json::{json, Value};

struct Fixed<T>(T);

#[async_trait]
impl<T: Clone + Send + Sync + 'static> DataProducer for Fixed<T> {
    type Output = T;

    async fn produce(&self) -> CollectorResult<T> {
        Ok(self.0.clone())
    }
}

struct Broken;

#[async_trait]
impl DataProducer for Broken {
    type Output = MemoryUsage;

    async fn produce(&self) -> CollectorResult<MemoryUsage> {
        Err(CollectorError::MissingField {
            field: "MemTotal".to_string(),
            location: "/proc/meminfo".to_string(),
        })
    }
}

fn probes() -> ProbeSet {
    ProbeSet {
        cpu: Arc::new(Fixed(CpuUsage {
            idle: 90.0,
            ..Default::default()
        })),
        network: Arc::new(Fixed(Vec::new())),
        disk: Arc::new(Fixed(Vec::new())),
        disk_io: Arc::new(Fixed(Vec::new())),
        memory: Arc::new(Fixed(MemoryUsage {
            total: 4096,
            ..Default::default()
        })),
        uptime: Arc::new(Fixed(UptimeInfo {
            uptime_seconds: 3600.0,
            ..Default::default()
        })),
        loadavg: Arc::new(Fixed(LoadAverage {
            cores: 4,
            ..Default::default()
        })),
        host: Arc::new(Fixed(HostInfo {
            host: "db-02".to_string(),
            ..Default::default()
        })),
        processes: Arc::new(Fixed(Vec::new())),
    }
}

/// Succeeds for even ids, fails for odd ones.
struct NumberedPlugin {
    id: usize,
}

#[async_trait]
impl Plugin for NumberedPlugin {
    type Output = usize;

    fn description(&self) -> &'static str {
        "Numbered test plugin"
    }

    fn sample_config(&self) -> &'static str {
        ""
    }

    async fn collect(&self) -> CollectorResult<usize> {
        tokio::task::yield_now().await;
        if self.id % 2 == 0 {
            Ok(self.id)
        } else {
            Err(CollectorError::Other(format!("plugin {} failed", self.id)))
        }
    }
}

fn numbered(id: usize) -> ConfiguredPlugin {
    let name = format!("plugin-{:03}", id);
    ConfiguredPlugin::new(
        name.clone(),
        Arc::new(PluginWrapper::new(name, NumberedPlugin { id })),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hundred_plugins_half_failing() {
    let plugins: Vec<ConfiguredPlugin> = (0..100).map(numbered).collect();

    let snapshot = Orchestrator::new(probes())
        .collect_all(&plugins)
        .await
        .unwrap();

    assert_eq!(snapshot.plugins.len(), 100);
    for id in 0..100 {
        let value = &snapshot.plugins[&format!("plugin-{:03}", id)];
        if id % 2 == 0 {
            assert_eq!(value, &json!(id));
        } else {
            assert_eq!(value, &Value::Null);
        }
    }
}

#[tokio::test]
async fn zero_plugins_yields_empty_plugin_map() {
    let snapshot = Orchestrator::new(probes()).collect_all(&[]).await.unwrap();

    assert!(snapshot.plugins.is_empty());
    assert_eq!(snapshot.checks, Value::Null);
    assert_eq!(snapshot.host.host, "db-02");
}

#[tokio::test]
async fn failing_probe_keeps_every_other_field() {
    let mut probes = probes();
    probes.memory = Arc::new(Broken);

    let snapshot = Orchestrator::new(probes).collect_all(&[]).await.unwrap();
    let json = serde_json::to_value(&snapshot).unwrap();

    assert_eq!(snapshot.system.memory, MemoryUsage::default());
    assert_eq!(snapshot.system.cpu.idle, 90.0);
    assert_eq!(snapshot.system.loadavg.cores, 4);
    for key in [
        "cpu", "network", "disk", "disk_io", "loadavg", "uptime", "memory",
    ] {
        assert!(json["system"].get(key).is_some(), "system.{} missing", key);
    }
    for key in ["processes", "host", "plugins", "checks"] {
        assert!(json.get(key).is_some(), "{} missing", key);
    }
}

#[tokio::test]
async fn plugin_map_matches_request_minus_checks() {
    let mut plugins: Vec<ConfiguredPlugin> = (0..4).map(numbered).collect();
    plugins.push(ConfiguredPlugin::new(
        CHECKS_CATEGORY,
        Arc::new(PluginWrapper::new(CHECKS_CATEGORY, NumberedPlugin { id: 8 })),
    ));

    let snapshot = Orchestrator::new(probes())
        .collect_all(&plugins)
        .await
        .unwrap();

    let names: Vec<&str> = snapshot.plugins.keys().map(String::as_str).collect();
    assert_eq!(
        names,
        vec!["plugin-000", "plugin-001", "plugin-002", "plugin-003"]
    );
    assert_eq!(snapshot.checks, json!(8));
}

#[test]
fn builtin_plugins_are_registered() {
    let registry = PluginRegistry::from_inventory();
    assert!(registry.contains("telegraf"));
    assert!(registry.contains("checks"));

    let names = registry.list_names();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[cfg(unix)]
#[tokio::test]
async fn configured_checks_plugin_runs_through_orchestrator() {
    let registry = PluginRegistry::from_inventory();
    let config: hivemon::config::Config = hivemon::config::Config::from_toml(
        r#"
        [[plugins.enabled]]
        name = "checks"
        [plugins.enabled.config]
        commands = ["echo ok", "exit 3"]
        "#,
    )
    .unwrap();

    let plugins = configure_plugins(&registry, &config.plugins).unwrap();
    let snapshot = Orchestrator::new(probes())
        .collect_all(&plugins)
        .await
        .unwrap();

    assert!(snapshot.plugins.is_empty());
    assert_eq!(snapshot.checks[0]["output"], "ok");
    assert_eq!(snapshot.checks[0]["exit_code"], 0);
    assert_eq!(snapshot.checks[1]["exit_code"], 3);
}

#[test]
fn ping_line_from_docs() {
    let metrics = parse_line(
        "> ping,url=www.google.com average_response_ms=2.596,packets_received=1i 1454321712994367057",
    );
    assert_eq!(metrics.len(), 2);
    assert!(metrics[0].gauge.ends_with(".average.response.ms"));
    assert_eq!(metrics[0].value, "2.596");
    assert_eq!(metrics[1].value, "1");
}
