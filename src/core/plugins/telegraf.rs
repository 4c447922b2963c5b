use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{
    core::{
        assembler::{group_gauges, GaugeGroup},
        collectors::{error::CollectorError, traits::Plugin, types::CollectorResult},
        parser::parse_output,
    },
    register_plugin,
};

const SAMPLE_CONFIG: &str = r#"# Runs `telegraf -test` every cycle and reports its measurements.
[[plugins.enabled]]
name = "telegraf"
[plugins.enabled.config]
config = "/etc/telegraf/telegraf.conf"
binary = "/usr/bin/telegraf"
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelegrafConfig {
    /// Telegraf configuration passed to `-config`.
    pub config: PathBuf,
    /// Telegraf executable.
    pub binary: PathBuf,
}

impl Default for TelegrafConfig {
    fn default() -> Self {
        Self {
            config: PathBuf::from("/etc/telegraf/telegraf.conf"),
            binary: PathBuf::from("/usr/bin/telegraf"),
        }
    }
}

/// Scrapes the line-protocol dump printed by `telegraf -test`.
#[derive(Debug, Clone, Default)]
pub struct TelegrafPlugin {
    config: TelegrafConfig,
}

impl TelegrafPlugin {
    pub fn new(config: TelegrafConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TelegrafConfig {
        &self.config
    }

    fn command_line(&self) -> String {
        format!(
            "{} -test -config {}",
            self.config.binary.display(),
            self.config.config.display()
        )
    }
}

#[async_trait::async_trait]
impl Plugin for TelegrafPlugin {
    type Output = BTreeMap<String, GaugeGroup>;

    fn description(&self) -> &'static str {
        "Collects data from Telegraf"
    }

    fn sample_config(&self) -> &'static str {
        SAMPLE_CONFIG
    }

    fn configure(&mut self, settings: &toml::Table) -> CollectorResult<()> {
        self.config = toml::Value::Table(settings.clone())
            .try_into()
            .map_err(|e: toml::de::Error| CollectorError::InvalidPluginConfig {
                plugin: "telegraf".to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn collect(&self) -> CollectorResult<Self::Output> {
        let output = Command::new(&self.config.binary)
            .arg("-test")
            .arg("-config")
            .arg(&self.config.config)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CollectorError::CommandExecution {
                command: self.command_line(),
                source,
            })?;

        // A partial dump is still worth reporting.
        if !output.status.success() {
            warn!("'{}' exited with {}", self.command_line(), output.status);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let grouped = group_gauges(parse_output(&stdout));
        debug!("Telegraf reported {} measurements", grouped.len());
        Ok(grouped)
    }
}

register_plugin!(TelegrafPlugin, "telegraf");
