use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::{
    core::collectors::{error::CollectorError, traits::Plugin, types::CollectorResult},
    register_plugin,
};

const SAMPLE_CONFIG: &str = r#"# Runs each command through `sh -c` and reports its output and exit code.
[[plugins.enabled]]
name = "checks"
[plugins.enabled.config]
commands = [
    "check-disk-usage.rb -w 80 -c 90",
    "check-http.rb -u https://example.com",
]
"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChecksConfig {
    pub commands: Vec<String>,
}

/// Result of a single check command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub command: String,
    /// Combined stdout and stderr, trimmed.
    pub output: String,
    /// Process exit code; `-1` when the command could not run or was killed
    /// by a signal.
    pub exit_code: i32,
}

/// Runs user-defined health check commands concurrently.
#[derive(Debug, Clone, Default)]
pub struct ChecksPlugin {
    config: ChecksConfig,
}

impl ChecksPlugin {
    pub fn new(config: ChecksConfig) -> Self {
        Self { config }
    }

    pub fn commands(&self) -> &[String] {
        &self.config.commands
    }
}

async fn run_check(command: &str) -> CheckResult {
    let result = Command::new("sh")
        .arg("-c")
        .arg(command)
        .kill_on_drop(true)
        .output()
        .await;

    match result {
        Ok(output) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            CheckResult {
                command: command.to_string(),
                output: combined.trim().to_string(),
                exit_code: output.status.code().unwrap_or(-1),
            }
        }
        Err(e) => CheckResult {
            command: command.to_string(),
            output: e.to_string(),
            exit_code: -1,
        },
    }
}

#[async_trait::async_trait]
impl Plugin for ChecksPlugin {
    type Output = Vec<CheckResult>;

    fn description(&self) -> &'static str {
        "Runs health check commands and reports their exit codes"
    }

    fn sample_config(&self) -> &'static str {
        SAMPLE_CONFIG
    }

    fn configure(&mut self, settings: &toml::Table) -> CollectorResult<()> {
        let config: ChecksConfig = toml::Value::Table(settings.clone())
            .try_into()
            .map_err(|e: toml::de::Error| CollectorError::InvalidPluginConfig {
                plugin: "checks".to_string(),
                reason: e.to_string(),
            })?;

        if config.commands.iter().any(|c| c.trim().is_empty()) {
            return Err(CollectorError::InvalidPluginConfig {
                plugin: "checks".to_string(),
                reason: "commands must not be empty".to_string(),
            });
        }

        self.config = config;
        Ok(())
    }

    async fn collect(&self) -> CollectorResult<Self::Output> {
        let results = join_all(self.config.commands.iter().map(|c| run_check(c))).await;
        debug!("Ran {} checks", results.len());
        Ok(results)
    }
}

register_plugin!(ChecksPlugin, "checks");
