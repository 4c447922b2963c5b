use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    process,
    sync::Arc,
};

use clap::Parser;
use hivemon::{
    config::Config,
    core::{
        collectors::{
            host::get_or_create_machine_id,
            registry::{configure_plugins, PluginRegistry},
        },
        executor::{Executor, LogPublisher},
        orchestrator::Orchestrator,
    },
    logger::LoggerManager,
    print_error, print_info, print_warn,
};
use tracing::{debug, error, info};

/// Host metrics agent.
#[derive(Parser, Debug)]
#[command(name = "hivemon", version, about = "Host metrics agent")]
struct Args {
    /// Configuration file. Falls back to $HIVEMON_CONFIG, then
    /// /etc/hivemon/config.toml.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Collect once, print the snapshot as JSON and exit.
    #[arg(long)]
    test: bool,

    /// Run a single plugin once, print its result and exit.
    #[arg(long, value_name = "NAME")]
    test_plugin: Option<String>,

    /// List registered plugins and whether they are enabled.
    #[arg(long)]
    list_plugins: bool,

    /// Print the sample configuration of a plugin.
    #[arg(long, value_name = "NAME")]
    plugin_config: Option<String>,

    /// Print the machine id and exit.
    #[arg(long)]
    machine_id: bool,

    /// Write the process id to this file before starting.
    #[arg(long, value_name = "PATH")]
    pidfile: Option<PathBuf>,
}

/// Renders the enabled/available plugin matrix.
fn plugins_table(enabled: Vec<&str>, available: Vec<String>) -> Vec<String> {
    let enabled_set: BTreeSet<&str> = enabled.into_iter().collect();
    let available_set: BTreeSet<&str> = available.iter().map(String::as_str).collect();

    let all_names: BTreeSet<&str> = enabled_set
        .iter()
        .copied()
        .chain(available_set.iter().copied())
        .collect();

    let name_width = all_names
        .iter()
        .map(|s| s.len())
        .max()
        .unwrap_or(10)
        .max("Plugin".len());

    let mut lines = vec![
        format!("{:<width$} | Status", "Plugin", width = name_width),
        format!("{}-+-{}", "-".repeat(name_width), "-".repeat(17)),
    ];

    for name in all_names {
        let status = match (enabled_set.contains(name), available_set.contains(name)) {
            (true, true) => "ENABLED",
            (true, false) => "ENABLED (missing)",
            (false, true) => "DISABLED",
            (false, false) => "UNKNOWN",
        };
        lines.push(format!("{:<width$} | {}", name, status, width = name_width));
    }
    lines
}

/// Lists registered plugins. The configuration only contributes the enabled
/// markers; when it can't be loaded every plugin is shown as disabled.
fn list_plugins(registry: &PluginRegistry, config: Option<&Path>) -> Vec<String> {
    let cfg = match Config::new(config) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            print_warn!("{}", e);
            None
        }
    };
    let enabled = cfg
        .as_ref()
        .map(|cfg| cfg.plugins.enabled_names())
        .unwrap_or_default();
    plugins_table(enabled, registry.list_names())
}

fn print_plugin_config(registry: &PluginRegistry, name: &str) {
    match registry.instantiate(name) {
        Ok(plugin) => {
            println!("# {}", plugin.description());
            print!("{}", plugin.sample_config());
        }
        Err(_) => {
            println!("Unknown plugin '{}'. Available plugins:", name);
            for available in registry.list_names() {
                println!("  {}", available);
            }
        }
    }
}

async fn test_plugin(
    registry: &PluginRegistry,
    cfg: &Config,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut plugin = registry.instantiate(name)?;
    if let Some(entry) = cfg.plugins.find(name) {
        plugin.configure(&entry.config)?;
    }

    plugin.start().await?;
    let value = plugin.collect_value().await;
    plugin.stop().await;

    println!("{}", serde_json::to_string_pretty(&value?)?);
    Ok(())
}

fn write_pidfile(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{}\n", process::id()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let registry = PluginRegistry::from_inventory();

    if let Some(name) = &args.plugin_config {
        print_plugin_config(&registry, name);
        return Ok(());
    }

    if args.list_plugins {
        for line in list_plugins(&registry, args.config.as_deref()) {
            println!("{}", line);
        }
        return Ok(());
    }

    let cfg = Config::new(args.config.as_deref()).unwrap_or_else(|e| {
        print_error!("{}", e);
        process::exit(1);
    });

    if args.machine_id {
        let id = get_or_create_machine_id(&cfg.agent.machine_id_path)
            .await
            .unwrap_or_else(|e| {
                print_error!("{}", e);
                process::exit(1);
            });
        println!("{}", id);
        return Ok(());
    }

    let logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });
    info!("Starting hivemon version {}...", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", cfg.logger.level);
    debug!("{:#?}", cfg.agent);

    if let Some(name) = &args.test_plugin {
        if let Err(e) = test_plugin(&registry, &cfg, name).await {
            print_error!("Plugin '{}' failed: {}", name, e);
            process::exit(1);
        }
        return Ok(());
    }

    let plugins = configure_plugins(&registry, &cfg.plugins).unwrap_or_else(|e| {
        print_error!("{}", e);
        process::exit(1);
    });
    let orchestrator = Orchestrator::from_config(&cfg.agent);

    if args.test {
        let snapshot = orchestrator.collect_all(&plugins).await?;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    if let Some(path) = &args.pidfile {
        write_pidfile(path).unwrap_or_else(|e| {
            print_error!("Can't write pidfile {}: {}", path.display(), e);
            process::exit(1);
        });
        print_info!("PID {} written to {}", process::id(), path.display());
    }

    for line in plugins_table(cfg.plugins.enabled_names(), registry.list_names()) {
        info!("{}", line);
    }

    let executor = Executor::new(
        orchestrator,
        plugins,
        cfg.agent.collection_interval(),
        Arc::new(LogPublisher),
    );
    executor.start_plugins().await;

    info!("Starting metrics collection executor...");

    tokio::select! {
        _ = executor.run() => {
            error!("Executor unexpectedly finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
    }

    executor.stop_plugins().await;
    if let Some(path) = &args.pidfile {
        let _ = std::fs::remove_file(path);
    }
    info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_marks_enabled_and_missing_plugins() {
        let lines = plugins_table(
            vec!["checks", "mysql"],
            vec!["checks".to_string(), "telegraf".to_string()],
        );
        assert_eq!(lines.len(), 5);
        assert!(lines[2].starts_with("checks") && lines[2].ends_with("| ENABLED"));
        assert!(lines[3].ends_with("| ENABLED (missing)"));
        assert!(lines[4].starts_with("telegraf") && lines[4].ends_with("| DISABLED"));
    }

    #[test]
    fn listing_works_without_a_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PluginRegistry::from_inventory();

        let lines = list_plugins(&registry, Some(&dir.path().join("missing.toml")));
        assert!(lines.iter().any(|l| l.starts_with("checks") && l.ends_with("| DISABLED")));
        assert!(lines.iter().any(|l| l.starts_with("telegraf")));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[agent\ncollection_interval = ").unwrap();
        assert_eq!(list_plugins(&registry, Some(&broken)).len(), lines.len());
    }

    #[test]
    fn listing_marks_configured_plugins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[[plugins.enabled]]\nname = \"checks\"\n").unwrap();

        let lines = list_plugins(&PluginRegistry::from_inventory(), Some(&path));
        assert!(lines.iter().any(|l| l.starts_with("checks") && l.ends_with("| ENABLED")));
    }
}
