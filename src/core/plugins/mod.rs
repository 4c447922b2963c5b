//! Built-in plugins. Each one registers itself with `register_plugin!`
//! and is picked up by `PluginRegistry::from_inventory`.

pub mod checks;
pub mod telegraf;
