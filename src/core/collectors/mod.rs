//! Host probes plus the plugin registry and the traits both are built on.

/// Load averages and core count.
pub mod avg;
/// CPU utilisation from /proc/stat.
pub mod cpu;
/// Block device I/O counters.
pub mod disk;
pub mod error;
/// Mounted volume capacity.
pub mod filesys;
/// Hostname, machine id, distro and addresses.
pub mod host;
/// Per-interface traffic counters.
pub mod network;
pub mod probes;
/// Running processes.
pub mod processes;
pub mod procfs;
/// Memory and swap usage.
pub mod ram;
pub mod registry;
pub mod traits;
pub mod types;
/// Uptime and boot time.
pub mod uptime;
