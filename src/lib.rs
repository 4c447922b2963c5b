//! hivemon — host metrics agent
//!
//! Every cycle the agent runs a fixed set of Linux probes and a configurable
//! set of plugins concurrently, then folds their results into one JSON
//! snapshot. A failing probe or plugin only degrades its own slot.
//!
//! ## Modules
//!
//! * `config` — TOML configuration: logger, agent cadence and probe paths,
//!   enabled plugins. Validated with the `validator` crate.
//!
//! * `core` — the agent itself:
//!   - `collectors` — procfs probes, the plugin registry and the
//!     `DataProducer` / `Plugin` traits
//!   - `parser` — line-protocol parser used by the telegraf plugin
//!   - `orchestrator` — one fan-out / fan-in collection cycle
//!   - `assembler` — snapshot types and gauge grouping
//!   - `executor` — the periodic loop and the publisher seam
//!   - `plugins` — built-in `telegraf` and `checks` plugins
//!
//! * `logger` — `tracing` subscriber setup with console and optional
//!   journald output.
//!
//! ## Features
//!
//! * `journald` — systemd journald logging layer (default: enabled).

pub mod config;
pub mod core;
pub mod logger;
