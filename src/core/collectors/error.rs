use std::time::Duration;

use thiserror::Error;

/// Error type shared by probes, plugins and the collection orchestrator.
/// Uses `thiserror` for `Display`/`Error` derivation with context-rich messages.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Failed to read a file from disk.
    /// Includes the file path and the underlying I/O error for debugging.
    #[error("Failed to read file {path}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or write a file the agent persists state in.
    #[error("Failed to write file {path}")]
    FileWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Encountered a parsing error while extracting a metric.
    #[error("Failed to parse {metric} from {location}: {reason}")]
    ParseError {
        metric: String,
        location: String,
        reason: String,
    },

    /// A required field was not present in the probed data.
    #[error("Missing required field: {field} in {location}")]
    MissingField { field: String, location: String },

    /// Data was found but did not conform to the expected format.
    #[error("Invalid format in {location}: {reason}")]
    InvalidFormat { location: String, reason: String },

    /// A low-level system call failed.
    #[error("System call failed: {syscall} - {reason}")]
    SystemCall { syscall: String, reason: String },

    /// Tried to look up a plugin by name, but nothing registered it.
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    /// A plugin rejected the settings it was configured with.
    #[error("Invalid configuration for plugin '{plugin}': {reason}")]
    InvalidPluginConfig { plugin: String, reason: String },

    /// The plugin list handed to the orchestrator is unusable.
    /// Raised before any collection task is dispatched.
    #[error("Invalid collection request: {0}")]
    InvalidRequest(String),

    /// An external command could not be started or waited on.
    #[error("Command '{command}' failed: {source}")]
    CommandExecution {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A plugin did not finish within its deadline and was abandoned.
    #[error("Plugin '{plugin}' timed out after {after:?}")]
    Timeout { plugin: String, after: Duration },

    /// Plugin output could not be converted into a snapshot value.
    #[error("Failed to serialize output of '{name}': {source}")]
    Serialization {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// A catch-all for miscellaneous errors that don't fit other variants.
    #[error("Other error: {0}")]
    Other(String),
}
