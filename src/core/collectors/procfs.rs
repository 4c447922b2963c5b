use std::path::{Path, PathBuf};

use super::{error::CollectorError, types::CollectorResult};

/// Handle on a procfs mount.
///
/// Probes resolve every path through this so the root can point at a
/// container's `/host/proc` or at a fixture directory in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Reads a file below the root into a string.
    pub async fn read(&self, relative: &str) -> CollectorResult<String> {
        read_file(&self.path(relative)).await
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

/// Reads an arbitrary file, mapping failures onto `CollectorError::FileRead`.
pub async fn read_file(path: &Path) -> CollectorResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CollectorError::FileRead {
            path: path.display().to_string(),
            source,
        })
}

/// Parses one whitespace-separated counter, naming the metric on failure.
pub(crate) fn parse_counter(raw: &str, metric: &str, location: &str) -> CollectorResult<u64> {
    raw.parse::<u64>().map_err(|_| CollectorError::ParseError {
        metric: metric.to_string(),
        location: location.to_string(),
        reason: format!("invalid value: {}", raw),
    })
}
