use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{
    error::CollectorError,
    procfs::{parse_counter, ProcFs},
    traits::DataProducer,
    types::CollectorResult,
};

/// One running process as seen in /proc/<pid>/status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// Single-letter scheduler state (R, S, D, Z, ...).
    pub state: String,
    pub threads: u64,
    /// Resident set size in kilobytes. Kernel threads report zero.
    pub memory_kb: u64,
}

/// Parses the `Name`, `State`, `Threads` and `VmRSS` lines of a status file.
pub fn parse_status(pid: u32, content: &str) -> CollectorResult<ProcessInfo> {
    let location = format!("/proc/{}/status", pid);
    let mut info = ProcessInfo {
        pid,
        ..Default::default()
    };

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key {
            "Name" => info.name = value.to_string(),
            "State" => {
                info.state = value
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string()
            }
            "Threads" => info.threads = parse_counter(value, "threads", &location)?,
            "VmRSS" => {
                let kb = value.split_whitespace().next().unwrap_or_default();
                info.memory_kb = parse_counter(kb, "memory_kb", &location)?;
            }
            _ => {}
        }
    }

    if info.name.is_empty() {
        return Err(CollectorError::MissingField {
            field: "Name".to_string(),
            location,
        });
    }

    Ok(info)
}

/// Lists every numeric directory under the procfs root.
#[derive(Debug, Clone, Default)]
pub struct ProcessCollector {
    procfs: ProcFs,
}

impl ProcessCollector {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }

    async fn pids(&self) -> CollectorResult<Vec<u32>> {
        let root = self.procfs.root();
        let mut entries =
            tokio::fs::read_dir(root)
                .await
                .map_err(|source| CollectorError::FileRead {
                    path: root.display().to_string(),
                    source,
                })?;

        let mut pids = Vec::with_capacity(256);
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| CollectorError::FileRead {
                path: root.display().to_string(),
                source,
            })?
        {
            if let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse().ok()) {
                pids.push(pid);
            }
        }
        pids.sort_unstable();
        Ok(pids)
    }
}

#[async_trait::async_trait]
impl DataProducer for ProcessCollector {
    type Output = Vec<ProcessInfo>;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        let pids = self.pids().await?;
        let mut processes = Vec::with_capacity(pids.len());

        for pid in pids {
            // Processes can exit between the directory scan and the read.
            let content = match self.procfs.read(&format!("{}/status", pid)).await {
                Ok(content) => content,
                Err(e) => {
                    trace!("Skipping pid {}: {}", pid, e);
                    continue;
                }
            };
            match parse_status(pid, &content) {
                Ok(info) => processes.push(info),
                Err(e) => trace!("Skipping pid {}: {}", pid, e),
            }
        }

        Ok(processes)
    }
}
