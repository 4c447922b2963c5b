use serde::{Deserialize, Serialize};

use super::{
    error::CollectorError,
    procfs::{parse_counter, ProcFs},
    traits::DataProducer,
    types::CollectorResult,
};

const SECTOR_SIZE: u64 = 512;

/// Cumulative I/O counters for one block device, reported as `system.disk_io`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskIo {
    pub name: String,
    pub reads: u64,
    pub writes: u64,
    #[serde(rename = "bytes.read")]
    pub read_bytes: u64,
    #[serde(rename = "bytes.write")]
    pub write_bytes: u64,
    /// Milliseconds spent reading.
    pub read_time: u64,
    /// Milliseconds spent writing.
    pub write_time: u64,
}

fn is_virtual_device(name: &str) -> bool {
    name.starts_with("loop") || name.starts_with("ram") || name.starts_with("zram")
}

/// Parses /proc/diskstats.
///
/// Each line: `major minor name reads merged sectors_read read_ms writes merged sectors_written write_ms ...`.
/// Loop and RAM devices are skipped.
pub fn parse_diskstats(content: &str) -> CollectorResult<Vec<DiskIo>> {
    let mut devices = Vec::with_capacity(8);

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }
        if parts.len() < 11 {
            return Err(CollectorError::InvalidFormat {
                location: "/proc/diskstats".to_string(),
                reason: format!("expected at least 11 fields, got {}", parts.len()),
            });
        }

        let name = parts[2];
        if is_virtual_device(name) {
            continue;
        }

        let location = format!("/proc/diskstats device={}", name);
        let reads = parse_counter(parts[3], "reads", &location)?;
        let sectors_read = parse_counter(parts[5], "sectors_read", &location)?;
        let read_time = parse_counter(parts[6], "read_time", &location)?;
        let writes = parse_counter(parts[7], "writes", &location)?;
        let sectors_written = parse_counter(parts[9], "sectors_written", &location)?;
        let write_time = parse_counter(parts[10], "write_time", &location)?;

        devices.push(DiskIo {
            name: name.to_string(),
            reads,
            writes,
            read_bytes: sectors_read.saturating_mul(SECTOR_SIZE),
            write_bytes: sectors_written.saturating_mul(SECTOR_SIZE),
            read_time,
            write_time,
        });
    }

    Ok(devices)
}

#[derive(Debug, Clone, Default)]
pub struct DiskCollector {
    procfs: ProcFs,
}

impl DiskCollector {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }
}

#[async_trait::async_trait]
impl DataProducer for DiskCollector {
    type Output = Vec<DiskIo>;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        parse_diskstats(&self.procfs.read("diskstats").await?)
    }
}
