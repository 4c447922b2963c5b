use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{error::CollectorError, procfs::ProcFs, traits::DataProducer, types::CollectorResult};

/// Physical memory and swap usage. Sizes are in megabytes, shares in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    #[serde(rename = "total_mb")]
    pub total: u64,
    #[serde(rename = "free_mb")]
    pub free: u64,
    #[serde(rename = "available_mb")]
    pub available: u64,
    #[serde(rename = "buffers_mb")]
    pub buffers: u64,
    #[serde(rename = "cached_mb")]
    pub cached: u64,
    #[serde(rename = "used_mb")]
    pub used: u64,
    pub used_percent: f64,
    #[serde(rename = "swap_total_mb")]
    pub swap_total: u64,
    #[serde(rename = "swap_free_mb")]
    pub swap_free: u64,
    #[serde(rename = "swap_used_mb")]
    pub swap_used: u64,
    pub swap_used_percent: f64,
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 * 10000.0 / whole as f64).round() / 100.0
}

/// Parses /proc/meminfo ("Key:   value kB" lines).
///
/// `MemTotal` is required; other keys default to zero so older kernels still
/// report. Kernels without `MemAvailable` get free + buffers + cached instead.
pub fn parse_meminfo(content: &str) -> CollectorResult<MemoryUsage> {
    let mut mem_map: HashMap<&str, u64> = HashMap::with_capacity(48);

    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        if let Some(Ok(kb)) = rest.split_whitespace().next().map(str::parse::<u64>) {
            mem_map.insert(key.trim(), kb);
        }
    }

    let kb = |key: &str| mem_map.get(key).copied().unwrap_or(0);
    let total = mem_map
        .get("MemTotal")
        .copied()
        .ok_or(CollectorError::MissingField {
            field: "MemTotal".to_string(),
            location: "/proc/meminfo".to_string(),
        })?;

    let free = kb("MemFree");
    let buffers = kb("Buffers");
    let cached = kb("Cached");
    let available = mem_map
        .get("MemAvailable")
        .copied()
        .unwrap_or(free + buffers + cached);
    let used = total.saturating_sub(available);

    let swap_total = kb("SwapTotal");
    let swap_free = kb("SwapFree");
    let swap_used = swap_total.saturating_sub(swap_free);

    Ok(MemoryUsage {
        total: total / 1024,
        free: free / 1024,
        available: available / 1024,
        buffers: buffers / 1024,
        cached: cached / 1024,
        used: used / 1024,
        used_percent: percent(used, total),
        swap_total: swap_total / 1024,
        swap_free: swap_free / 1024,
        swap_used: swap_used / 1024,
        swap_used_percent: percent(swap_used, swap_total),
    })
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCollector {
    procfs: ProcFs,
}

impl MemoryCollector {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }
}

#[async_trait::async_trait]
impl DataProducer for MemoryCollector {
    type Output = MemoryUsage;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        parse_meminfo(&self.procfs.read("meminfo").await?)
    }
}
