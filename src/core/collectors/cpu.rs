use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{
    error::CollectorError,
    procfs::{parse_counter, ProcFs},
    traits::DataProducer,
    types::CollectorResult,
};

/// Aggregate CPU time counters from the `cpu` line of /proc/stat, in jiffies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    fn total(&self) -> u64 {
        [
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
            self.steal,
        ]
        .iter()
        .fold(self.user, |acc, v| acc.saturating_add(*v))
    }

    /// Share of each state between `earlier` and `self`, in percent.
    ///
    /// Falls back to the since-boot shares of `self` when no jiffies elapsed.
    pub fn usage_since(&self, earlier: &CpuTimes) -> CpuUsage {
        let delta = CpuTimes {
            user: self.user.saturating_sub(earlier.user),
            nice: self.nice.saturating_sub(earlier.nice),
            system: self.system.saturating_sub(earlier.system),
            idle: self.idle.saturating_sub(earlier.idle),
            iowait: self.iowait.saturating_sub(earlier.iowait),
            irq: self.irq.saturating_sub(earlier.irq),
            softirq: self.softirq.saturating_sub(earlier.softirq),
            steal: self.steal.saturating_sub(earlier.steal),
        };
        if delta.total() == 0 {
            return self.usage();
        }
        delta.usage()
    }

    /// Share of each state since boot, in percent.
    pub fn usage(&self) -> CpuUsage {
        let total = self.total();
        if total == 0 {
            return CpuUsage::default();
        }
        let pct = |v: u64| round2(v as f64 * 100.0 / total as f64);
        CpuUsage {
            user: pct(self.user),
            nice: pct(self.nice),
            system: pct(self.system),
            idle: pct(self.idle),
            iowait: pct(self.iowait),
            irq: pct(self.irq),
            softirq: pct(self.softirq),
            steal: pct(self.steal),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// CPU utilisation per state, in percent of elapsed time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    pub user: f64,
    pub nice: f64,
    pub system: f64,
    pub idle: f64,
    pub iowait: f64,
    pub irq: f64,
    pub softirq: f64,
    pub steal: f64,
}

/// Parses the aggregate `cpu ` line of /proc/stat.
///
/// Kernels older than 2.6.11 omit `steal`; it defaults to zero.
pub fn parse_cpu_times(content: &str) -> CollectorResult<CpuTimes> {
    let line = content
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| CollectorError::MissingField {
            field: "cpu".to_string(),
            location: "/proc/stat".to_string(),
        })?;

    let parts: Vec<&str> = line.split_whitespace().skip(1).collect();
    if parts.len() < 7 {
        return Err(CollectorError::InvalidFormat {
            location: "/proc/stat".to_string(),
            reason: format!("expected at least 7 cpu counters, got {}", parts.len()),
        });
    }

    let field = |idx: usize, name: &str| parse_counter(parts[idx], name, "/proc/stat");
    Ok(CpuTimes {
        user: field(0, "user")?,
        nice: field(1, "nice")?,
        system: field(2, "system")?,
        idle: field(3, "idle")?,
        iowait: field(4, "iowait")?,
        irq: field(5, "irq")?,
        softirq: field(6, "softirq")?,
        steal: match parts.get(7) {
            Some(raw) => parse_counter(raw, "steal", "/proc/stat")?,
            None => 0,
        },
    })
}

/// Counts the per-core `cpuN` lines of /proc/stat.
pub fn count_cores(content: &str) -> u32 {
    content
        .lines()
        .filter(|l| {
            l.strip_prefix("cpu")
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| c.is_ascii_digit())
        })
        .count() as u32
}

/// Samples /proc/stat twice and reports utilisation over the gap.
#[derive(Debug, Clone, Default)]
pub struct CpuCollector {
    procfs: ProcFs,
    sample: Duration,
}

impl CpuCollector {
    pub fn new(procfs: ProcFs, sample: Duration) -> Self {
        Self { procfs, sample }
    }
}

#[async_trait::async_trait]
impl DataProducer for CpuCollector {
    type Output = CpuUsage;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        let first = parse_cpu_times(&self.procfs.read("stat").await?)?;
        if self.sample.is_zero() {
            return Ok(first.usage());
        }

        tokio::time::sleep(self.sample).await;
        let second = parse_cpu_times(&self.procfs.read("stat").await?)?;
        Ok(second.usage_since(&first))
    }
}
