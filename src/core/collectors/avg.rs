use serde::{Deserialize, Serialize};

use super::{
    cpu::count_cores, error::CollectorError, procfs::ProcFs, traits::DataProducer,
    types::CollectorResult,
};

/// Run-queue load averages plus the core count needed to interpret them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadAverage {
    pub minute: f64,
    pub five_minutes: f64,
    pub fifteen_minutes: f64,
    pub cores: u32,
}

/// Parses the first three fields of /proc/loadavg ("1.23 1.45 1.67 1/234 12345").
pub fn parse_loadavg(content: &str) -> CollectorResult<(f64, f64, f64)> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(CollectorError::InvalidFormat {
            location: "/proc/loadavg".to_string(),
            reason: "Expected at least 3 fields".to_string(),
        });
    }

    let field = |idx: usize, metric: &str| {
        parts[idx]
            .parse::<f64>()
            .map_err(|_| CollectorError::ParseError {
                metric: metric.to_string(),
                location: "/proc/loadavg".to_string(),
                reason: format!("invalid value: {}", parts[idx]),
            })
    };

    Ok((
        field(0, "minute")?,
        field(1, "five_minutes")?,
        field(2, "fifteen_minutes")?,
    ))
}

#[derive(Debug, Clone, Default)]
pub struct LoadAverageCollector {
    procfs: ProcFs,
}

impl LoadAverageCollector {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }
}

#[async_trait::async_trait]
impl DataProducer for LoadAverageCollector {
    type Output = LoadAverage;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        let (minute, five_minutes, fifteen_minutes) =
            parse_loadavg(&self.procfs.read("loadavg").await?)?;

        // A missing /proc/stat only costs the core count.
        let cores = match self.procfs.read("stat").await {
            Ok(stat) => count_cores(&stat),
            Err(e) => {
                tracing::debug!("Core count unavailable: {}", e);
                0
            }
        };

        Ok(LoadAverage {
            minute,
            five_minutes,
            fifteen_minutes,
            cores,
        })
    }
}
