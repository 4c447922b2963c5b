use serde::{Deserialize, Serialize};

use super::{error::CollectorError, procfs::ProcFs, traits::DataProducer, types::CollectorResult};

/// System uptime and idle time from /proc/uptime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UptimeInfo {
    /// Seconds since boot, excluding time spent suspended.
    pub uptime_seconds: f64,
    /// Idle seconds accumulated across all CPUs; zero when the kernel omits it.
    pub idle_time_seconds: f64,
    /// Unix timestamp of the last boot.
    pub boot_time_seconds: i64,
}

/// Parses /proc/uptime given the current Unix time.
///
/// The first field is required; a missing or malformed idle field is zero.
pub fn parse_uptime(content: &str, now_unix: i64) -> CollectorResult<UptimeInfo> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    let Some(first) = parts.first() else {
        return Err(CollectorError::InvalidFormat {
            location: "/proc/uptime".to_string(),
            reason: "Expected at least 1 field".to_string(),
        });
    };

    let uptime_seconds = first
        .parse::<f64>()
        .map_err(|_| CollectorError::ParseError {
            metric: "uptime_seconds".to_string(),
            location: "/proc/uptime".to_string(),
            reason: format!("invalid value: {}", first),
        })?;

    let idle_time_seconds = parts
        .get(1)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(UptimeInfo {
        uptime_seconds,
        idle_time_seconds,
        boot_time_seconds: now_unix - uptime_seconds as i64,
    })
}

#[derive(Debug, Clone, Default)]
pub struct UptimeCollector {
    procfs: ProcFs,
}

impl UptimeCollector {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }
}

#[async_trait::async_trait]
impl DataProducer for UptimeCollector {
    type Output = UptimeInfo;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        let content = self.procfs.read("uptime").await?;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|_| CollectorError::SystemCall {
                syscall: "UNIX_EPOCH".to_string(),
                reason: "failed to get current time".to_string(),
            })?
            .as_secs() as i64;

        parse_uptime(&content, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collectors::procfs::fixture;

    #[test]
    fn test_parse_valid_uptime() {
        let info = parse_uptime("123456.78 987654.32", 1_000_123_456).unwrap();
        assert!((info.uptime_seconds - 123456.78).abs() < 0.01);
        assert!((info.idle_time_seconds - 987654.32).abs() < 0.01);
        assert_eq!(info.boot_time_seconds, 1_000_000_000);
    }

    #[test]
    fn test_parse_uptime_only() {
        let info = parse_uptime("3600.5", 1_609_459_200).unwrap();
        assert!((info.uptime_seconds - 3600.5).abs() < 0.01);
        assert_eq!(info.idle_time_seconds, 0.0);
    }

    #[test]
    fn test_parse_empty_file() {
        let result = parse_uptime("", 0);
        assert!(matches!(result, Err(CollectorError::InvalidFormat { .. })));
    }

    #[test]
    fn test_parse_invalid_uptime_value() {
        match parse_uptime("not_a_number 100.0", 0) {
            Err(CollectorError::ParseError { metric, .. }) => assert_eq!(metric, "uptime_seconds"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_parse_invalid_idle_time_value() {
        let info = parse_uptime("3600.0 not_a_number", 0).unwrap();
        assert_eq!(info.uptime_seconds, 3600.0);
        assert_eq!(info.idle_time_seconds, 0.0);
    }

    #[test]
    fn test_parse_tabs_and_extra_whitespace() {
        let info = parse_uptime("  3600.5\t  86400.0  ", 0).unwrap();
        assert!((info.uptime_seconds - 3600.5).abs() < 0.01);
        assert!((info.idle_time_seconds - 86400.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn produce_derives_boot_time_from_clock() {
        let (_dir, procfs) = fixture::procfs(&[("uptime", "100.0 50.0\n")]);
        let info = UptimeCollector::new(procfs).produce().await.unwrap();
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        assert!((now - 100 - info.boot_time_seconds).abs() <= 1);
    }
}
