use serde::{Deserialize, Serialize};

use super::{error::CollectorError, procfs::ProcFs, traits::DataProducer, types::CollectorResult};

/// Cumulative traffic counters for one network interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceTraffic {
    pub name: String,
    /// Bytes received.
    pub inbound: u64,
    /// Bytes transmitted.
    pub outbound: u64,
    pub packets_in: u64,
    pub packets_out: u64,
    pub errors_in: u64,
    pub errors_out: u64,
}

/// Parses /proc/net/dev.
///
/// Format (after two header lines):
/// `iface: rx_bytes rx_packets rx_errs rx_drop rx_fifo rx_frame rx_compressed rx_multicast tx_bytes tx_packets tx_errs ...`
/// The loopback interface is skipped.
pub fn parse_net_dev(content: &str) -> CollectorResult<Vec<InterfaceTraffic>> {
    let mut interfaces = Vec::with_capacity(8);

    for line in content.lines().skip(2) {
        let Some((name, values)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name == "lo" {
            continue;
        }

        let values: Vec<u64> = values
            .split_whitespace()
            .map(|s| s.parse::<u64>())
            .collect::<Result<_, _>>()
            .map_err(|_| CollectorError::ParseError {
                metric: "network_stats".to_string(),
                location: format!("/proc/net/dev interface={}", name),
                reason: "failed to parse network counters".to_string(),
            })?;

        if values.len() < 11 {
            return Err(CollectorError::InvalidFormat {
                location: format!("/proc/net/dev interface={}", name),
                reason: format!("expected 16 counters, got {}", values.len()),
            });
        }

        interfaces.push(InterfaceTraffic {
            name: name.to_string(),
            inbound: values[0],
            packets_in: values[1],
            errors_in: values[2],
            outbound: values[8],
            packets_out: values[9],
            errors_out: values[10],
        });
    }

    Ok(interfaces)
}

#[derive(Debug, Clone, Default)]
pub struct NetworkCollector {
    procfs: ProcFs,
}

impl NetworkCollector {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }
}

#[async_trait::async_trait]
impl DataProducer for NetworkCollector {
    type Output = Vec<InterfaceTraffic>;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        parse_net_dev(&self.procfs.read("net/dev").await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collectors::procfs::fixture;

    const NET_DEV: &str = "Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1000      10    0    0    0     0          0         0     1000      10    0    0    0     0       0          0
  eth0: 5000000   4000  2    0    0     0          0         0  3000000    2500    1    0    0     0       0          0
 wlan0:  700       7    0    0    0     0          0         0      300       3    0    0    0     0       0          0
";

    #[test]
    fn parses_interfaces_and_skips_loopback() {
        let ifaces = parse_net_dev(NET_DEV).unwrap();
        let names: Vec<&str> = ifaces.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["eth0", "wlan0"]);

        let eth0 = &ifaces[0];
        assert_eq!(eth0.inbound, 5_000_000);
        assert_eq!(eth0.outbound, 3_000_000);
        assert_eq!(eth0.packets_in, 4000);
        assert_eq!(eth0.errors_in, 2);
        assert_eq!(eth0.errors_out, 1);
    }

    #[test]
    fn garbage_counters_are_a_parse_error() {
        let content = "h1\nh2\neth0: 1 2 x 4\n";
        let err = parse_net_dev(content).unwrap_err();
        assert!(matches!(err, CollectorError::ParseError { .. }));
    }

    #[test]
    fn truncated_line_is_invalid() {
        let content = "h1\nh2\neth0: 1 2 3 4\n";
        let err = parse_net_dev(content).unwrap_err();
        assert!(matches!(err, CollectorError::InvalidFormat { .. }));
    }

    #[tokio::test]
    async fn produce_reads_net_dev() {
        let (_dir, procfs) = fixture::procfs(&[("net/dev", NET_DEV)]);
        let ifaces = NetworkCollector::new(procfs).produce().await.unwrap();
        assert_eq!(ifaces.len(), 2);
    }
}
