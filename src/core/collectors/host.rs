use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{
    error::CollectorError,
    procfs::{read_file, ProcFs},
    traits::DataProducer,
    types::CollectorResult,
};

/// Linux distribution as reported by os-release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distro {
    pub name: String,
    pub version: String,
}

/// Identity of the host the agent runs on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub host: String,
    #[serde(rename = "machineid")]
    pub machine_id: String,
    pub server_key: String,
    pub distro: Distro,
    pub ip_address: String,
    pub instance_id: String,
}

/// Parses `NAME` and `VERSION_ID` out of an os-release file.
pub fn parse_os_release(content: &str) -> Distro {
    let mut distro = Distro::default();
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'').to_string();
        match key.trim() {
            "NAME" => distro.name = value,
            "VERSION_ID" => distro.version = value,
            _ => {}
        }
    }
    distro
}

/// Picks the first non-loopback local address out of /proc/net/fib_trie.
///
/// Local addresses show up as an `|-- a.b.c.d` leaf followed by a
/// `/32 host LOCAL` route line.
pub fn parse_fib_trie(content: &str) -> Option<String> {
    let mut last_leaf: Option<&str> = None;
    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(ip) = trimmed.strip_prefix("|-- ") {
            last_leaf = Some(ip.trim());
        } else if trimmed == "/32 host LOCAL" {
            if let Some(ip) = last_leaf.filter(|ip| !ip.starts_with("127.")) {
                return Some(ip.to_string());
            }
        }
    }
    None
}

/// Returns the persistent machine id stored at `path`, generating and
/// writing a new one when the file is missing or empty.
pub async fn get_or_create_machine_id(path: &Path) -> CollectorResult<String> {
    if let Ok(existing) = tokio::fs::read_to_string(path).await {
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }

    let id = uuid::Uuid::new_v4().simple().to_string();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| CollectorError::FileWrite {
                path: parent.display().to_string(),
                source,
            })?;
    }
    tokio::fs::write(path, format!("{}\n", id))
        .await
        .map_err(|source| CollectorError::FileWrite {
            path: path.display().to_string(),
            source,
        })?;
    Ok(id)
}

/// Reports host identity: hostname, machine id, distro, primary address and
/// cloud instance id. Only the hostname is mandatory; the other fields are
/// left empty when their source is unavailable.
#[derive(Debug, Clone)]
pub struct HostCollector {
    procfs: ProcFs,
    machine_id_path: PathBuf,
    os_release_path: PathBuf,
    instance_id_path: PathBuf,
    server_key: String,
}

impl HostCollector {
    pub fn new(
        procfs: ProcFs,
        machine_id_path: impl Into<PathBuf>,
        os_release_path: impl Into<PathBuf>,
        server_key: impl Into<String>,
    ) -> Self {
        Self {
            procfs,
            machine_id_path: machine_id_path.into(),
            os_release_path: os_release_path.into(),
            instance_id_path: PathBuf::from("/sys/class/dmi/id/board_asset_tag"),
            server_key: server_key.into(),
        }
    }

    pub fn with_instance_id_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.instance_id_path = path.into();
        self
    }

    async fn instance_id(&self) -> String {
        // EC2 Nitro instances expose their id as the board asset tag.
        match read_file(&self.instance_id_path).await {
            Ok(tag) if tag.trim().starts_with("i-") => tag.trim().to_string(),
            _ => String::new(),
        }
    }
}

impl Default for HostCollector {
    fn default() -> Self {
        Self::new(
            ProcFs::default(),
            "/var/lib/hivemon/machine-id",
            "/etc/os-release",
            "",
        )
    }
}

#[async_trait::async_trait]
impl DataProducer for HostCollector {
    type Output = HostInfo;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        let host = self
            .procfs
            .read("sys/kernel/hostname")
            .await?
            .trim()
            .to_string();

        let machine_id = match get_or_create_machine_id(&self.machine_id_path).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Can't get or create machine id: {}", e);
                String::new()
            }
        };

        let distro = match read_file(&self.os_release_path).await {
            Ok(content) => parse_os_release(&content),
            Err(_) => Distro::default(),
        };

        let ip_address = match self.procfs.read("net/fib_trie").await {
            Ok(content) => parse_fib_trie(&content).unwrap_or_default(),
            Err(_) => String::new(),
        };

        Ok(HostInfo {
            host,
            machine_id,
            server_key: self.server_key.clone(),
            distro,
            ip_address,
            instance_id: self.instance_id().await,
        })
    }
}
