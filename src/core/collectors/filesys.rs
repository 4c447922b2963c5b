use std::{
    collections::HashSet,
    ffi::CString,
    io,
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use super::{procfs::ProcFs, traits::DataProducer, types::CollectorResult};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Capacity of one mounted volume. Sizes are whole megabytes rendered as
/// strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeUsage {
    /// Device with the `/dev/` prefix removed (e.g. "sda1").
    pub name: String,
    /// Mount point.
    pub path: String,
    pub fstype: String,
    pub total: String,
    pub free: String,
    pub used: String,
    /// Used share of the total, two decimals.
    pub percent: f64,
}

/// One line of /proc/mounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
}

/// Raw statvfs numbers for a mount point, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsCapacity {
    pub total: u64,
    /// Space available to unprivileged users.
    pub free: u64,
    pub used: u64,
}

/// Signature of the function that measures a mount point.
pub type StatFn = fn(&Path) -> io::Result<FsCapacity>;

/// Calls `statvfs(3)` on `path`.
pub fn statvfs(path: &Path) -> io::Result<FsCapacity> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }

    let block_size = stat.f_frsize as u64;
    let blocks = stat.f_blocks as u64;
    Ok(FsCapacity {
        total: blocks.saturating_mul(block_size),
        free: (stat.f_bavail as u64).saturating_mul(block_size),
        used: blocks
            .saturating_sub(stat.f_bfree as u64)
            .saturating_mul(block_size),
    })
}

/// Undoes the octal escapes (`\040` for space and so on) the kernel writes
/// into /proc/mounts fields.
fn unescape_mount_field(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let escaped = std::str::from_utf8(&bytes[i + 1..i + 4])
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 8).ok());
            if let Some(value) = escaped {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parses /proc/mounts. Lines with fewer than three fields are skipped.
pub fn parse_mounts(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            let mut parts = trimmed.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(device), Some(mount_point), Some(fs_type)) => Some(MountEntry {
                    device: unescape_mount_field(device),
                    mount_point: unescape_mount_field(mount_point),
                    fs_type: fs_type.to_string(),
                }),
                _ => {
                    trace!("Skipping invalid mount line: {}", trimmed);
                    None
                }
            }
        })
        .collect()
}

/// Filesystem types marked `nodev` in /proc/filesystems.
pub fn parse_nodev_filesystems(content: &str) -> HashSet<String> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("nodev"), Some(name)) => Some(name.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// Maps a SCSI partition like `/dev/sdb1` to its disk (`sdb`).
pub fn scsi_disk_of(device: &str) -> Option<&str> {
    let name = device.strip_prefix("/dev/")?;
    let disk = name.get(..3)?;
    let bytes = disk.as_bytes();
    (bytes.starts_with(b"sd") && bytes[2].is_ascii_lowercase()).then_some(disk)
}

/// Turns one measured mount into a report entry.
///
/// Volumes smaller than a megabyte or with nothing used are left out.
pub fn volume_usage(entry: &MountEntry, capacity: FsCapacity) -> Option<VolumeUsage> {
    let total = to_mb(capacity.total);
    let used = to_mb(capacity.used);
    if total == 0 || used == 0 {
        return None;
    }

    let percent = capacity.used as f64 * 100.0 / capacity.total as f64;
    Some(VolumeUsage {
        name: entry.device.replace("/dev/", ""),
        path: entry.mount_point.clone(),
        fstype: entry.fs_type.clone(),
        total: total.to_string(),
        free: to_mb(capacity.free).to_string(),
        used: used.to_string(),
        percent: (percent * 100.0).round() / 100.0,
    })
}

fn to_mb(bytes: u64) -> u64 {
    (bytes as f64 / BYTES_PER_MB).round() as u64
}

/// Reports capacity for every real, non-removable mounted volume.
#[derive(Clone)]
pub struct FilesystemCollector {
    procfs: ProcFs,
    sys_root: PathBuf,
    stat: StatFn,
}

impl FilesystemCollector {
    pub fn new(procfs: ProcFs, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            procfs,
            sys_root: sys_root.into(),
            stat: statvfs,
        }
    }

    /// Replaces the `statvfs` call.
    pub fn with_stat(mut self, stat: StatFn) -> Self {
        self.stat = stat;
        self
    }

    async fn is_removable(&self, device: &str) -> bool {
        let Some(disk) = scsi_disk_of(device) else {
            return false;
        };
        let path = self.sys_root.join("block").join(disk).join("removable");
        match tokio::fs::read_to_string(&path).await {
            Ok(flag) => flag.trim() == "1",
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for FilesystemCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesystemCollector")
            .field("procfs", &self.procfs)
            .field("sys_root", &self.sys_root)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl DataProducer for FilesystemCollector {
    type Output = Vec<VolumeUsage>;

    async fn produce(&self) -> CollectorResult<Self::Output> {
        let mounts = self.procfs.read("mounts").await?;
        let pseudo = match self.procfs.read("filesystems").await {
            Ok(content) => parse_nodev_filesystems(&content),
            Err(e) => {
                warn!("Can't read filesystem types: {}", e);
                HashSet::new()
            }
        };

        let mut volumes = Vec::new();
        for entry in parse_mounts(&mounts) {
            if pseudo.contains(&entry.fs_type) {
                continue;
            }
            if self.is_removable(&entry.device).await {
                trace!("Skipping removable device {}", entry.device);
                continue;
            }

            let capacity = match (self.stat)(Path::new(&entry.mount_point)) {
                Ok(capacity) => capacity,
                Err(e) => {
                    trace!("statvfs failed for '{}': {}", entry.mount_point, e);
                    continue;
                }
            };
            if let Some(volume) = volume_usage(&entry, capacity) {
                volumes.push(volume);
            }
        }

        Ok(volumes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collectors::{error::CollectorError, procfs::fixture};

    const GIB: u64 = 1024 * 1024 * 1024;

    const MOUNTS: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
tmpfs /run tmpfs rw,nosuid,nodev,size=812344k,mode=755 0 0
/dev/sda1 / ext4 rw,relatime,errors=remount-ro 0 0
/dev/sdb1 /media/usb vfat rw,nosuid,nodev,relatime 0 0
/dev/nvme0n1p2 /srv/My\\040Data xfs rw,relatime 0 0
";

    const FILESYSTEMS: &str = "nodev\tsysfs\nnodev\ttmpfs\nnodev\tproc\n\text4\n\tvfat\n\txfs\n";

    fn fixed_stat(_: &Path) -> io::Result<FsCapacity> {
        Ok(FsCapacity {
            total: 10 * GIB,
            free: 4 * GIB,
            used: 6 * GIB,
        })
    }

    fn failing_stat(_: &Path) -> io::Result<FsCapacity> {
        Err(io::Error::from(io::ErrorKind::NotFound))
    }

    fn sysfs() -> (tempfile::TempDir, ProcFs) {
        fixture::procfs(&[
            ("block/sda/removable", "0\n"),
            ("block/sdb/removable", "1\n"),
        ])
    }

    #[test]
    fn parses_mounts_and_unescapes_spaces() {
        let mounts = parse_mounts(MOUNTS);
        assert_eq!(mounts.len(), 6);
        assert_eq!(
            mounts[5],
            MountEntry {
                device: "/dev/nvme0n1p2".to_string(),
                mount_point: "/srv/My Data".to_string(),
                fs_type: "xfs".to_string(),
            }
        );
        assert!(parse_mounts("/dev/sda1 /\n\n").is_empty());
    }

    #[test]
    fn nodev_types_are_collected() {
        let pseudo = parse_nodev_filesystems(FILESYSTEMS);
        assert!(pseudo.contains("tmpfs"));
        assert!(pseudo.contains("proc"));
        assert!(!pseudo.contains("ext4"));
        assert_eq!(pseudo.len(), 3);
    }

    #[test]
    fn scsi_partitions_map_to_their_disk() {
        assert_eq!(scsi_disk_of("/dev/sdb1"), Some("sdb"));
        assert_eq!(scsi_disk_of("/dev/sda"), Some("sda"));
        assert_eq!(scsi_disk_of("/dev/nvme0n1p1"), None);
        assert_eq!(scsi_disk_of("sda1"), None);
        assert_eq!(scsi_disk_of("/dev/sd"), None);
    }

    #[test]
    fn usage_is_reported_in_megabytes() {
        let entry = &parse_mounts(MOUNTS)[3];
        let volume = volume_usage(entry, fixed_stat(Path::new("/")).unwrap()).unwrap();

        assert_eq!(volume.name, "sda1");
        assert_eq!(volume.path, "/");
        assert_eq!(volume.total, "10240");
        assert_eq!(volume.free, "4096");
        assert_eq!(volume.used, "6144");
        assert_eq!(volume.percent, 60.0);
    }

    #[test]
    fn empty_volumes_are_left_out() {
        let entry = &parse_mounts(MOUNTS)[3];
        let empty = FsCapacity {
            total: GIB,
            free: GIB,
            used: 0,
        };
        assert_eq!(volume_usage(entry, empty), None);
        assert_eq!(volume_usage(entry, FsCapacity::default()), None);
    }

    #[test]
    fn serializes_with_volume_field_names() {
        let entry = &parse_mounts(MOUNTS)[3];
        let volume = volume_usage(entry, fixed_stat(Path::new("/")).unwrap()).unwrap();
        let json = serde_json::to_value(&volume).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "sda1",
                "path": "/",
                "fstype": "ext4",
                "total": "10240",
                "free": "4096",
                "used": "6144",
                "percent": 60.0
            })
        );
    }

    #[tokio::test]
    async fn skips_pseudo_and_removable_volumes() {
        let (_proc_dir, procfs) =
            fixture::procfs(&[("mounts", MOUNTS), ("filesystems", FILESYSTEMS)]);
        let (_sys_dir, sys) = sysfs();

        let volumes = FilesystemCollector::new(procfs, sys.root())
            .with_stat(fixed_stat)
            .produce()
            .await
            .unwrap();

        let paths: Vec<&str> = volumes.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["/", "/srv/My Data"]);
        assert_eq!(volumes[1].name, "nvme0n1p2");
    }

    #[tokio::test]
    async fn unmeasurable_mounts_are_skipped() {
        let (_proc_dir, procfs) =
            fixture::procfs(&[("mounts", MOUNTS), ("filesystems", FILESYSTEMS)]);
        let (_sys_dir, sys) = sysfs();

        let volumes = FilesystemCollector::new(procfs, sys.root())
            .with_stat(failing_stat)
            .produce()
            .await
            .unwrap();
        assert!(volumes.is_empty());
    }

    #[tokio::test]
    async fn missing_mounts_fails_the_probe() {
        let (_dir, procfs) = fixture::procfs(&[("filesystems", FILESYSTEMS)]);
        let err = FilesystemCollector::new(procfs, "/nonexistent")
            .produce()
            .await
            .unwrap_err();
        assert!(matches!(err, CollectorError::FileRead { .. }));
    }

    #[test]
    fn statvfs_measures_a_real_directory() {
        let dir = tempfile::tempdir().unwrap();
        let capacity = statvfs(dir.path()).unwrap();
        assert!(capacity.total > 0);
        assert!(capacity.used <= capacity.total);

        assert!(statvfs(&dir.path().join("missing")).is_err());
    }
}
