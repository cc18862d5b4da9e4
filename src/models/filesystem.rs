use super::ByteCount;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FsStatus {
    Active,
    Degraded,
}

impl FsStatus {
    pub fn label(&self) -> &'static str {
        match self {
            FsStatus::Active   => "active",
            FsStatus::Degraded => "degraded",
        }
    }
}

/// One btrfs filesystem as listed by `btrfs filesystem show`.
///
/// `id` is the position in one listing and is not stable; `uuid` is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BtrfsFilesystem {
    pub id:            usize,
    pub label:         Option<String>,
    pub uuid:          String,
    /// Raw `devid ...` lines, kept verbatim.
    pub devices:       Vec<String>,
    pub total_size:    ByteCount,
    pub used:          ByteCount,
    pub free:          ByteCount,
    pub status:        FsStatus,
    pub mount_point:   Option<String>,
    pub mount_options: Option<String>,
}

/// Totals from the `Overall:` section of `btrfs filesystem usage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FsUsage {
    pub total: ByteCount,
    pub used:  ByteCount,
    pub free:  ByteCount,
}
