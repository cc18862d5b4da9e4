use super::ByteCount;
use serde::Serialize;
use std::fmt;

/// Block group profile as reported by btrfs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Single,
    Dup,
    Raid0,
    Raid1,
    Raid1c3,
    Raid1c4,
    Raid5,
    Raid6,
    Raid10,
}

/// Profiles a caller may convert a filesystem to.
pub const CONVERTIBLE: [Profile; 6] = [
    Profile::Single, Profile::Raid0, Profile::Raid1,
    Profile::Raid5,  Profile::Raid6, Profile::Raid10,
];

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Single  => "single",
            Profile::Dup     => "dup",
            Profile::Raid0   => "raid0",
            Profile::Raid1   => "raid1",
            Profile::Raid1c3 => "raid1c3",
            Profile::Raid1c4 => "raid1c4",
            Profile::Raid5   => "raid5",
            Profile::Raid6   => "raid6",
            Profile::Raid10  => "raid10",
        }
    }

    /// Parse a profile name as printed by `btrfs filesystem df` (any case).
    pub fn from_reported(s: &str) -> Option<Profile> {
        let s = s.trim().to_ascii_lowercase();
        [
            Profile::Single, Profile::Dup, Profile::Raid0, Profile::Raid1,
            Profile::Raid1c3, Profile::Raid1c4, Profile::Raid5, Profile::Raid6,
            Profile::Raid10,
        ]
        .into_iter()
        .find(|p| p.as_str() == s)
    }

    /// Parse a conversion target. Only the exact lowercase names in
    /// [`CONVERTIBLE`] are accepted.
    pub fn parse_target(s: &str) -> Option<Profile> {
        CONVERTIBLE.into_iter().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Replication profiles of one filesystem.
///
/// `fs` is the mount point, or the UUID when the filesystem is not mounted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaidProfile {
    pub fs:               String,
    pub data_profile:     Profile,
    pub metadata_profile: Profile,
    pub global_reserve:   ByteCount,
}
