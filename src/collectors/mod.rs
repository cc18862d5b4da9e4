//! One module per external tool or kernel file. Read collectors never fail:
//! a broken tool yields an empty or partial list and a warning in the log.

pub mod blkid;
pub mod btrfs;
pub mod diskstats;
pub mod lsblk;
pub mod mounts;
pub mod raid;
pub mod snapper;
