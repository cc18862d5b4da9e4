use crate::models::io::IoStat;
use std::collections::{HashMap, HashSet};
use std::path::Path;

const SECTOR_BYTES: u64 = 512;

/// Raw snapshot of one line from /proc/diskstats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDiskstat {
    pub reads_completed:  u64,
    pub sectors_read:     u64,
    pub ms_reading:       u64,
    pub writes_completed: u64,
    pub sectors_written:  u64,
    pub ms_writing:       u64,
}

/// Counters for every mounted block device. Devices without a diskstats
/// entry (network, virtual) are left out.
pub fn read_io_stats() -> Vec<IoStat> {
    let mounts = match std::fs::read_to_string("/proc/mounts") {
        Ok(t)  => t,
        Err(e) => {
            tracing::warn!(error = %e, "cannot read /proc/mounts");
            return Vec::new();
        }
    };
    let stats = match std::fs::read_to_string("/proc/diskstats") {
        Ok(t)  => parse_diskstats(&t),
        Err(e) => {
            tracing::warn!(error = %e, "cannot read /proc/diskstats");
            return Vec::new();
        }
    };

    let names: Vec<String> = mounted_sources(&mounts)
        .iter()
        .map(|src| bare_name(&resolve(src)))
        .collect();
    io_stats_for(&names, &stats)
}

/// Parse /proc/diskstats into a map of device-name → raw counters.
pub fn parse_diskstats(text: &str) -> HashMap<String, RawDiskstat> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 14 { continue; }

        map.insert(fields[2].to_string(), RawDiskstat {
            reads_completed:  parse(fields[3]),
            sectors_read:     parse(fields[5]),
            ms_reading:       parse(fields[6]),
            writes_completed: parse(fields[7]),
            sectors_written:  parse(fields[9]),
            ms_writing:       parse(fields[10]),
        });
    }
    map
}

/// `/dev/...` sources from /proc/mounts, in mount order.
pub fn mounted_sources(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|src| src.starts_with("/dev/"))
        .map(str::to_string)
        .collect()
}

/// One entry per device name, first mount first.
pub fn io_stats_for(names: &[String], stats: &HashMap<String, RawDiskstat>) -> Vec<IoStat> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    for n in names {
        if !seen.insert(n.as_str()) { continue; }
        let Some(s) = stats.get(n) else { continue };
        out.push(IoStat {
            device:      n.clone(),
            read_count:  s.reads_completed,
            write_count: s.writes_completed,
            read_bytes:  s.sectors_read * SECTOR_BYTES,
            write_bytes: s.sectors_written * SECTOR_BYTES,
            read_time:   s.ms_reading,
            write_time:  s.ms_writing,
        });
    }
    out
}

/// Follow `/dev/mapper/x` and `/dev/disk/by-*` links to the kernel node.
fn resolve(src: &str) -> String {
    std::fs::canonicalize(src)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| src.to_string())
}

pub fn bare_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn parse(s: &str) -> u64 {
    s.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISKSTATS: &str = "\
   8       0 sda 1000 10 80000 500 2000 20 160000 900 0 1200 1400 0 0 0 0
   8       2 sda2 900 5 72000 450 1900 18 150000 880 0 1100 1330 0 0 0 0
 253       0 dm-0 50 0 400 10 60 0 480 12 0 20 22 0 0 0 0
";

    const MOUNTS: &str = "\
/dev/sda2 / btrfs rw,relatime,subvol=/@ 0 0
proc /proc proc rw 0 0
/dev/sda2 /home btrfs rw,relatime,subvol=/@home 0 0
/dev/sdz1 /media/usb vfat rw 0 0
server:/export /mnt/nfs nfs4 rw 0 0
";

    #[test]
    fn parses_counter_columns() {
        let m = parse_diskstats(DISKSTATS);
        let sda2 = &m["sda2"];
        assert_eq!(sda2.reads_completed, 900);
        assert_eq!(sda2.sectors_read, 72000);
        assert_eq!(sda2.ms_reading, 450);
        assert_eq!(sda2.writes_completed, 1900);
        assert_eq!(sda2.sectors_written, 150000);
        assert_eq!(sda2.ms_writing, 880);
    }

    #[test]
    fn only_device_sources_are_considered() {
        assert_eq!(mounted_sources(MOUNTS), ["/dev/sda2", "/dev/sda2", "/dev/sdz1"]);
    }

    #[test]
    fn correlates_mounts_with_counters() {
        let names: Vec<String> = mounted_sources(MOUNTS).iter().map(|s| bare_name(s)).collect();
        let io = io_stats_for(&names, &parse_diskstats(DISKSTATS));
        assert_eq!(io.len(), 1);
        assert_eq!(io[0].device, "sda2");
        assert_eq!(io[0].read_bytes, 72000 * 512);
        assert_eq!(io[0].write_bytes, 150000 * 512);
        assert_eq!(io[0].read_time, 450);
    }

    #[test]
    fn bare_names() {
        assert_eq!(bare_name("/dev/mapper/cryptroot"), "cryptroot");
        assert_eq!(bare_name("/dev/nvme0n1p2"), "nvme0n1p2");
    }
}
