use crate::collectors::{btrfs, diskstats, lsblk, raid, snapper};
use crate::exec::Executor;
use crate::models::device::BlockDevice;
use crate::models::filesystem::BtrfsFilesystem;
use crate::models::io::IoStat;
use crate::models::raid::RaidProfile;
use crate::models::snapshot::Snapshot;
use crate::util::human::{fmt_byte_count, fmt_bytes};

/// Everything the read endpoints report, gathered once.
#[derive(Debug, Default)]
pub struct Overview {
    pub filesystems: Vec<BtrfsFilesystem>,
    pub devices:     Vec<BlockDevice>,
    pub profiles:    Vec<RaidProfile>,
    pub snapshots:   Vec<Snapshot>,
    pub io:          Vec<IoStat>,
}

/// Run every collector once.
pub fn collect(exec: &dyn Executor) -> Overview {
    Overview {
        filesystems: btrfs::read_filesystems(exec),
        devices:     lsblk::read_devices(exec),
        profiles:    raid::read_profiles(exec),
        snapshots:   snapper::read_snapshots(exec),
        io:          diskstats::read_io_stats(),
    }
}

/// Generate a human-readable overview to a String.
pub fn generate(o: &Overview) -> String {
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let mut out = String::new();

    out.push_str("═══════════════════════════════════════════════\n");
    out.push_str(&format!("  btrdash summary  {}\n", now));
    out.push_str("═══════════════════════════════════════════════\n\n");

    // ── Filesystems ────────────────────────────────────────────────────
    out.push_str(&format!("── Btrfs Filesystems ({}) ─────────────────────\n", o.filesystems.len()));
    if o.filesystems.is_empty() {
        out.push_str("  (none found)\n");
    }
    for fs in &o.filesystems {
        let label = fs.label.as_deref().unwrap_or("(no label)");
        let mount = fs.mount_point.as_deref().unwrap_or("not mounted");
        out.push_str(&format!(
            "  {:<16} {:<9} {}\n  Mount: {}{}\n  Total: {:>10}  Used: {:>10}  Free: {:>10}  Devices: {}\n",
            label,
            fs.status.label(),
            fs.uuid,
            mount,
            fs.mount_options.as_deref().map(|opts| format!(" ({opts})")).unwrap_or_default(),
            fmt_byte_count(fs.total_size),
            fmt_byte_count(fs.used),
            fmt_byte_count(fs.free),
            fs.devices.len(),
        ));
    }
    out.push('\n');

    // ── RAID ───────────────────────────────────────────────────────────
    out.push_str(&format!("── RAID Profiles ({}) ─────────────────────────\n", o.profiles.len()));
    for p in &o.profiles {
        out.push_str(&format!(
            "  {:<30} data:{:<8} metadata:{:<8} reserve:{}\n",
            p.fs, p.data_profile, p.metadata_profile, fmt_byte_count(p.global_reserve),
        ));
    }
    out.push('\n');

    // ── Devices ────────────────────────────────────────────────────────
    out.push_str(&format!("── Block Devices ({}) ─────────────────────────\n", o.devices.len()));
    out.push_str(&format!(
        "  {:<14} {:<6} {:>10} {:<8} {:<20} {}\n",
        "Name", "Type", "Size", "FS", "Mount", "Model"
    ));
    out.push_str(&format!("  {}\n", "─".repeat(72)));
    for d in &o.devices {
        out.push_str(&format!(
            "  {:<14} {:<6} {:>10} {:<8} {:<20} {}\n",
            d.name,
            d.dev_type,
            fmt_bytes(d.size),
            d.fstype.as_deref().unwrap_or("—"),
            d.mount_point.as_deref().unwrap_or("—"),
            d.model.as_deref().unwrap_or(""),
        ));
    }
    out.push('\n');

    // ── Snapshots ──────────────────────────────────────────────────────
    out.push_str(&format!("── Snapper Snapshots ({}) ─────────────────────\n", o.snapshots.len()));
    for s in &o.snapshots {
        out.push_str(&format!(
            "  {:<10} #{:<5} {:<7} {:<26} {}\n",
            s.config, s.id, s.snap_type, s.date, s.description,
        ));
    }
    out.push('\n');

    // ── IO ─────────────────────────────────────────────────────────────
    out.push_str(&format!("── IO Since Boot ({}) ─────────────────────────\n", o.io.len()));
    for io in &o.io {
        out.push_str(&format!(
            "  {:<10} reads:{:>10} ({:>10})  writes:{:>10} ({:>10})\n",
            io.device,
            io.read_count,
            fmt_bytes(io.read_bytes),
            io.write_count,
            fmt_bytes(io.write_bytes),
        ));
    }
    out.push('\n');

    out.push_str("═══════════════════════════════════════════════\n");
    out
}
