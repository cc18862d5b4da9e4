use crate::collectors::mounts::{self, MountEntry};
use crate::exec::{Executor, Timeout, ToolCommand};
use crate::models::filesystem::{BtrfsFilesystem, FsStatus, FsUsage};
use crate::models::ByteCount;
use crate::util::size::parse_size_iec;

pub fn show_command() -> ToolCommand {
    ToolCommand::new("btrfs").args(["filesystem", "show"])
}

pub fn usage_command(mount: &str) -> ToolCommand {
    ToolCommand::new("btrfs").args(["filesystem", "usage", "-b"]).arg(mount)
}

/// Full filesystem listing: show output, mount enrichment and usage totals.
pub fn read_filesystems(exec: &dyn Executor) -> Vec<BtrfsFilesystem> {
    let mut list = read_inventory(exec);
    for fs in &mut list {
        if let Some(mount) = fs.mount_point.clone() {
            let usage = read_usage(exec, &mount);
            fs.total_size = usage.total;
            fs.used       = usage.used;
            fs.free       = usage.free;
        }
    }
    list
}

/// Filesystems with mount point and options, sizes left unavailable.
pub fn read_inventory(exec: &dyn Executor) -> Vec<BtrfsFilesystem> {
    let out = match exec.run(&show_command(), Timeout::Short) {
        Ok(o) if o.success() => o,
        Ok(o) => {
            tracing::warn!(code = ?o.code, stderr = %o.stderr.trim(), "btrfs filesystem show failed");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(error = %e, "btrfs filesystem show unavailable");
            return Vec::new();
        }
    };

    let mut list = parse_show(&out.stdout);
    if !list.is_empty() {
        let table = mounts::read_btrfs_mounts(exec);
        attach_mounts(&mut list, &table);
    }
    list
}

pub fn attach_mounts(list: &mut [BtrfsFilesystem], table: &[MountEntry]) {
    for fs in list.iter_mut() {
        if let Some(m) = mounts::find_by_uuid(table, &fs.uuid) {
            fs.mount_point   = Some(m.target.clone());
            fs.mount_options = Some(m.options.clone()).filter(|o| !o.is_empty());
        }
    }
}

fn read_usage(exec: &dyn Executor, mount: &str) -> FsUsage {
    match exec.run(&usage_command(mount), Timeout::Short) {
        Ok(o) if o.success() => parse_usage(&o.stdout),
        Ok(o) => {
            tracing::warn!(mount, stderr = %o.stderr.trim(), "btrfs filesystem usage failed");
            FsUsage::default()
        }
        Err(e) => {
            tracing::warn!(mount, error = %e, "btrfs filesystem usage unavailable");
            FsUsage::default()
        }
    }
}

// ── `btrfs filesystem show` ──────────────────────────────────────────

/// Line-oriented parser over blank-line-delimited blocks.
struct ShowParser {
    done:    Vec<BtrfsFilesystem>,
    current: Option<BtrfsFilesystem>,
}

impl ShowParser {
    fn close(&mut self) {
        if let Some(fs) = self.current.take() {
            self.done.push(fs);
        }
    }

    fn line(&mut self, raw: &str) {
        let line = raw.trim();
        if let Some(rest) = line.strip_prefix("Label:") {
            self.close();
            self.current = parse_label_line(rest, self.done.len() + 1);
        } else if line.is_empty() {
            self.close();
        } else if let Some(fs) = self.current.as_mut() {
            if line.starts_with("*** Some devices missing") {
                fs.status = FsStatus::Degraded;
            } else if line.contains("devid") {
                fs.devices.push(line.to_string());
            }
        }
    }
}

pub fn parse_show(text: &str) -> Vec<BtrfsFilesystem> {
    let mut p = ShowParser { done: Vec::new(), current: None };
    for line in text.lines() {
        p.line(line);
    }
    p.close();
    p.done
}

/// `'rootfs'  uuid: 1111-2222` (the part after `Label:`).
fn parse_label_line(rest: &str, id: usize) -> Option<BtrfsFilesystem> {
    let (label_part, uuid_part) = rest.split_once("uuid:")?;
    let uuid = uuid_part.split_whitespace().next()?.to_string();

    let raw_label = label_part.trim();
    let label = if raw_label == "none" {
        None
    } else {
        Some(raw_label.trim_matches('\'').to_string()).filter(|l| !l.is_empty())
    };

    Some(BtrfsFilesystem {
        id,
        label,
        uuid,
        devices:       Vec::new(),
        total_size:    ByteCount::Unavailable,
        used:          ByteCount::Unavailable,
        free:          ByteCount::Unavailable,
        status:        FsStatus::Active,
        mount_point:   None,
        mount_options: None,
    })
}

// ── `btrfs filesystem usage -b` ──────────────────────────────────────

/// Pull the `Overall:` totals. Rows that are missing or garbled stay unavailable.
pub fn parse_usage(text: &str) -> FsUsage {
    let mut usage = FsUsage::default();
    for line in text.lines() {
        let line = line.trim();
        let slot = if line.starts_with("Device size:") {
            &mut usage.total
        } else if line.starts_with("Used:") {
            &mut usage.used
        } else if line.starts_with("Free (estimated):") {
            &mut usage.free
        } else {
            continue;
        };
        if slot.is_available() { continue; }

        let value = line.split_once(':')
            .and_then(|(_, v)| v.split_whitespace().next())
            .and_then(bytes_value);
        *slot = ByteCount::from(value);
    }
    usage
}

/// `123456` or `1.50GiB`. A human value of zero is indistinguishable from
/// garbage after lenient parsing, so only the raw form may be zero.
pub fn bytes_value(tok: &str) -> Option<u64> {
    tok.parse::<u64>().ok().or_else(|| {
        let v = parse_size_iec(tok);
        (v > 0).then_some(v)
    })
}
