use crate::exec::{ExecError, Executor, Timeout, ToolCommand};

/// One btrfs entry of the live mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub target:  String,
    pub source:  String,
    pub uuid:    Option<String>,
    pub options: String,
}

pub fn findmnt_command() -> ToolCommand {
    ToolCommand::new("findmnt")
        .args(["-t", "btrfs", "-n", "-r", "-o", "TARGET,SOURCE,UUID,OPTIONS"])
}

/// Query btrfs mounts. findmnt exits 1 when nothing matches, which is an
/// empty table rather than a failure.
pub fn query_btrfs_mounts(exec: &dyn Executor) -> Result<Vec<MountEntry>, ExecError> {
    let out = exec.run(&findmnt_command(), Timeout::Short)?;
    if !out.success() {
        return Ok(Vec::new());
    }
    Ok(parse_findmnt(&out.stdout))
}

/// Same as [`query_btrfs_mounts`] but absorbs failures for read paths.
pub fn read_btrfs_mounts(exec: &dyn Executor) -> Vec<MountEntry> {
    query_btrfs_mounts(exec).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "mount table lookup failed");
        Vec::new()
    })
}

/// Parse `findmnt -r -o TARGET,SOURCE,UUID,OPTIONS` output.
pub fn parse_findmnt(text: &str) -> Vec<MountEntry> {
    text.lines()
        .filter_map(|line| {
            let f: Vec<&str> = line.splitn(4, ' ').collect();
            if f.len() < 4 || f[0].is_empty() { return None; }
            let uuid = unescape(f[2]);
            Some(MountEntry {
                target:  unescape(f[0]),
                source:  unescape(f[1]),
                uuid:    if uuid.is_empty() { None } else { Some(uuid) },
                options: f[3].trim().to_string(),
            })
        })
        .collect()
}

/// First mount of the filesystem with this UUID. Matches the UUID column exactly.
pub fn find_by_uuid<'a>(mounts: &'a [MountEntry], uuid: &str) -> Option<&'a MountEntry> {
    mounts.iter().find(|m| m.uuid.as_deref().is_some_and(|u| u.eq_ignore_ascii_case(uuid)))
}

/// Decode the `\xNN` escapes findmnt uses in raw output.
fn unescape(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && bytes[i + 1] == b'x' {
            let hex = std::str::from_utf8(&bytes[i + 2..i + 4]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
