use crate::exec::{Executor, Timeout, ToolCommand};
use crate::models::device::{BlockDevice, DeviceNode, DeviceTree};
use crate::util::size::parse_size;
use serde::Deserialize;

pub fn lsblk_command() -> ToolCommand {
    ToolCommand::new("lsblk").args([
        "--json",
        "--bytes",
        "-o",
        "NAME,SIZE,TYPE,MOUNTPOINT,FSTYPE,MODEL,SERIAL",
    ])
}

/// Run lsblk and return every device and partition as a flat list.
/// Any failure yields an empty list.
pub fn read_devices(exec: &dyn Executor) -> Vec<BlockDevice> {
    let out = match exec.run(&lsblk_command(), Timeout::Short) {
        Ok(o)  => o,
        Err(e) => {
            tracing::warn!(error = %e, "lsblk unavailable");
            return Vec::new();
        }
    };
    if !out.success() {
        tracing::warn!(code = ?out.code, stderr = %out.stderr.trim(), "lsblk failed");
        return Vec::new();
    }

    match parse_lsblk(&out.stdout) {
        Ok(trees) => flatten(&trees),
        Err(e) => {
            tracing::warn!(error = %e, "lsblk returned malformed JSON");
            Vec::new()
        }
    }
}

#[derive(Deserialize)]
struct LsblkReport {
    #[serde(default)]
    blockdevices: Vec<RawNode>,
}

#[derive(Deserialize)]
struct RawNode {
    #[serde(default)]
    name:        String,
    size:        Option<RawSize>,
    #[serde(rename = "type")]
    dev_type:    Option<String>,
    mountpoint:  Option<String>,
    #[serde(default)]
    mountpoints: Vec<Option<String>>,
    fstype:      Option<String>,
    model:       Option<String>,
    serial:      Option<String>,
    children:    Option<Vec<RawNode>>,
}

/// lsblk prints sizes as numbers with `--bytes`, older builds as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSize {
    Bytes(u64),
    Text(String),
}

pub fn parse_lsblk(json: &str) -> Result<Vec<DeviceTree>, serde_json::Error> {
    let report: LsblkReport = serde_json::from_str(json)?;
    Ok(report.blockdevices.into_iter().map(into_tree).collect())
}

fn into_tree(raw: RawNode) -> DeviceTree {
    let mount_point = str_opt(raw.mountpoint)
        .or_else(|| raw.mountpoints.into_iter().flatten().find(|m| !m.trim().is_empty()));
    let node = DeviceNode {
        name:     raw.name.trim().to_string(),
        size:     match raw.size {
            Some(RawSize::Bytes(b)) => b,
            Some(RawSize::Text(s))  => parse_size(&s),
            None                    => 0,
        },
        dev_type: raw.dev_type.unwrap_or_default(),
        mount_point,
        fstype:   str_opt(raw.fstype),
        model:    str_opt(raw.model),
        serial:   str_opt(raw.serial),
    };
    match raw.children {
        Some(children) if !children.is_empty() => {
            DeviceTree::Branch(node, children.into_iter().map(into_tree).collect())
        }
        _ => DeviceTree::Leaf(node),
    }
}

/// Depth-first flattening: a parent row comes before its children.
pub fn flatten(trees: &[DeviceTree]) -> Vec<BlockDevice> {
    let mut out = Vec::new();
    for t in trees {
        walk(t, None, &mut out);
    }
    out
}

fn walk(tree: &DeviceTree, parent: Option<&str>, out: &mut Vec<BlockDevice>) {
    let node = tree.node();
    let name = match parent {
        Some(p) => child_name(p, &node.name),
        None    => node.name.clone(),
    };
    out.push(node.to_row(name.clone()));
    if let DeviceTree::Branch(_, children) = tree {
        for c in children {
            walk(c, Some(&name), out);
        }
    }
}

/// lsblk already reports full kernel names (`sda1`, `nvme0n1p2`, `vg-root`),
/// so those are kept. Only a bare suffix such as `1` or `p1` is joined onto
/// the parent name.
fn child_name(parent: &str, name: &str) -> String {
    if name.starts_with(parent) || !is_bare_suffix(name) {
        return name.to_string();
    }
    format!("{parent}{name}")
}

fn is_bare_suffix(name: &str) -> bool {
    let digits = name.strip_prefix('p').unwrap_or(name);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn str_opt(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
