use crate::exec::{Executor, Timeout, ToolCommand};
use crate::models::snapshot::Snapshot;
use crate::models::ByteCount;

pub fn list_configs_command() -> ToolCommand {
    ToolCommand::new("snapper").arg("list-configs")
}

pub fn list_command(config: &str) -> ToolCommand {
    ToolCommand::new("snapper").arg("-c").arg(config).arg("list")
}

/// Snapshots of every snapper configuration. A configuration that cannot
/// be listed is skipped; the rest are still returned.
pub fn read_snapshots(exec: &dyn Executor) -> Vec<Snapshot> {
    let configs = match exec.run(&list_configs_command(), Timeout::Short) {
        Ok(o) if o.success() => parse_configs(&o.stdout),
        Ok(o) => {
            tracing::warn!(stderr = %o.stderr.trim(), "snapper list-configs failed");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(error = %e, "snapper unavailable");
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    for config in &configs {
        match exec.run(&list_command(config), Timeout::Short) {
            Ok(o) if o.success() => out.extend(parse_list(config, &o.stdout)),
            Ok(o) => tracing::warn!(config, stderr = %o.stderr.trim(), "skipping snapper config"),
            Err(e) => tracing::warn!(config, error = %e, "skipping snapper config"),
        }
    }
    out
}

/// Newer snapper draws tables with box characters; fold them to ASCII.
fn normalize(line: &str) -> String {
    line.replace('│', "|")
}

fn is_rule(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty() && t.chars().all(|c| matches!(c, '-' | '+' | '|' | '=' | '─' | '┼' | '│' | '━' | '┿' | '╪' | '═' | ' '))
}

/// Config names from `snapper list-configs` (header skipped).
pub fn parse_configs(text: &str) -> Vec<String> {
    text.lines()
        .skip(1)
        .map(normalize)
        .filter(|l| !is_rule(l))
        .filter_map(|l| {
            let first = l.split('|').next()?.split_whitespace().next()?;
            Some(first.to_string())
        })
        .collect()
}

/// Field positions inside one `snapper list` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    id:          usize,
    snap_type:   usize,
    pre:         usize,
    date:        usize,
    user:        usize,
    description: usize,
}

const POSITIONAL: Columns = Columns { id: 0, snap_type: 1, pre: 2, date: 3, user: 4, description: 5 };

impl Columns {
    /// Locate columns by header name; fall back to the classic six-column
    /// order when the header is not recognised.
    fn from_header(header: &str) -> Columns {
        let names: Vec<String> = normalize(header)
            .split('|')
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();
        let find = |want: &str| names.iter().position(|n| n == want);

        match (find("#"), find("type"), find("pre #"), find("date"), find("user"), find("description")) {
            (Some(id), Some(snap_type), Some(pre), Some(date), Some(user), Some(description)) => {
                Columns { id, snap_type, pre, date, user, description }
            }
            _ => POSITIONAL,
        }
    }

    fn max(&self) -> usize {
        [self.id, self.snap_type, self.pre, self.date, self.user, self.description]
            .into_iter()
            .max()
            .unwrap_or(0)
    }
}

/// Rows of `snapper -c <config> list`. Rows with fewer than six `|` fields
/// are ignored.
pub fn parse_list(config: &str, text: &str) -> Vec<Snapshot> {
    let mut lines = text.lines();
    let cols = lines.next().map(Columns::from_header).unwrap_or(POSITIONAL);

    lines
        .map(normalize)
        .filter_map(|line| {
            let f: Vec<&str> = line.split('|').map(str::trim).collect();
            if f.len() < 6 || f.len() <= cols.max() { return None; }

            let pre = f[cols.pre];
            Some(Snapshot {
                id:          f[cols.id].to_string(),
                config:      config.to_string(),
                snap_type:   f[cols.snap_type].to_string(),
                pre_num:     if pre.is_empty() || pre == "-" { None } else { Some(pre.to_string()) },
                description: f[cols.description].to_string(),
                date:        f[cols.date].to_string(),
                user_name:   f[cols.user].to_string(),
                used_space:  ByteCount::Unavailable,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptedExecutor;
    use crate::exec::CommandOutput;

    #[test]
    fn one_row_with_no_pre_number() {
        let snaps = parse_list("root", "# | Type | Pre # | Date | User | Description\n1|single|-|2024-01-01|root|init snapshot\n");
        assert_eq!(snaps.len(), 1);
        let s = &snaps[0];
        assert_eq!(s.id, "1");
        assert_eq!(s.config, "root");
        assert_eq!(s.snap_type, "single");
        assert_eq!(s.pre_num, None);
        assert_eq!(s.date, "2024-01-01");
        assert_eq!(s.user_name, "root");
        assert_eq!(s.description, "init snapshot");
        assert_eq!(s.used_space, ByteCount::Unavailable);
    }

    #[test]
    fn unknown_header_uses_positions() {
        let snaps = parse_list("home", "whatever\n7 | post | 6 | Mon 01 Jan 2024 | alice | after update\n");
        assert_eq!(snaps[0].pre_num.as_deref(), Some("6"));
        assert_eq!(snaps[0].description, "after update");
    }

    #[test]
    fn named_columns_handle_extra_fields() {
        let text = "\
 # | Type   | Pre # | Date                     | User | Cleanup | Description | Userdata
---+--------+-------+--------------------------+------+---------+-------------+---------
0  | single |       |                          | root |         | current     |
5  | pre    |       | Tue 02 Jan 2024 10:00:00 | root | number  | zypp(zypper) | important=yes
";
        let snaps = parse_list("root", text);
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].description, "current");
        assert_eq!(snaps[0].pre_num, None);
        assert_eq!(snaps[1].description, "zypp(zypper)");
        assert_eq!(snaps[1].date, "Tue 02 Jan 2024 10:00:00");
    }

    #[test]
    fn box_drawing_tables() {
        let text = "\
 # │ Type   │ Pre # │ Date       │ User │ Description
───┼────────┼───────┼────────────┼──────┼────────────
1  │ single │       │ 2024-01-01 │ root │ first
";
        let snaps = parse_list("root", text);
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].description, "first");

        let cfgs = parse_configs("Config │ Subvolume\n───────┼──────────\nroot   │ /\nhome   │ /home\n");
        assert_eq!(cfgs, ["root", "home"]);
    }

    #[test]
    fn short_rows_are_skipped() {
        assert!(parse_list("root", "hdr\n1|single|-|2024|root\n").is_empty());
    }

    #[test]
    fn configs_skip_header_and_rules() {
        let cfgs = parse_configs("Config | Subvolume\n-------+----------\nroot   | /\nhome   | /home\n\n");
        assert_eq!(cfgs, ["root", "home"]);
    }

    #[test]
    fn failing_config_is_skipped() {
        let exec = ScriptedExecutor::new()
            .reply("snapper list-configs", CommandOutput::ok("Config | Subvolume\nroot | /\nbroken | /x\nhome | /home\n"))
            .reply("snapper -c root list", CommandOutput::ok("hdr\n1|single|-|d|root|one\n"))
            .reply("snapper -c broken list", CommandOutput::failed(1, "Unknown config."))
            .reply("snapper -c home list", CommandOutput::ok("hdr\n2|single|-|d|bob|two\n"));
        let snaps = read_snapshots(&exec);
        let keys: Vec<(&str, &str)> = snaps.iter().map(|s| (s.config.as_str(), s.id.as_str())).collect();
        assert_eq!(keys, [("root", "1"), ("home", "2")]);
    }

    #[test]
    fn no_configs_no_snapshots() {
        let exec = ScriptedExecutor::new().reply("snapper list-configs", CommandOutput::ok("Config | Subvolume\n"));
        assert!(read_snapshots(&exec).is_empty());
        assert_eq!(exec.calls().len(), 1);
        assert!(read_snapshots(&ScriptedExecutor::new()).is_empty());
    }
}
