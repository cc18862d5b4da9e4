use crate::collectors::btrfs::{self, bytes_value};
use crate::exec::{Executor, Timeout, ToolCommand};
use crate::models::raid::{Profile, RaidProfile};
use crate::models::ByteCount;

pub fn df_command(mount: &str) -> ToolCommand {
    ToolCommand::new("btrfs").args(["filesystem", "df", "-b"]).arg(mount)
}

/// Block group profiles from `btrfs filesystem df`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DfSummary {
    pub data:           Option<Profile>,
    pub metadata:       Option<Profile>,
    pub global_reserve: Option<u64>,
}

/// One record per btrfs filesystem. Profiles can only be read from a
/// mounted filesystem; unmounted ones report the defaults.
pub fn read_profiles(exec: &dyn Executor) -> Vec<RaidProfile> {
    btrfs::read_inventory(exec)
        .into_iter()
        .map(|fs| match fs.mount_point {
            Some(mount) => {
                let df = read_df(exec, &mount);
                RaidProfile {
                    fs:               mount,
                    data_profile:     df.data.unwrap_or_default(),
                    metadata_profile: df.metadata.unwrap_or_default(),
                    global_reserve:   ByteCount::from(df.global_reserve),
                }
            }
            None => RaidProfile {
                fs:               fs.uuid,
                data_profile:     Profile::default(),
                metadata_profile: Profile::default(),
                global_reserve:   ByteCount::Unavailable,
            },
        })
        .collect()
}

fn read_df(exec: &dyn Executor, mount: &str) -> DfSummary {
    match exec.run(&df_command(mount), Timeout::Short) {
        Ok(o) if o.success() => parse_df(&o.stdout),
        Ok(o) => {
            tracing::warn!(mount, stderr = %o.stderr.trim(), "btrfs filesystem df failed");
            DfSummary::default()
        }
        Err(e) => {
            tracing::warn!(mount, error = %e, "btrfs filesystem df unavailable");
            DfSummary::default()
        }
    }
}

/// Parse rows such as `Metadata, DUP: total=268435456, used=131072`.
/// Unknown profile names count as `single`.
pub fn parse_df(text: &str) -> DfSummary {
    let mut out = DfSummary::default();
    for line in text.lines() {
        let Some((head, tail)) = line.trim().split_once(':') else { continue };
        let Some((kind, profile)) = head.split_once(',') else { continue };
        let profile = Profile::from_reported(profile).unwrap_or_default();

        match kind.trim() {
            "Data"          => { out.data.get_or_insert(profile); }
            "Metadata"      => { out.metadata.get_or_insert(profile); }
            "Data+Metadata" => {
                out.data.get_or_insert(profile);
                out.metadata.get_or_insert(profile);
            }
            "GlobalReserve" => {
                if out.global_reserve.is_none() {
                    out.global_reserve = field(tail, "total");
                }
            }
            _ => {}
        }
    }
    out
}

fn field(tail: &str, key: &str) -> Option<u64> {
    tail.split(',')
        .filter_map(|kv| kv.trim().split_once('='))
        .find(|(k, _)| *k == key)
        .and_then(|(_, v)| bytes_value(v.trim()))
}
