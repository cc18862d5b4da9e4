use crate::collectors::{blkid, mounts};
use crate::config::ActionsConfig;
use crate::error::{ActionError, Attempt, AttemptOutcome};
use crate::exec::{Executor, Timeout, ToolCommand};
use crate::models::raid::{Profile, CONVERTIBLE};
use std::fs;
use std::path::PathBuf;

type ActionResult = Result<String, ActionError>;

/// Mutating actions against the live system. Every action resolves its
/// identifiers first, runs once, and reports the tool's own stderr on
/// failure. Nothing is rolled back.
pub struct Orchestrator<'a> {
    exec: &'a dyn Executor,
    cfg:  &'a ActionsConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(exec: &'a dyn Executor, cfg: &'a ActionsConfig) -> Self {
        Self { exec, cfg }
    }

    pub fn mount(&self, uuid: &str) -> ActionResult {
        self.writable()?;
        let uuid = identifier("uuid", uuid)?;

        let device = blkid::device_for_uuid(self.exec, uuid)?
            .ok_or_else(|| ActionError::NotFound(format!("Device with UUID {uuid} not found")))?;

        let target = self.mount_dir(uuid);
        fs::create_dir_all(&target)?;
        let target = target.to_string_lossy().into_owned();

        self.run_checked("Mount", ToolCommand::new("mount").arg(&device).arg(&target), Timeout::Short)?;
        tracing::info!(%device, %target, "mounted");
        Ok(format!("Successfully mounted {device} to {target}"))
    }

    pub fn unmount(&self, uuid: &str) -> ActionResult {
        self.writable()?;
        let uuid = identifier("uuid", uuid)?;

        let table = mounts::query_btrfs_mounts(self.exec)?;
        let target = mounts::find_by_uuid(&table, uuid)
            .map(|m| m.target.clone())
            .ok_or_else(|| ActionError::NotFound(format!("No mounted filesystem found with UUID {uuid}")))?;

        self.run_checked("Unmount", ToolCommand::new("umount").arg(&target), Timeout::Short)?;
        tracing::info!(%target, "unmounted");
        Ok(format!("Successfully unmounted {target}"))
    }

    pub fn add_device(&self, device: &str, fs_uuid: &str) -> ActionResult {
        self.writable()?;
        let device = identifier("device", device)?;
        let fs_uuid = identifier("fs_uuid", fs_uuid)?;

        if blkid::device_for_uuid(self.exec, fs_uuid)?.is_none() {
            return Err(ActionError::NotFound(format!("Filesystem with UUID {fs_uuid} not found")));
        }
        let table = mounts::query_btrfs_mounts(self.exec)?;
        let target = mounts::find_by_uuid(&table, fs_uuid)
            .map(|m| m.target.clone())
            .ok_or_else(|| ActionError::NotMounted(format!("Filesystem with UUID {fs_uuid} is not mounted")))?;

        self.run_checked(
            "Adding device",
            ToolCommand::new("btrfs").args(["device", "add"]).arg(device).arg(&target),
            Timeout::Long,
        )?;
        tracing::info!(device, %target, "device added");
        Ok(format!("Successfully added {device} to Btrfs filesystem"))
    }

    /// Try each conversion strategy in order until one succeeds.
    pub fn change_raid(&self, filesystem: &str, profile: &str) -> ActionResult {
        self.writable()?;
        let profile = Profile::parse_target(profile).ok_or_else(|| {
            let valid: Vec<&str> = CONVERTIBLE.iter().map(Profile::as_str).collect();
            ActionError::InvalidInput(format!(
                "Invalid RAID profile: {profile} (expected one of {})",
                valid.join(", ")
            ))
        })?;
        let filesystem = identifier("filesystem", filesystem)?;

        let mut attempts = Vec::new();
        for strategy in raid_strategies(filesystem, profile) {
            let command = strategy.command.render();
            let outcome = match self.exec.run(&strategy.command, strategy.timeout) {
                Ok(out) => AttemptOutcome::from_output(&out),
                Err(e)  => AttemptOutcome::NotRun(e.to_string()),
            };
            let ok = outcome == AttemptOutcome::Succeeded;
            attempts.push(Attempt { strategy: strategy.name, command, outcome });
            if ok {
                tracing::info!(filesystem, %profile, strategy = strategy.name, "RAID profile change accepted");
                return Ok(strategy.success_message);
            }
            tracing::debug!(strategy = strategy.name, "RAID strategy failed, trying next");
        }

        tracing::warn!(filesystem, %profile, "every RAID strategy failed");
        Err(ActionError::AllStrategiesFailed { what: "RAID change", attempts })
    }

    /// Destroys whatever is on `device`. There is no confirmation here.
    pub fn create_filesystem(&self, device: &str, label: Option<&str>) -> ActionResult {
        self.writable()?;
        let device = identifier("device", device)?;

        let mut cmd = ToolCommand::new("mkfs.btrfs");
        if let Some(label) = label.filter(|l| !l.is_empty()) {
            cmd = cmd.arg("-L").arg(identifier("label", label)?);
        }
        cmd = cmd.arg(device);

        self.run_checked("Creation", cmd, Timeout::Long)?;
        tracing::info!(device, "btrfs filesystem created");
        Ok(format!("Successfully created Btrfs filesystem on {device}"))
    }

    pub fn create_snapshot(&self, config: &str, description: Option<&str>) -> ActionResult {
        self.writable()?;
        let config = identifier("config", config)?;
        let description = description
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.cfg.default_snapshot_description);
        if description.contains('\0') {
            return Err(ActionError::InvalidInput("description contains a NUL byte".into()));
        }

        self.run_checked(
            "Creation",
            ToolCommand::new("snapper").args(["-c", config, "create", "--description", description]),
            Timeout::Short,
        )?;
        tracing::info!(config, "snapshot created");
        Ok(format!("Successfully created snapshot in config {config}"))
    }

    pub fn delete_snapshot(&self, config: &str, id: &str) -> ActionResult {
        self.writable()?;
        let config = identifier("config", config)?;
        let id = identifier("id", id)?;

        self.run_checked(
            "Deletion",
            ToolCommand::new("snapper").args(["-c", config, "delete", id]),
            Timeout::Short,
        )?;
        tracing::info!(config, id, "snapshot deleted");
        Ok(format!("Successfully deleted snapshot {id} from config {config}"))
    }

    fn writable(&self) -> Result<(), ActionError> {
        if self.cfg.read_only { Err(ActionError::ReadOnly) } else { Ok(()) }
    }

    fn mount_dir(&self, uuid: &str) -> PathBuf {
        let prefix: String = uuid.chars().take(8).collect();
        self.cfg.mount_root.join(format!("btrfs_{prefix}"))
    }

    fn run_checked(&self, what: &'static str, cmd: ToolCommand, timeout: Timeout) -> Result<(), ActionError> {
        let out = self.exec.run(&cmd, timeout)?;
        if out.success() {
            return Ok(());
        }
        tracing::warn!(command = %cmd.render(), code = ?out.code, stderr = %out.stderr.trim(), "{what} failed");
        Err(ActionError::ToolFailed { what, stderr: out.stderr })
    }
}

struct Strategy {
    name:            &'static str,
    command:         ToolCommand,
    timeout:         Timeout,
    success_message: String,
}

fn raid_strategies(filesystem: &str, profile: Profile) -> Vec<Strategy> {
    vec![
        Strategy {
            name:            "resize",
            command:         ToolCommand::new("btrfs")
                .args(["filesystem", "resize"])
                .arg(format!("{profile}:"))
                .arg(filesystem),
            timeout:         Timeout::Long,
            success_message: format!("Successfully changed RAID profile to {profile}"),
        },
        Strategy {
            name:            "balance",
            command:         ToolCommand::new("btrfs")
                .args(["balance", "start", "--bg"])
                .arg(format!("-dconvert={profile}"))
                .arg(format!("-mconvert={profile}"))
                .arg(filesystem),
            timeout:         Timeout::Long,
            success_message: format!("Successfully started RAID conversion to {profile} (balance)"),
        },
    ]
}

/// Reject values that are empty, contain NUL, or would be read as an option.
fn identifier<'s>(field: &str, value: &'s str) -> Result<&'s str, ActionError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ActionError::InvalidInput(format!("{field} is required")));
    }
    if v.starts_with('-') || v.contains('\0') {
        return Err(ActionError::InvalidInput(format!("invalid {field}: {v:?}")));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptedExecutor;
    use crate::exec::CommandOutput;

    const FINDMNT: &str = "findmnt -t btrfs -n -r -o TARGET,SOURCE,UUID,OPTIONS";
    const UUID: &str = "0123abcd-1111-2222-3333-444455556666";

    fn cfg_in(root: &std::path::Path) -> ActionsConfig {
        ActionsConfig { mount_root: root.to_path_buf(), ..ActionsConfig::default() }
    }

    #[test]
    fn mount_creates_dir_and_mounts() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = cfg_in(dir.path());
        let target = dir.path().join("btrfs_0123abcd");
        let exec = ScriptedExecutor::new()
            .reply(&format!("blkid -U {UUID}"), CommandOutput::ok("/dev/sdb1\n"))
            .reply(&format!("mount /dev/sdb1 {}", target.display()), CommandOutput::ok(""));

        let msg = Orchestrator::new(&exec, &cfg).mount(UUID).unwrap();
        assert!(target.is_dir());
        assert!(msg.contains("/dev/sdb1"));

        // Directory already present: still fine.
        Orchestrator::new(&exec, &cfg).mount(UUID).unwrap();
    }

    #[test]
    fn mount_with_unknown_uuid_never_mounts() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = cfg_in(dir.path());
        let exec = ScriptedExecutor::new().reply(&format!("blkid -U {UUID}"), CommandOutput::failed(2, ""));

        let err = Orchestrator::new(&exec, &cfg).mount(UUID).unwrap_err();
        assert_eq!(err.status(), 404);
        assert!(!exec.was_called("mount"));
        assert!(!dir.path().join("btrfs_0123abcd").exists());
    }

    #[test]
    fn mount_failure_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = cfg_in(dir.path());
        let target = dir.path().join("btrfs_0123abcd");
        let exec = ScriptedExecutor::new()
            .reply(&format!("blkid -U {UUID}"), CommandOutput::ok("/dev/sdb1"))
            .reply(
                &format!("mount /dev/sdb1 {}", target.display()),
                CommandOutput::failed(32, "mount: wrong fs type"),
            );

        let err = Orchestrator::new(&exec, &cfg).mount(UUID).unwrap_err();
        assert_eq!(err.status(), 500);
        assert_eq!(err.to_string(), "Mount failed: mount: wrong fs type");
        // The directory is left behind.
        assert!(target.is_dir());
    }

    #[test]
    fn unmount_resolves_through_mount_table() {
        let cfg = ActionsConfig::default();
        let exec = ScriptedExecutor::new()
            .reply(FINDMNT, CommandOutput::ok(&format!("/data /dev/sdb1 {UUID} rw\n")))
            .reply("umount /data", CommandOutput::ok(""));
        let msg = Orchestrator::new(&exec, &cfg).unmount(UUID).unwrap();
        assert_eq!(msg, "Successfully unmounted /data");
    }

    #[test]
    fn unmount_of_unmounted_is_not_found() {
        let cfg = ActionsConfig::default();
        let exec = ScriptedExecutor::new().reply(FINDMNT, CommandOutput::failed(1, ""));
        let err = Orchestrator::new(&exec, &cfg).unmount(UUID).unwrap_err();
        assert_eq!(err.status(), 404);
        assert!(!exec.was_called("umount"));
    }

    #[test]
    fn add_device_requires_mounted_filesystem() {
        let cfg = ActionsConfig::default();
        let exec = ScriptedExecutor::new()
            .reply(&format!("blkid -U {UUID}"), CommandOutput::ok("/dev/sdb1"))
            .reply(FINDMNT, CommandOutput::ok("/other /dev/sdc other-uuid rw\n"));
        let err = Orchestrator::new(&exec, &cfg).add_device("/dev/sdd", UUID).unwrap_err();
        assert!(matches!(err, ActionError::NotMounted(_)));
        assert_eq!(err.status(), 400);
        assert!(!exec.was_called("btrfs device add"));
    }

    #[test]
    fn add_device_runs_btrfs_device_add() {
        let cfg = ActionsConfig::default();
        let exec = ScriptedExecutor::new()
            .reply(&format!("blkid -U {UUID}"), CommandOutput::ok("/dev/sdb1"))
            .reply(FINDMNT, CommandOutput::ok(&format!("/data /dev/sdb1 {UUID} rw\n")))
            .reply("btrfs device add /dev/sdd /data", CommandOutput::ok(""));
        Orchestrator::new(&exec, &cfg).add_device("/dev/sdd", UUID).unwrap();
        assert!(exec.was_called("btrfs device add /dev/sdd /data"));
    }

    #[test]
    fn invalid_profile_runs_nothing() {
        let cfg = ActionsConfig::default();
        let exec = ScriptedExecutor::new();
        let err = Orchestrator::new(&exec, &cfg).change_raid("/data", "raid9").unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn raid_falls_back_to_balance() {
        let cfg = ActionsConfig::default();
        let exec = ScriptedExecutor::new()
            .reply("btrfs filesystem resize raid1: /data", CommandOutput::failed(1, "ERROR: invalid size"))
            .reply(
                "btrfs balance start --bg -dconvert=raid1 -mconvert=raid1 /data",
                CommandOutput::ok("Started balance"),
            );
        let msg = Orchestrator::new(&exec, &cfg).change_raid("/data", "raid1").unwrap();
        assert!(msg.contains("balance"));
        assert_eq!(exec.calls().len(), 2);
    }

    #[test]
    fn raid_primary_success_skips_fallback() {
        let cfg = ActionsConfig::default();
        let exec = ScriptedExecutor::new()
            .reply("btrfs filesystem resize raid0: /data", CommandOutput::ok(""));
        let msg = Orchestrator::new(&exec, &cfg).change_raid("/data", "raid0").unwrap();
        assert_eq!(msg, "Successfully changed RAID profile to raid0");
        assert!(!exec.was_called("btrfs balance"));
    }

    #[test]
    fn raid_reports_every_attempt_when_both_fail() {
        let cfg = ActionsConfig::default();
        let exec = ScriptedExecutor::new()
            .reply("btrfs filesystem resize raid5: /data", CommandOutput::failed(1, "bad size"))
            .reply(
                "btrfs balance start --bg -dconvert=raid5 -mconvert=raid5 /data",
                CommandOutput::failed(1, "not enough devices"),
            );
        match Orchestrator::new(&exec, &cfg).change_raid("/data", "raid5").unwrap_err() {
            ActionError::AllStrategiesFailed { attempts, .. } => {
                let names: Vec<&str> = attempts.iter().map(|a| a.strategy).collect();
                assert_eq!(names, ["resize", "balance"]);
                assert_eq!(
                    attempts[1].outcome,
                    AttemptOutcome::Exited { code: Some(1), stderr: "not enough devices".into() }
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn mkfs_with_and_without_label() {
        let cfg = ActionsConfig::default();
        let exec = ScriptedExecutor::new()
            .reply("mkfs.btrfs -L data /dev/sdx", CommandOutput::ok(""))
            .reply("mkfs.btrfs /dev/sdy", CommandOutput::failed(1, "/dev/sdy appears to contain an existing filesystem"));
        let o = Orchestrator::new(&exec, &cfg);
        assert!(o.create_filesystem("/dev/sdx", Some("data")).is_ok());
        let err = o.create_filesystem("/dev/sdy", Some("")).unwrap_err();
        assert!(err.to_string().contains("existing filesystem"));
    }

    #[test]
    fn snapshot_create_and_delete() {
        let cfg = ActionsConfig::default();
        let exec = ScriptedExecutor::new()
            .reply("snapper -c root create --description Created via btrdash", CommandOutput::ok(""))
            .reply("snapper -c root create --description before upgrade", CommandOutput::ok(""))
            .reply("snapper -c root delete 42", CommandOutput::failed(1, "Snapshot '42' not found."));
        let o = Orchestrator::new(&exec, &cfg);
        o.create_snapshot("root", None).unwrap();
        o.create_snapshot("root", Some("before upgrade")).unwrap();
        let err = o.delete_snapshot("root", "42").unwrap_err();
        assert_eq!(err.to_string(), "Deletion failed: Snapshot '42' not found.");
    }

    #[test]
    fn option_like_values_are_rejected() {
        let cfg = ActionsConfig::default();
        let exec = ScriptedExecutor::new();
        let o = Orchestrator::new(&exec, &cfg);
        assert_eq!(o.create_filesystem("-f", None).unwrap_err().status(), 400);
        assert_eq!(o.create_filesystem("/dev/sdx", Some("--force")).unwrap_err().status(), 400);
        assert_eq!(o.delete_snapshot("root", "").unwrap_err().status(), 400);
        assert_eq!(o.change_raid("--help", "raid1").unwrap_err().status(), 400);
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn read_only_blocks_everything() {
        let cfg = ActionsConfig { read_only: true, ..ActionsConfig::default() };
        let exec = ScriptedExecutor::new();
        let o = Orchestrator::new(&exec, &cfg);
        assert!(matches!(o.mount(UUID), Err(ActionError::ReadOnly)));
        assert!(matches!(o.create_filesystem("/dev/sdx", None), Err(ActionError::ReadOnly)));
        assert!(matches!(o.change_raid("/data", "raid1"), Err(ActionError::ReadOnly)));
        assert!(exec.calls().is_empty());
    }
}
