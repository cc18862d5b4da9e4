use crate::exec::{ExecError, Executor, Timeout, ToolCommand};

/// Resolve a filesystem UUID to a device path with `blkid -U`.
///
/// `Ok(None)` when blkid knows no such UUID.
pub fn device_for_uuid(exec: &dyn Executor, uuid: &str) -> Result<Option<String>, ExecError> {
    let out = exec.run(&ToolCommand::new("blkid").args(["-U", uuid]), Timeout::Short)?;
    let path = out.stdout.lines().next().unwrap_or("").trim();
    if !out.success() || path.is_empty() {
        return Ok(None);
    }
    Ok(Some(path.to_string()))
}
