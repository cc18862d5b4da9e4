use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::io::{self, Read};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// An external tool invocation, always spawned as an argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args:    Vec<String>,
}

impl ToolCommand {
    pub fn new(program: &str) -> Self {
        Self { program: program.to_string(), args: Vec::new() }
    }

    pub fn arg(mut self, a: impl Into<String>) -> Self {
        self.args.push(a.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Command line for logs and diagnostics. Not meant to be re-parsed.
    pub fn render(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured result of a finished process. A non-zero exit is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub code:   Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool { self.code == Some(0) }
}

#[cfg(test)]
impl CommandOutput {
    pub fn ok(stdout: &str) -> Self {
        Self { code: Some(0), stdout: stdout.to_string(), stderr: String::new() }
    }

    pub fn failed(code: i32, stderr: &str) -> Self {
        Self { code: Some(code), stdout: String::new(), stderr: stderr.to_string() }
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source:  io::Error,
    },

    #[error("`{command}` timed out after {after:?}")]
    TimedOut { command: String, after: Duration },
}

impl ExecError {
    /// True when the tool itself is not installed.
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, ExecError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Which timeout budget an invocation runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Listing and lookup commands.
    Short,
    /// mkfs, device add, balance.
    Long,
}

pub trait Executor: Send + Sync {
    fn run(&self, cmd: &ToolCommand, timeout: Timeout) -> Result<CommandOutput, ExecError>;
}

const DEFAULT_CEILING: Duration = Duration::from_secs(3600);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs commands on the host with a bounded wait.
pub struct SystemExecutor {
    short: Duration,
    long:  Duration,
}

impl SystemExecutor {
    /// Timeouts in seconds; 0 selects the one hour ceiling.
    pub fn new(short_secs: u64, long_secs: u64) -> Self {
        Self { short: budget(short_secs), long: budget(long_secs) }
    }

    fn budget(&self, t: Timeout) -> Duration {
        match t {
            Timeout::Short => self.short,
            Timeout::Long  => self.long,
        }
    }
}

fn budget(secs: u64) -> Duration {
    if secs == 0 { DEFAULT_CEILING } else { Duration::from_secs(secs) }
}

impl Executor for SystemExecutor {
    fn run(&self, cmd: &ToolCommand, timeout: Timeout) -> Result<CommandOutput, ExecError> {
        let limit = self.budget(timeout);
        let start = Instant::now();
        let deadline = start + limit;

        // Own process group, so leftovers holding our pipes can be killed too.
        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .env("LC_ALL", "C")
            .process_group(0)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Spawn { program: cmd.program.clone(), source })?;

        let (tx, rx) = mpsc::channel();
        drain(Stream::Out, child.stdout.take(), tx.clone());
        drain(Stream::Err, child.stderr.take(), tx);

        let code = match wait_until(&mut child, deadline) {
            Ok(Some(code)) => code,
            Ok(None) => {
                tracing::warn!(command = %cmd.render(), ?limit, "command timed out, killing");
                terminate(&mut child);
                return Err(ExecError::TimedOut { command: cmd.render(), after: limit });
            }
            Err(source) => {
                terminate(&mut child);
                return Err(ExecError::Spawn { program: cmd.program.clone(), source });
            }
        };

        let mut captured = Captured::default();
        captured.collect(&rx, deadline);
        if !captured.complete() {
            tracing::warn!(command = %cmd.render(), "output still open after exit, killing leftover processes");
            kill_group(child.id());
            captured.collect(&rx, Instant::now() + DRAIN_GRACE);
        }

        tracing::debug!(
            command = %cmd.render(),
            code = ?code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "command finished"
        );

        Ok(CommandOutput {
            code,
            stdout: String::from_utf8_lossy(&captured.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&captured.stderr).into_owned(),
        })
    }
}

/// How long to wait for pipes to close once their holders were killed.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Poll until the child exits or the deadline passes. `Ok(None)` means timeout.
fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<Option<Option<i32>>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status.code()));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill the child's whole process group and reap the child.
fn terminate(child: &mut Child) {
    kill_group(child.id());
    let _ = child.kill();
    let _ = child.wait();
}

fn kill_group(leader: u32) {
    let Ok(pid) = i32::try_from(leader) else { return };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        tracing::debug!(pgid = pid, error = %e, "killpg failed");
    }
}

enum Stream {
    Out,
    Err,
}

/// Pipe contents received so far. Each stream arrives once, when it closes.
struct Captured {
    stdout:  Vec<u8>,
    stderr:  Vec<u8>,
    pending: u8,
}

impl Default for Captured {
    fn default() -> Self {
        Self { stdout: Vec::new(), stderr: Vec::new(), pending: 2 }
    }
}

impl Captured {
    fn complete(&self) -> bool { self.pending == 0 }

    fn collect(&mut self, rx: &Receiver<(Stream, Vec<u8>)>, deadline: Instant) {
        while self.pending > 0 {
            let left = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(left) {
                Ok((Stream::Out, buf)) => self.stdout = buf,
                Ok((Stream::Err, buf)) => self.stderr = buf,
                Err(_) => return,
            }
            self.pending -= 1;
        }
    }
}

fn drain<R: Read + Send + 'static>(which: Stream, pipe: Option<R>, tx: Sender<(Stream, Vec<u8>)>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut p) = pipe {
            let _ = p.read_to_end(&mut buf);
        }
        let _ = tx.send((which, buf));
    });
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Executor returning canned outputs keyed by rendered command line.
    /// Unscripted commands fail as if the tool were not installed.
    #[derive(Default)]
    pub struct ScriptedExecutor {
        replies: HashMap<String, CommandOutput>,
        delay:   Option<Duration>,
        calls:   Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        pub fn new() -> Self { Self::default() }

        pub fn reply(mut self, command: &str, out: CommandOutput) -> Self {
            self.replies.insert(command.to_string(), out);
            self
        }

        pub fn with_delay(mut self, d: Duration) -> Self {
            self.delay = Some(d);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        pub fn was_called(&self, prefix: &str) -> bool {
            self.calls().iter().any(|c| c.starts_with(prefix))
        }
    }

    impl Executor for ScriptedExecutor {
        fn run(&self, cmd: &ToolCommand, _timeout: Timeout) -> Result<CommandOutput, ExecError> {
            let line = cmd.render();
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(line.clone());
            }
            if let Some(d) = self.delay {
                thread::sleep(d);
            }
            self.replies.get(&line).cloned().ok_or_else(|| ExecError::Spawn {
                program: cmd.program.clone(),
                source:  io::Error::new(io::ErrorKind::NotFound, format!("unscripted: {line}")),
            })
        }
    }
}
