use crate::exec::{CommandOutput, ExecError};
use std::fmt;
use thiserror::Error;

/// One tried command of a multi-strategy action.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub strategy: &'static str,
    pub command:  String,
    pub outcome:  AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Succeeded,
    Exited { code: Option<i32>, stderr: String },
    NotRun(String),
}

impl AttemptOutcome {
    pub fn from_output(out: &CommandOutput) -> Self {
        if out.success() {
            AttemptOutcome::Succeeded
        } else {
            AttemptOutcome::Exited { code: out.code, stderr: out.stderr.trim().to_string() }
        }
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            AttemptOutcome::Succeeded => write!(f, "{}: ok", self.strategy),
            AttemptOutcome::Exited { code: Some(c), stderr } => {
                write!(f, "{} (`{}`) exited {}: {}", self.strategy, self.command, c, stderr)
            }
            AttemptOutcome::Exited { code: None, stderr } => {
                write!(f, "{} (`{}`) killed by signal: {}", self.strategy, self.command, stderr)
            }
            AttemptOutcome::NotRun(why) => {
                write!(f, "{} (`{}`) could not run: {}", self.strategy, self.command, why)
            }
        }
    }
}

/// Why a mutating action was refused or failed.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NotMounted(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("actions are disabled (read_only = true)")]
    ReadOnly,

    #[error("{what} failed: {stderr}")]
    ToolFailed { what: &'static str, stderr: String },

    #[error("{what} failed: {}", join_attempts(.attempts))]
    AllStrategiesFailed { what: &'static str, attempts: Vec<Attempt> },

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_attempts(attempts: &[Attempt]) -> String {
    attempts.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl ActionError {
    /// HTTP-style status for the route layer.
    pub fn status(&self) -> u16 {
        match self {
            ActionError::NotFound(_)                    => 404,
            ActionError::Exec(e) if e.is_tool_missing() => 404,
            ActionError::Exec(ExecError::TimedOut { .. }) => 504,
            ActionError::NotMounted(_)                  => 400,
            ActionError::InvalidInput(_)                => 400,
            ActionError::ReadOnly                       => 403,
            _                                           => 500,
        }
    }
}
