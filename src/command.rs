//! Command sequences and exit status.

use std::fmt;

/// Shell operator joining sequence entries; the remote shell stops at the
/// first failing step.
const AND_OPERATOR: &str = " && ";

/// One command, or an ordered list of commands run fail-fast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSequence {
    Single(String),
    Sequence(Vec<String>),
}

impl CommandSequence {
    /// Render the string submitted to the remote shell.
    ///
    /// Blank sequence entries are skipped so the joined text never ends in,
    /// or doubles up, a dangling `&&`.
    pub fn to_shell(&self) -> String {
        match self {
            CommandSequence::Single(command) => command.clone(),
            CommandSequence::Sequence(commands) => commands
                .iter()
                .map(String::as_str)
                .filter(|c| !c.trim().is_empty())
                .collect::<Vec<_>>()
                .join(AND_OPERATOR),
        }
    }

    /// True when there is nothing to run: a blank command, or a sequence
    /// whose entries are all blank.
    pub fn is_empty(&self) -> bool {
        match self {
            CommandSequence::Single(command) => command.trim().is_empty(),
            CommandSequence::Sequence(commands) => commands.iter().all(|c| c.trim().is_empty()),
        }
    }
}

impl fmt::Display for CommandSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell())
    }
}

impl From<&str> for CommandSequence {
    fn from(command: &str) -> Self {
        CommandSequence::Single(command.to_string())
    }
}

impl From<String> for CommandSequence {
    fn from(command: String) -> Self {
        CommandSequence::Single(command)
    }
}

impl From<Vec<String>> for CommandSequence {
    fn from(commands: Vec<String>) -> Self {
        CommandSequence::Sequence(commands)
    }
}

impl From<Vec<&str>> for CommandSequence {
    fn from(commands: Vec<&str>) -> Self {
        CommandSequence::Sequence(commands.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for CommandSequence {
    fn from(commands: &[&str]) -> Self {
        CommandSequence::Sequence(commands.iter().map(|c| c.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CommandSequence {
    fn from(commands: [&str; N]) -> Self {
        CommandSequence::Sequence(commands.iter().map(|c| c.to_string()).collect())
    }
}

/// Exit status of the last command, as reported by the gateway.
///
/// Transports that cannot recover a numeric code report `Boolean`; callers
/// that only care about success treat both through [`ExitStatus::success`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Code(i32),
    Boolean(bool),
}

impl ExitStatus {
    /// Whether the command succeeded: code `0`, or `Boolean(true)`.
    pub fn success(&self) -> bool {
        match self {
            ExitStatus::Code(code) => *code == 0,
            ExitStatus::Boolean(ok) => *ok,
        }
    }

    /// Numeric exit code, when the transport reported one.
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Code(code) => Some(*code),
            ExitStatus::Boolean(_) => None,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Code(code) => write!(f, "exit code {}", code),
            ExitStatus::Boolean(true) => write!(f, "succeeded"),
            ExitStatus::Boolean(false) => write!(f, "failed"),
        }
    }
}
