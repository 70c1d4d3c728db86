//! Building program specs from commands.

use crate::error::{CoreError, Result};
use guestrun_vim::ProgramSpec;

/// A command to run in the guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestCommand {
    /// Raw command line, split on whitespace.
    ///
    /// Lossy: runs of whitespace collapse to single spaces and quoting is
    /// not understood, so an argument cannot contain a space.
    Line(String),
    /// Executable plus separate arguments, each quoted for a POSIX shell.
    Argv {
        /// Executable path.
        program: String,
        /// Arguments, passed through verbatim.
        args: Vec<String>,
    },
}

impl GuestCommand {
    /// Create an argv-style command.
    pub fn argv<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Argv {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build the program spec for this command.
    pub fn to_program_spec(&self) -> Result<ProgramSpec> {
        match self {
            Self::Line(line) => split_command_line(line),
            Self::Argv { program, args } => {
                if program.trim().is_empty() {
                    return Err(CoreError::InvalidCommand("empty program path".into()));
                }
                let arguments = shlex::try_join(args.iter().map(String::as_str))
                    .map_err(|e| CoreError::InvalidCommand(e.to_string()))?;
                Ok(ProgramSpec::new(program.clone(), arguments))
            }
        }
    }
}

impl From<&str> for GuestCommand {
    fn from(line: &str) -> Self {
        Self::Line(line.to_string())
    }
}

impl From<String> for GuestCommand {
    fn from(line: String) -> Self {
        Self::Line(line)
    }
}

/// Split a command line into executable and a single-space-joined argument string.
pub fn split_command_line(line: &str) -> Result<ProgramSpec> {
    let mut tokens = line.split_whitespace();
    let program = tokens
        .next()
        .ok_or_else(|| CoreError::InvalidCommand("empty command line".into()))?;
    let arguments = tokens.collect::<Vec<_>>().join(" ");
    Ok(ProgramSpec::new(program, arguments))
}
