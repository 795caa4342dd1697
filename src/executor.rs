//! External command invocation abstraction.
//!
//! The build driver never mutates ambient process state: every subprocess
//! is described by an explicit [`Invocation`] record carrying its working
//! directory and the environment variables to scrub, and is run through the
//! [`CommandExecutor`] trait so tests can substitute a stub.

use camino::Utf8PathBuf;
use std::fmt;
use std::process::{Command, Output};

/// One fully-described subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Working directory for the subprocess.
    pub cwd: Utf8PathBuf,
    /// Inherited environment variables to remove before execution.
    ///
    /// Scoped replacement for mutating the driver's own environment; the
    /// variables stay set in the parent process.
    pub env_remove: Vec<String>,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (in {})", self.program, self.args.join(" "), self.cwd)
    }
}

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Run a command and return the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O error encountered while spawning or running the
    /// command. A command that runs but exits non-zero is not an error at
    /// this level; callers inspect `Output::status`.
    fn run(&self, invocation: &Invocation) -> std::io::Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, invocation: &Invocation) -> std::io::Result<Output> {
        log::debug!("running {invocation}");
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        cmd.current_dir(&invocation.cwd);
        for var in &invocation.env_remove {
            cmd.env_remove(var);
        }
        cmd.output()
    }
}
