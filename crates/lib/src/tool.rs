//! External tool invocation.
//!
//! Every external program the recipe drives (the patch tool, `configure.py`,
//! Bazel, the formatter) goes through the `ToolRunner` seam so the
//! orchestration can be exercised with tools stubbed out.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Errors raised by external tools.
#[derive(Debug, Error)]
pub enum ToolError {
  /// The program could not be started at all.
  #[error("failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The program ran and exited unsuccessfully.
  #[error("command failed with exit code {code:?}: {command}\n{output}")]
  Failed {
    command: String,
    code: Option<i32>,
    output: String,
  },
}

/// A single external command line with its environment overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
  /// Variables set on top of the inherited environment.
  pub env: BTreeMap<String, String>,
  pub cwd: Option<PathBuf>,
}

impl Invocation {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      ..Default::default()
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
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

  pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
    self
      .env
      .extend(env.iter().map(|(key, value)| (key.clone(), value.clone())));
    self
  }

  pub fn current_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  /// Whether the argument list contains `arg` verbatim.
  pub fn has_arg(&self, arg: &str) -> bool {
    self.args.iter().any(|a| a == arg)
  }
}

impl fmt::Display for Invocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      write!(f, " {}", arg)?;
    }
    Ok(())
  }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl ToolOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }

  /// Stdout followed by stderr, the way a terminal would show them.
  pub fn combined(&self) -> String {
    match (self.stdout.is_empty(), self.stderr.is_empty()) {
      (true, _) => self.stderr.clone(),
      (false, true) => self.stdout.clone(),
      (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
    }
  }

  /// Turn a non-zero exit into `ToolError::Failed` for `invocation`.
  pub fn check(self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
    if self.success() {
      return Ok(self);
    }
    Err(ToolError::Failed {
      command: invocation.to_string(),
      code: self.code,
      output: self.combined(),
    })
  }
}

/// Runs external commands.
///
/// Implementations return `Ok` for every exit status; only failures to start
/// the program are errors. Callers decide which exits are fatal.
pub trait ToolRunner {
  fn run(&self, invocation: &Invocation) -> impl Future<Output = Result<ToolOutput, ToolError>>;
}

/// `ToolRunner` backed by real child processes.
///
/// Unlike an isolated build sandbox the child inherits the parent
/// environment: Bazel and `configure.py` need `PATH`, `HOME` and the user's
/// toolchain setup.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
  async fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
    info!(cmd = %invocation, "executing command");

    let mut command = Command::new(&invocation.program);
    command.args(&invocation.args).envs(&invocation.env);
    if let Some(cwd) = &invocation.cwd {
      command.current_dir(cwd);
    }

    debug!(cwd = ?invocation.cwd, env = ?invocation.env.keys().collect::<Vec<_>>(), "spawning process");

    let output = command.output().await.map_err(|source| ToolError::Spawn {
      program: invocation.program.clone(),
      source,
    })?;

    let result = ToolOutput {
      code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).to_string(),
      stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };

    if !result.stdout.is_empty() {
      debug!(stdout = %result.stdout.trim_end(), "command stdout");
    }
    if !result.stderr.is_empty() {
      debug!(stderr = %result.stderr.trim_end(), "command stderr");
    }

    Ok(result)
  }
}
