//! Repair of the Bazel file named by a recognized diagnostic.
//!
//! The defective file carries a stray `pass` statement at the wrong
//! indentation. Dropping those lines and reformatting the file makes Bazel
//! load it again.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::FormatterConfig;
use crate::tool::{Invocation, ToolError, ToolRunner};

#[derive(Debug, Error)]
pub enum RepairError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to rewrite {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("formatter failed on {path}: {source}")]
  Formatter {
    path: PathBuf,
    #[source]
    source: ToolError,
  },
}

/// Summary of a repaired file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairReport {
  pub path: PathBuf,
  pub removed_lines: usize,
}

/// Drop every line ending in ` pass`, returning the new text and how many
/// lines went away. Line endings of the kept lines are preserved.
pub fn strip_stray_pass(text: &str) -> (String, usize) {
  let mut kept = String::with_capacity(text.len());
  let mut removed = 0;

  for line in text.split_inclusive('\n') {
    if line.trim_end().ends_with(" pass") {
      removed += 1;
    } else {
      kept.push_str(line);
    }
  }

  (kept, removed)
}

/// Rewrite `path` without stray `pass` lines, then run the formatter over it.
pub async fn repair_build_file(
  runner: &impl ToolRunner,
  path: &Path,
  formatter: &FormatterConfig,
) -> Result<RepairReport, RepairError> {
  let original = std::fs::read_to_string(path).map_err(|source| RepairError::Read {
    path: path.to_path_buf(),
    source,
  })?;

  let (fixed, removed_lines) = strip_stray_pass(&original);
  std::fs::write(path, fixed).map_err(|source| RepairError::Write {
    path: path.to_path_buf(),
    source,
  })?;

  info!(path = %path.display(), removed_lines, "fixing build file");

  let path_arg = path.to_string_lossy().into_owned();
  let mut commands = Vec::new();
  if let Some(pip) = &formatter.pip {
    commands.push(Invocation::new(pip).args(["install", "--upgrade", formatter.program.as_str()]));
  }
  commands.push(Invocation::new(&formatter.program).args(["--in-place", path_arg.as_str()]));

  for invocation in &commands {
    runner
      .run(invocation)
      .await
      .and_then(|output| output.check(invocation))
      .map_err(|source| RepairError::Formatter {
        path: path.to_path_buf(),
        source,
      })?;
  }

  Ok(RepairReport {
    path: path.to_path_buf(),
    removed_lines,
  })
}
