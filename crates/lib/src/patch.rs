//! Source patching.
//!
//! The TensorFlow 1.14.0 GPU delegate does not compile as released; the fix
//! landed upstream after the release. The patch is applied before every
//! configuration run and must tolerate having been applied already.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::tool::{Invocation, ToolRunner};

#[derive(Debug, Error)]
pub enum PatchError {
  #[error("failed to write patch file {path}: {source}")]
  WriteDiff {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// A fixed diff and the file (relative to the source tree) it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
  pub name: &'static str,
  pub target: &'static str,
  pub diff: &'static str,
}

impl Patch {
  pub fn egl_context() -> Self {
    Self {
      name: "egl_context.patch",
      target: "tensorflow/lite/delegates/gpu/gl/egl_context.cc",
      diff: include_str!("../patches/egl_context.patch"),
    }
  }
}

/// What happened when a patch was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PatchOutcome {
  Applied,
  /// The reverse patch applies cleanly, so the tree already has the change.
  AlreadyApplied,
  /// Neither direction applies; the failure is logged and the build goes on.
  Unrecognized(String),
}

/// Apply `patch` to the tree at `source_dir`.
///
/// The diff is written to `<work_dir>/patches/` and fed to the `patch` tool.
/// A reverse dry run decides whether the tree already carries the change
/// before anything is modified. Only failing to write the diff is an error:
/// any tool failure becomes a tolerated `PatchOutcome`.
pub async fn apply_patch(
  runner: &impl ToolRunner,
  work_dir: &Path,
  source_dir: &Path,
  patch: &Patch,
) -> Result<PatchOutcome, PatchError> {
  let diff_path = write_diff(work_dir, patch)?;
  let diff_arg = diff_path.to_string_lossy().into_owned();

  let reverse_probe = Invocation::new("patch")
    .args(["-R", "--dry-run", "-s", "-f", "-i", diff_arg.as_str(), patch.target])
    .current_dir(source_dir);

  if let Ok(output) = runner.run(&reverse_probe).await
    && output.success()
  {
    info!(patch = patch.name, target = patch.target, "patch already applied");
    return Ok(PatchOutcome::AlreadyApplied);
  }

  let forward = Invocation::new("patch")
    .args(["-s", "-f", "-i", diff_arg.as_str(), patch.target])
    .current_dir(source_dir);

  let failure = match runner.run(&forward).await {
    Ok(output) if output.success() => {
      info!(patch = patch.name, target = patch.target, "patch applied");
      return Ok(PatchOutcome::Applied);
    }
    Ok(output) => output.combined(),
    Err(e) => e.to_string(),
  };

  warn!(patch = patch.name, output = %failure.trim(), "patch did not apply, continuing");
  Ok(PatchOutcome::Unrecognized(failure))
}

/// Write the diff under `work_dir` and return its absolute path; `patch`
/// runs inside the source tree, so a relative path would not resolve.
fn write_diff(work_dir: &Path, patch: &Patch) -> Result<PathBuf, PatchError> {
  let dir = work_dir.join("patches");
  let path = dir.join(patch.name);
  std::fs::create_dir_all(&dir)
    .and_then(|_| std::fs::write(&path, patch.diff))
    .and_then(|_| std::path::absolute(&path))
    .map_err(|source| PatchError::WriteDiff {
      path: path.clone(),
      source,
    })
}
