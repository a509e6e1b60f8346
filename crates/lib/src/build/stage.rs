//! Build lifecycle stages.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
#[error("invalid build stage transition {from} -> {to}")]
pub struct StageError {
  pub from: BuildStage,
  pub to: BuildStage,
}

/// Where a build stands. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
  NotConfigured,
  Patched,
  Configured,
  /// A recognized configuration defect was fixed in place.
  Repaired,
  Built,
  Packaged,
}

impl BuildStage {
  pub fn as_str(&self) -> &'static str {
    match self {
      BuildStage::NotConfigured => "not_configured",
      BuildStage::Patched => "patched",
      BuildStage::Configured => "configured",
      BuildStage::Repaired => "repaired",
      BuildStage::Built => "built",
      BuildStage::Packaged => "packaged",
    }
  }

  /// Whether moving from `self` to `next` is allowed.
  ///
  /// `Repaired` is optional: `Configured` may go straight to `Built`.
  pub fn can_advance_to(&self, next: BuildStage) -> bool {
    matches!(
      (self, next),
      (BuildStage::NotConfigured, BuildStage::Patched)
        | (BuildStage::Patched, BuildStage::Configured)
        | (BuildStage::Configured, BuildStage::Repaired)
        | (BuildStage::Configured, BuildStage::Built)
        | (BuildStage::Repaired, BuildStage::Built)
        | (BuildStage::Built, BuildStage::Packaged)
    )
  }

  /// Move to `next`, logging the transition.
  pub fn advance(self, next: BuildStage) -> Result<BuildStage, StageError> {
    if !self.can_advance_to(next) {
      return Err(StageError { from: self, to: next });
    }
    info!(from = %self, to = %next, "build stage");
    Ok(next)
  }
}

impl fmt::Display for BuildStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
