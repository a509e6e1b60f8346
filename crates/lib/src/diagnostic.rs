//! Classification of configuration probe output.
//!
//! After configuring for an NDK target, TensorFlow 1.14.0 ships a BUILD file
//! that Bazel rejects with an indentation error. The classifier decides
//! whether a failed probe is that known defect (and which file carries it)
//! or something the recipe cannot fix.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::tool::ToolOutput;

/// Verdict on the output of a probe command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Diagnosis {
  NoError,
  /// A known defect in the named file that `repair` can fix.
  RecognizedRepairable(PathBuf),
  /// Any other failure, with the probe's output.
  Other(String),
}

pub trait DiagnosticClassifier {
  fn classify(&self, output: &ToolOutput) -> Diagnosis;
}

static INDENTATION_ERROR: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?m)ERROR: ([^:\n]+):[0-9]+:[0-9]+: indentation error").unwrap());

/// Recognizes Bazel's `ERROR: <file>:<line>:<col>: indentation error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndentationErrorClassifier;

impl DiagnosticClassifier for IndentationErrorClassifier {
  fn classify(&self, output: &ToolOutput) -> Diagnosis {
    if output.success() {
      return Diagnosis::NoError;
    }

    let text = output.combined();
    match INDENTATION_ERROR.captures(&text) {
      Some(caps) => Diagnosis::RecognizedRepairable(PathBuf::from(caps[1].trim())),
      None => Diagnosis::Other(text),
    }
  }
}
