//! Test utilities for litepack-lib.
//!
//! Cross-platform shell helpers plus recording doubles for the external
//! tool and download seams.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::provision::{Downloader, ProvisionError};
use crate::tool::{Invocation, ToolError, ToolOutput, ToolRunner};

/// Returns the shell command and args to echo an environment variable.
#[cfg(unix)]
pub fn shell_echo_env(var: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), format!("echo \"${}\"", var)])
}

#[cfg(windows)]
pub fn shell_echo_env(var: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), format!("echo %{}%", var)])
}

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

/// Returns the command and args to create a marker file in the current directory.
#[cfg(unix)]
pub fn touch_file(filename: &str) -> (&'static str, Vec<String>) {
  ("/usr/bin/touch", vec![filename.to_string()])
}

#[cfg(windows)]
pub fn touch_file(filename: &str) -> (&'static str, Vec<String>) {
  (
    "powershell.exe",
    vec![
      "-NoProfile".to_string(),
      "-Command".to_string(),
      format!("New-Item -ItemType File -Path '{}' -Force | Out-Null", filename),
    ],
  )
}

pub fn ok_output(stdout: &str) -> ToolOutput {
  ToolOutput {
    code: Some(0),
    stdout: stdout.to_string(),
    stderr: String::new(),
  }
}

pub fn failed_output(code: i32, stderr: &str) -> ToolOutput {
  ToolOutput {
    code: Some(code),
    stdout: String::new(),
    stderr: stderr.to_string(),
  }
}

struct Rule {
  needle: String,
  output: ToolOutput,
  once: bool,
}

/// `ToolRunner` that records every invocation and answers from canned rules.
///
/// Rules match when the rendered command line contains the needle. One-shot
/// rules are consulted first and consumed on use; anything unmatched succeeds
/// with empty output.
#[derive(Default)]
pub struct RecordingRunner {
  rules: Mutex<Vec<Rule>>,
  calls: Mutex<Vec<Invocation>>,
}

impl RecordingRunner {
  pub fn new() -> Self {
    Self::default()
  }

  /// Answer every matching command with `output`.
  pub fn on(self, needle: &str, output: ToolOutput) -> Self {
    self.push_rule(needle, output, false);
    self
  }

  /// Answer the next matching command with `output`.
  pub fn once(self, needle: &str, output: ToolOutput) -> Self {
    self.push_rule(needle, output, true);
    self
  }

  fn push_rule(&self, needle: &str, output: ToolOutput, once: bool) {
    self.rules.lock().unwrap().push(Rule {
      needle: needle.to_string(),
      output,
      once,
    });
  }

  pub fn calls(&self) -> Vec<Invocation> {
    self.calls.lock().unwrap().clone()
  }

  /// Rendered command lines, in call order.
  pub fn commands(&self) -> Vec<String> {
    self.calls().iter().map(|c| c.to_string()).collect()
  }

  pub fn count_matching(&self, needle: &str) -> usize {
    self.commands().iter().filter(|c| c.contains(needle)).count()
  }
}

impl ToolRunner for RecordingRunner {
  async fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
    let rendered = invocation.to_string();
    self.calls.lock().unwrap().push(invocation.clone());

    let mut rules = self.rules.lock().unwrap();
    if let Some(pos) = rules.iter().position(|r| r.once && rendered.contains(&r.needle)) {
      return Ok(rules.remove(pos).output);
    }
    if let Some(rule) = rules.iter().find(|r| !r.once && rendered.contains(&r.needle)) {
      return Ok(rule.output.clone());
    }
    Ok(ok_output(""))
  }
}

/// `Downloader` that fabricates files and extracted directories locally.
///
/// `layout` maps archive URLs to the top-level directory the archive would
/// unpack to.
#[derive(Default)]
pub struct FakeDownloader {
  layout: BTreeMap<String, String>,
  calls: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeDownloader {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_archive(mut self, url: &str, top_dir: &str) -> Self {
    self.layout.insert(url.to_string(), top_dir.to_string());
    self
  }

  pub fn calls(&self) -> Vec<(String, PathBuf)> {
    self.calls.lock().unwrap().clone()
  }
}

impl Downloader for FakeDownloader {
  async fn download(&self, url: &str, dest: &Path, _sha256: Option<&str>) -> Result<(), ProvisionError> {
    self.calls.lock().unwrap().push((url.to_string(), dest.to_path_buf()));
    std::fs::write(dest, format!("downloaded from {}", url)).map_err(|source| ProvisionError::Io {
      path: dest.to_path_buf(),
      source,
    })
  }

  async fn download_archive(&self, url: &str, dest_dir: &Path, _sha256: Option<&str>) -> Result<(), ProvisionError> {
    self.calls.lock().unwrap().push((url.to_string(), dest_dir.to_path_buf()));
    let top = self.layout.get(url).cloned().unwrap_or_else(|| "archive".to_string());
    let root = dest_dir.join(top);
    std::fs::create_dir_all(&root)
      .and_then(|_| std::fs::write(root.join("README"), url))
      .map_err(|source| ProvisionError::Io { path: root, source })
  }
}
