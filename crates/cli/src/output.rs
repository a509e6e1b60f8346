//! Terminal rendering for litepack's reports.
//!
//! Every command prints either the lib's report as JSON or the text form
//! built here. Status lines go to stdout, except errors and warnings which go
//! to stderr next to the tracing output.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use litepack_lib::build::BuildReport;
use litepack_lib::package::{PackageInfo, PackageReport};
use litepack_lib::patch::PatchOutcome;
use litepack_lib::provision::ProvisionReport;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const ARROW: &str = "→";
}

/// Leading marker of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  Done,
  Skipped,
  Warning,
  Failed,
}

impl Status {
  fn symbol(self) -> &'static str {
    match self {
      Status::Done => "✓",
      Status::Skipped => "•",
      Status::Warning => "⚠",
      Status::Failed => "✗",
    }
  }

  fn stream(self) -> Stream {
    match self {
      Status::Done | Status::Skipped => Stream::Stdout,
      Status::Warning | Status::Failed => Stream::Stderr,
    }
  }
}

pub fn print_status(status: Status, message: &str) {
  let stream = status.stream();
  let symbol = status.symbol();
  let line = match status {
    Status::Done => format!("{} {}", symbol.if_supports_color(stream, |s| s.green()), message),
    Status::Skipped => format!("{} {}", symbol.if_supports_color(stream, |s| s.blue()), message),
    Status::Warning => format!(
      "{} {}",
      symbol.if_supports_color(stream, |s| s.yellow()),
      message.if_supports_color(stream, |s| s.yellow())
    ),
    Status::Failed => format!(
      "{} {}",
      symbol.if_supports_color(stream, |s| s.red()),
      message.if_supports_color(stream, |s| s.red())
    ),
  };
  match stream {
    Stream::Stdout => println!("{}", line),
    _ => eprintln!("{}", line),
  }
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Elapsed time rounded to whole seconds once it passes a second, e.g. `3m 12s`.
pub fn format_duration(duration: Duration) -> String {
  let rounded = if duration.as_secs() > 0 {
    Duration::from_secs(duration.as_secs())
  } else {
    Duration::from_millis(duration.subsec_millis() as u64)
  };
  humantime::format_duration(rounded).to_string()
}

/// Text for a patch outcome; `None` when it deserves a warning instead.
fn patch_label(outcome: &PatchOutcome) -> Option<&'static str> {
  match outcome {
    PatchOutcome::Applied => Some("applied"),
    PatchOutcome::AlreadyApplied => Some("already applied"),
    PatchOutcome::Unrecognized(_) => None,
  }
}

pub fn print_provision_report(report: &ProvisionReport) {
  if report.fetched.is_empty() {
    print_status(Status::Skipped, "All sources already present");
  } else {
    print_status(Status::Done, &format!("Fetched {}", report.fetched.join(", ")));
  }
}

pub fn print_build_report(report: &BuildReport) {
  match patch_label(&report.patch) {
    Some(label) => print_stat("Patch", label),
    None => print_status(Status::Warning, "Source patch did not apply, see log"),
  }
  if let Some(repaired) = &report.repaired {
    print_stat(
      "Repaired",
      &format!("{} ({} lines removed)", repaired.path.display(), repaired.removed_lines),
    );
  }
  print_stat("Command", &report.invocation);
}

/// Counts, plus each copied library when `verbose`.
pub fn print_package_report(report: &PackageReport, verbose: bool) {
  print_stat("Libraries", &report.libraries.len().to_string());
  print_stat("Headers", &report.headers.to_string());
  if verbose {
    for library in &report.libraries {
      println!("    {} {}", symbols::ARROW, library.display());
    }
  }
}

pub fn print_package_info(info: &PackageInfo) {
  println!("{} {}", info.name, info.version);
  print_stat("Libs", &info.libs.join(" "));
  print_stat("Lib dirs", &info.lib_dirs.join(" "));
  print_stat("Include dirs", &info.include_dirs.join(" "));
}
