//! Implementation of the `litepack run` command.

use std::time::Instant;

use anyhow::{Context, Result};

use litepack_lib::diagnostic::IndentationErrorClassifier;
use litepack_lib::provision::HttpDownloader;
use litepack_lib::tool::ProcessRunner;

use super::{RecipeArgs, runtime};
use crate::output::{
  OutputFormat, Status, format_duration, print_build_report, print_json, print_package_report, print_provision_report,
  print_status,
};

/// Fetch, build and package in one go.
pub fn cmd_run(args: &RecipeArgs, format: OutputFormat, verbose: bool) -> Result<()> {
  let recipe = args.recipe()?;
  let started = Instant::now();

  let report = runtime()?
    .block_on(recipe.run_all(&HttpDownloader::new(), &ProcessRunner, &IndentationErrorClassifier))
    .with_context(|| format!("Recipe failed for {}", recipe.platform))?;

  if format.is_json() {
    return print_json(&report);
  }

  let info = recipe.package_info();
  print_provision_report(&report.provision);
  print_status(
    Status::Done,
    &format!(
      "{} {} {} in {}",
      info.name,
      info.version,
      report.stage,
      format_duration(started.elapsed())
    ),
  );
  print_build_report(&report.build);
  print_package_report(&report.package, verbose);
  Ok(())
}
