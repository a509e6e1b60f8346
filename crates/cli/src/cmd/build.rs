//! Implementation of the `litepack build` command.

use std::time::Instant;

use anyhow::{Context, Result};

use litepack_lib::diagnostic::IndentationErrorClassifier;
use litepack_lib::tool::ProcessRunner;

use super::{RecipeArgs, runtime};
use crate::output::{OutputFormat, Status, format_duration, print_build_report, print_json, print_status};

/// Patch, configure and build the libraries in the work directory.
pub fn cmd_build(args: &RecipeArgs, format: OutputFormat) -> Result<()> {
  let recipe = args.recipe()?;
  let started = Instant::now();

  let report = runtime()?
    .block_on(recipe.build(&ProcessRunner, &IndentationErrorClassifier))
    .with_context(|| format!("Build failed for {}", recipe.platform))?;

  if format.is_json() {
    return print_json(&report);
  }

  print_status(
    Status::Done,
    &format!(
      "Built {} in {}",
      recipe.platform,
      format_duration(started.elapsed())
    ),
  );
  print_build_report(&report);
  Ok(())
}
