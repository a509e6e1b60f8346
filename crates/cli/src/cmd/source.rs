//! Implementation of the `litepack source` command.

use anyhow::{Context, Result};

use litepack_lib::provision::HttpDownloader;

use super::{RecipeArgs, runtime};
use crate::output::{OutputFormat, print_json, print_provision_report, print_stat};

/// Fetch the Bazel installer, triSYCL and the TensorFlow sources into the
/// work directory. Anything already present is left alone.
pub fn cmd_source(args: &RecipeArgs, format: OutputFormat) -> Result<()> {
  let recipe = args.recipe()?;
  let downloader = HttpDownloader::new();

  let report = runtime()?
    .block_on(recipe.source(&downloader))
    .context("Failed to fetch sources")?;

  if format.is_json() {
    return print_json(&report);
  }

  print_provision_report(&report);
  print_stat("Work dir", &recipe.config.work_dir.display().to_string());
  Ok(())
}
