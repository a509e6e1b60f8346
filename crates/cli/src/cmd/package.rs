//! Implementation of the `litepack package` command.

use anyhow::{Context, Result};

use super::RecipeArgs;
use crate::output::{OutputFormat, Status, print_json, print_package_report, print_status};

/// Copy built libraries and headers into the package directory.
pub fn cmd_package(args: &RecipeArgs, format: OutputFormat, verbose: bool) -> Result<()> {
  let recipe = args.recipe()?;
  let report = recipe.package().context("Packaging failed")?;

  if format.is_json() {
    return print_json(&report);
  }

  print_status(Status::Done, &format!("Packaged into {}", report.package_dir.display()));
  print_package_report(&report, verbose);
  Ok(())
}
