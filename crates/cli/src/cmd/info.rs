use anyhow::Result;

use super::RecipeArgs;
use crate::output::{OutputFormat, print_json, print_package_info};

/// Print what consumers link against.
pub fn cmd_info(args: &RecipeArgs, format: OutputFormat) -> Result<()> {
  let recipe = args.recipe()?;
  let info = recipe.package_info();

  if format.is_json() {
    return print_json(&info);
  }

  print_package_info(&info);
  Ok(())
}
