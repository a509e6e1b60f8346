//! Implementation of the `litepack plan` command.
//!
//! Shows everything a build would do for the resolved platform without
//! fetching or running anything.

use std::collections::BTreeMap;

use anyhow::Result;
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use litepack_lib::options::{derive_options, ndk_bazelrc_lines, targets};
use litepack_lib::platform::Platform;
use litepack_lib::provision::Resource;

use super::RecipeArgs;
use crate::output::{OutputFormat, print_json, print_stat, symbols};

#[derive(Debug, Serialize)]
struct BuildPlan {
  platform: Platform,
  gpu: bool,
  ndk: Option<String>,
  resources: Vec<Resource>,
  env: BTreeMap<String, String>,
  flags: Vec<String>,
  targets: Vec<&'static str>,
  bazelrc: Vec<String>,
  command: String,
}

pub fn cmd_plan(args: &RecipeArgs, format: OutputFormat) -> Result<()> {
  let recipe = args.recipe()?;
  let ctx = recipe.build_context();

  let options = derive_options(
    &recipe.platform,
    &recipe.features,
    &ctx.toolchain,
    &ctx.python,
    &ctx.sycl_dir,
  );
  let command = options.build_invocation(&ctx.bazel, &recipe.features);
  let resources = recipe.resources()?;

  let plan = BuildPlan {
    platform: recipe.platform,
    gpu: recipe.features.gpu,
    ndk: ctx.toolchain.ndk_root().map(|p| p.display().to_string()),
    resources,
    env: options.env.clone(),
    flags: options
      .mode_flags
      .iter()
      .chain(options.extra_flags.iter())
      .cloned()
      .collect(),
    targets: targets(&recipe.features),
    bazelrc: ndk_bazelrc_lines(&ctx.toolchain),
    command: command.to_string(),
  };

  if format.is_json() {
    return print_json(&plan);
  }

  println!("Plan for {}", plan.platform);
  print_stat("Work dir", &recipe.config.work_dir.display().to_string());
  print_stat("NDK", plan.ndk.as_deref().unwrap_or("none"));
  println!();
  println!("Sources:");
  for resource in &plan.resources {
    println!(
      "  {} {} {}",
      symbols::ARROW,
      resource.local.display(),
      resource.url.if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }
  println!();
  println!("Configure environment:");
  for (key, value) in &plan.env {
    println!("  {}={}", key, value);
  }
  if !plan.bazelrc.is_empty() {
    println!();
    println!("Appended to bazelrc:");
    for line in &plan.bazelrc {
      println!("  {}", line);
    }
  }
  println!();
  println!("Build:");
  println!("  {}", plan.command);
  Ok(())
}
