//! Subcommand implementations.
//!
//! Every command resolves the same inputs: an optional JSON profile, then
//! platform flags on top of it, then the host platform for anything still
//! unset.

mod build;
mod info;
mod package;
mod plan;
mod run;
mod source;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use litepack_lib::config::Profile;
use litepack_lib::platform::{Arch, BuildType, Compiler, Features, Os, Platform, StdLib};
use litepack_lib::recipe::Recipe;

pub use build::cmd_build;
pub use info::cmd_info;
pub use package::cmd_package;
pub use plan::cmd_plan;
pub use run::cmd_run;
pub use source::cmd_source;

/// Platform and configuration flags shared by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct RecipeArgs {
  /// JSON profile with `platform`, `features` and `config` sections
  #[arg(long, global = true)]
  pub profile: Option<PathBuf>,

  /// Target OS (linux, macos, windows, android, ios)
  #[arg(long, global = true)]
  pub os: Option<Os>,

  /// Target architecture (x86_64, x86, armv7, armv8)
  #[arg(long, global = true)]
  pub arch: Option<Arch>,

  /// Compiler (clang, gcc, msvc)
  #[arg(long, global = true)]
  pub compiler: Option<Compiler>,

  /// C++ standard library (libstdc++, libstdc++11, libc++)
  #[arg(long, global = true)]
  pub stdlib: Option<StdLib>,

  /// Build type (release, debug)
  #[arg(long, global = true)]
  pub build_type: Option<BuildType>,

  /// Build the OpenGL GPU delegate; `--gpu=false` overrides a profile
  #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true", require_equals = true)]
  pub gpu: Option<bool>,

  /// Work directory for sources and build output
  #[arg(long, global = true)]
  pub work_dir: Option<PathBuf>,
}

impl RecipeArgs {
  /// Resolve profile, flags and host defaults into a recipe.
  pub fn recipe(&self) -> Result<Recipe> {
    let profile = match &self.profile {
      Some(path) => Profile::load(path)?,
      None => Profile::default(),
    };

    let mut platform = match profile.platform {
      Some(platform) => platform,
      None => Platform::host().context("Cannot default the platform, pass --os and --arch")?,
    };
    if let Some(os) = self.os {
      platform.os = os;
    }
    if let Some(arch) = self.arch {
      platform.arch = arch;
    }
    if let Some(compiler) = self.compiler {
      platform.compiler = compiler;
    }
    if let Some(stdlib) = self.stdlib {
      platform.stdlib = stdlib;
    }
    if let Some(build_type) = self.build_type {
      platform.build_type = build_type;
    }

    let features = Features {
      gpu: self.gpu.unwrap_or(profile.features.gpu),
    };

    let mut config = profile.config;
    if let Some(work_dir) = &self.work_dir {
      config = config.with_work_dir(work_dir);
    }

    let recipe = Recipe::new(config, platform, features)?;
    debug!(platform = %recipe.platform, work_dir = %recipe.config.work_dir.display(), "resolved recipe");
    Ok(recipe)
  }
}

/// Runtime for the recipe's async steps. One thread: steps run strictly in
/// sequence.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")
}
