//! The package recipe: `source`, `build`, `package` and `package_info` hooks.
//!
//! Hooks run strictly in that order. Each takes the external seams it needs
//! (downloader, tool runner, diagnostic classifier) as parameters, so the
//! same recipe drives real tools from the CLI and fakes in tests.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::build::{BuildContext, BuildError, BuildReport, BuildStage, Builder, StageError};
use crate::config::{ConfigError, RecipeConfig};
use crate::diagnostic::DiagnosticClassifier;
use crate::package::{PackageError, PackageInfo, PackageReport, package, package_info};
use crate::platform::{Features, Os, Platform, PlatformError};
use crate::provision::{Downloader, ProvisionError, ProvisionReport, Resource, provision, resources};
use crate::tool::ToolRunner;
use crate::toolchain::Toolchain;

#[derive(Debug, Error)]
pub enum RecipeError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Platform(#[from] PlatformError),

  #[error(transparent)]
  Provision(#[from] ProvisionError),

  #[error(transparent)]
  Build(#[from] BuildError),

  #[error(transparent)]
  Package(#[from] PackageError),

  #[error(transparent)]
  Stage(#[from] StageError),
}

/// Result of running every hook.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub provision: ProvisionReport,
  pub build: BuildReport,
  pub package: PackageReport,
  pub stage: BuildStage,
}

#[derive(Debug, Clone)]
pub struct Recipe {
  pub config: RecipeConfig,
  pub platform: Platform,
  pub features: Features,
  pub toolchain: Toolchain,
}

impl Recipe {
  /// Recipe for `platform`, discovering the cross toolchain from the
  /// environment now rather than during the build. Configured directories
  /// are made absolute here.
  pub fn new(config: RecipeConfig, platform: Platform, features: Features) -> Result<Self, RecipeError> {
    let config = config.absolute()?;
    let toolchain = Toolchain::resolve(platform.arch);
    Ok(Self {
      config,
      platform,
      features,
      toolchain,
    })
  }

  pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
    self.toolchain = toolchain;
    self
  }

  /// Inputs `source` fetches. The Bazel installer has to run on this
  /// machine, so it follows the host OS whatever the target is.
  pub fn resources(&self) -> Result<Vec<Resource>, RecipeError> {
    let host = Os::host().ok_or_else(|| PlatformError::UnsupportedHost {
      os: std::env::consts::OS.to_string(),
      arch: std::env::consts::ARCH.to_string(),
    })?;
    Ok(resources(host, &self.config.sha256))
  }

  /// Fetch whatever inputs are missing from the work directory.
  pub async fn source(&self, downloader: &impl Downloader) -> Result<ProvisionReport, RecipeError> {
    let report = provision(&self.config.work_dir, &self.resources()?, downloader).await?;
    info!(fetched = report.fetched.len(), skipped = report.skipped.len(), "sources ready");
    Ok(report)
  }

  pub fn build_context(&self) -> BuildContext {
    BuildContext::new(&self.config, self.toolchain.clone())
  }

  pub async fn build(
    &self,
    runner: &impl ToolRunner,
    classifier: &impl DiagnosticClassifier,
  ) -> Result<BuildReport, RecipeError> {
    let context = self.build_context();
    let report = Builder::new(&context, runner, classifier)
      .run(&self.platform, &self.features)
      .await?;
    Ok(report)
  }

  pub fn package(&self) -> Result<PackageReport, RecipeError> {
    let report = package(&self.config.source_dir(), &self.config.package_dir(), &self.features)?;
    Ok(report)
  }

  pub fn package_info(&self) -> PackageInfo {
    package_info(&self.features)
  }

  /// `source`, `build` and `package`, in order, stopping at the first error.
  pub async fn run_all(
    &self,
    downloader: &impl Downloader,
    runner: &impl ToolRunner,
    classifier: &impl DiagnosticClassifier,
  ) -> Result<RunReport, RecipeError> {
    let provision = self.source(downloader).await?;
    let build = self.build(runner, classifier).await?;
    let package = self.package()?;
    let stage = build.stage.advance(BuildStage::Packaged)?;

    Ok(RunReport {
      provision,
      build,
      package,
      stage,
    })
  }
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use super::*;
  use crate::diagnostic::IndentationErrorClassifier;
  use crate::platform::{Arch, Compiler};
  use crate::provision::bazel_installer_name;
  use crate::tool::{Invocation, ToolError, ToolOutput};
  use crate::util::testutil::{FakeDownloader, RecordingRunner, failed_output};
  use tempfile::TempDir;

  const TRISYCL_URL: &str = "https://github.com/triSYCL/triSYCL/archive/master.zip";
  const TENSORFLOW_URL: &str = "https://github.com/tensorflow/tensorflow/archive/v1.14.0.tar.gz";

  /// Records commands and drops libraries into `bazel-bin` on `bazel build`.
  struct FakeBazel {
    inner: RecordingRunner,
    source_dir: PathBuf,
  }

  impl ToolRunner for FakeBazel {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
      if invocation.program == "bazel" && invocation.has_arg("build") {
        let bin = self.source_dir.join("bazel-bin/tensorflow/lite");
        std::fs::create_dir_all(bin.join("delegates/gpu")).unwrap();
        std::fs::write(bin.join("libtensorflowlite.so"), "elf").unwrap();
        std::fs::create_dir_all(self.source_dir.join("tensorflow/lite")).unwrap();
        std::fs::write(self.source_dir.join("tensorflow/lite/interpreter.h"), "#pragma once").unwrap();
        if invocation.has_arg("//tensorflow/lite/delegates/gpu:libtensorflowlite_gpu_gl.so") {
          std::fs::write(bin.join("delegates/gpu/libtensorflowlite_gpu_gl.so"), "elf").unwrap();
        }
      }
      self.inner.run(invocation).await
    }
  }

  fn recipe(temp: &TempDir, features: Features) -> Recipe {
    let mut config = RecipeConfig::default().with_work_dir(temp.path());
    config.bazel = "bazel".to_string();
    Recipe::new(config, Platform::new(Os::Linux, Arch::X86_64, Compiler::Gcc), features)
      .unwrap()
      .with_toolchain(Toolchain::host())
  }

  fn downloader() -> FakeDownloader {
    FakeDownloader::new()
      .with_archive(TRISYCL_URL, "triSYCL-master")
      .with_archive(TENSORFLOW_URL, "tensorflow-1.14.0")
  }

  #[tokio::test]
  async fn source_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let recipe = recipe(&temp, Features::default());
    let downloader = downloader();

    let first = recipe.source(&downloader).await.unwrap();
    let calls_after_first = downloader.calls().len();
    let second = recipe.source(&downloader).await.unwrap();

    assert_eq!(first.fetched, vec!["bazel", "trisycl", "tensorflow"]);
    assert_eq!(calls_after_first, 3);
    assert_eq!(downloader.calls().len(), 3);
    assert_eq!(second.skipped.len(), 3);
    assert!(recipe.config.source_dir().join("README").exists());
    assert!(
      temp
        .path()
        .join(bazel_installer_name(Os::host().unwrap()))
        .exists()
    );
  }

  #[tokio::test]
  async fn run_all_packages_gpu_build() {
    let temp = TempDir::new().unwrap();
    let recipe = recipe(&temp, Features { gpu: true });
    let runner = FakeBazel {
      inner: RecordingRunner::new(),
      source_dir: recipe.config.source_dir(),
    };

    let report = recipe
      .run_all(&downloader(), &runner, &IndentationErrorClassifier)
      .await
      .unwrap();

    assert_eq!(report.stage, BuildStage::Packaged);
    assert_eq!(report.build.stage, BuildStage::Built);
    assert_eq!(report.package.libraries.len(), 2);
    let pkg = recipe.config.package_dir();
    assert!(pkg.join("lib/libtensorflowlite.so").is_file());
    assert!(pkg.join("lib/libtensorflowlite_gpu_gl.so").is_file());
    assert_eq!(recipe.package_info().libs, vec!["tensorflowlite", "tensorflowlite_gpu_gl"]);
  }

  #[tokio::test]
  async fn build_failure_stops_before_packaging() {
    let temp = TempDir::new().unwrap();
    let recipe = recipe(&temp, Features::default());
    let runner = RecordingRunner::new().on("bazel build", failed_output(1, "compilation failed"));

    let err = recipe
      .run_all(&downloader(), &runner, &IndentationErrorClassifier)
      .await
      .unwrap_err();

    assert!(matches!(err, RecipeError::Build(BuildError::Tool(_))));
    assert!(!recipe.config.package_dir().exists());
  }

  #[test]
  fn relative_work_dir_reaches_tools_as_absolute() {
    let config = RecipeConfig::default().with_work_dir("relative-work");
    let recipe = Recipe::new(config, Platform::new(Os::Android, Arch::Armv8, Compiler::Clang), Features::default())
      .unwrap()
      .with_toolchain(Toolchain::host());

    let context = recipe.build_context();
    assert!(context.work_dir.is_absolute());
    assert!(context.source_dir.is_absolute());
    assert!(context.sycl_dir.is_absolute());
  }

  #[test]
  fn package_without_build_fails() {
    let temp = TempDir::new().unwrap();
    let recipe = recipe(&temp, Features::default());

    let err = recipe.package().unwrap_err();
    assert!(matches!(err, RecipeError::Package(PackageError::MissingBuildOutput(_))));
  }
}
