//! Configure and build the TensorFlow Lite libraries.
//!
//! A build walks a fixed sequence of stages (see [`BuildStage`]):
//!
//! 1. patch the source tree (never fatal)
//! 2. run `configure.py` non-interactively with the derived environment
//! 3. when cross-compiling with the NDK, probe Bazel and repair the known
//!    defective build file if the probe names it
//! 4. one `bazel build` over every target
//!
//! All external tools go through a [`ToolRunner`]; the probe output is judged
//! by an injected [`DiagnosticClassifier`].

mod stage;

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

pub use stage::{BuildStage, StageError};

use crate::config::{FormatterConfig, RecipeConfig};
use crate::consts::CONFIGURE_BAZELRC;
use crate::diagnostic::{Diagnosis, DiagnosticClassifier};
use crate::options::{BuildOptions, derive_options, ndk_bazelrc_lines};
use crate::patch::{Patch, PatchError, PatchOutcome, apply_patch};
use crate::platform::{Features, Platform};
use crate::repair::{RepairError, RepairReport, repair_build_file};
use crate::tool::{Invocation, ToolError, ToolRunner};
use crate::toolchain::Toolchain;

#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Patch(#[from] PatchError),

  /// A configuration or build command failed; carries the tool's own error.
  #[error(transparent)]
  Tool(#[from] ToolError),

  #[error("failed to update {path}: {source}")]
  Bazelrc {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Repair(#[from] RepairError),

  #[error(transparent)]
  Stage(#[from] StageError),
}

/// Everything a build step needs to know about where it runs.
///
/// Built once before the first step and passed explicitly, so no step reads
/// process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
  pub work_dir: PathBuf,
  pub source_dir: PathBuf,
  pub sycl_dir: PathBuf,
  pub python: String,
  pub bazel: String,
  pub formatter: FormatterConfig,
  pub toolchain: Toolchain,
}

impl BuildContext {
  pub fn new(config: &RecipeConfig, toolchain: Toolchain) -> Self {
    Self {
      work_dir: config.work_dir.clone(),
      source_dir: config.source_dir(),
      sycl_dir: config.sycl_dir(),
      python: config.python.clone(),
      bazel: config.bazel.clone(),
      formatter: config.formatter.clone(),
      toolchain,
    }
  }

  fn in_source(&self, invocation: Invocation, options: &BuildOptions) -> Invocation {
    invocation.envs(&options.env).current_dir(&self.source_dir)
  }

  /// Resolve a path reported by Bazel; relative paths are relative to the
  /// source tree Bazel ran in.
  fn resolve(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.source_dir.join(path)
    }
  }
}

/// Outcome of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
  pub stage: BuildStage,
  pub patch: PatchOutcome,
  pub repaired: Option<RepairReport>,
  /// The `bazel build` command line that produced the libraries.
  pub invocation: String,
}

pub struct Builder<'a, R, C> {
  context: &'a BuildContext,
  runner: &'a R,
  classifier: &'a C,
  stage: BuildStage,
}

impl<'a, R: ToolRunner, C: DiagnosticClassifier> Builder<'a, R, C> {
  pub fn new(context: &'a BuildContext, runner: &'a R, classifier: &'a C) -> Self {
    Self {
      context,
      runner,
      classifier,
      stage: BuildStage::NotConfigured,
    }
  }

  pub fn stage(&self) -> BuildStage {
    self.stage
  }

  fn advance(&mut self, next: BuildStage) -> Result<(), StageError> {
    self.stage = self.stage.advance(next)?;
    Ok(())
  }

  /// Run every build step for `platform`.
  pub async fn run(&mut self, platform: &Platform, features: &Features) -> Result<BuildReport, BuildError> {
    let ctx = self.context;
    info!(platform = %platform, gpu = features.gpu, "building");

    let patch = apply_patch(self.runner, &ctx.work_dir, &ctx.source_dir, &Patch::egl_context()).await?;
    self.advance(BuildStage::Patched)?;

    let options = derive_options(platform, features, &ctx.toolchain, &ctx.python, &ctx.sycl_dir);
    debug!(env = ?options.env, "derived configure environment");
    self.configure(&options).await?;
    self.advance(BuildStage::Configured)?;

    let repaired = self.repair_if_needed(&options).await?;
    if repaired.is_some() {
      self.advance(BuildStage::Repaired)?;
    }

    let build = ctx.in_source(options.build_invocation(&ctx.bazel, features), &options);
    info!(cmd = %build, "running bazel build");
    self.runner.run(&build).await?.check(&build)?;
    self.advance(BuildStage::Built)?;

    Ok(BuildReport {
      stage: self.stage,
      patch,
      repaired,
      invocation: build.to_string(),
    })
  }

  async fn configure(&self, options: &BuildOptions) -> Result<(), BuildError> {
    let ctx = self.context;

    let configure = ctx.in_source(Invocation::new(&ctx.python).arg("configure.py"), options);
    self.runner.run(&configure).await?.check(&configure)?;

    let lines = ndk_bazelrc_lines(&ctx.toolchain);
    if !lines.is_empty() {
      let path = ctx.source_dir.join(CONFIGURE_BAZELRC);
      append_lines(&path, &lines).map_err(|source| BuildError::Bazelrc { path, source })?;
    }

    // The server caches the old configuration
    let shutdown = ctx.in_source(Invocation::new(&ctx.bazel).arg("shutdown"), options);
    self.runner.run(&shutdown).await?.check(&shutdown)?;
    Ok(())
  }

  /// Probe Bazel after an NDK configuration and fix the file it complains
  /// about, if the complaint is the known one.
  async fn repair_if_needed(&self, options: &BuildOptions) -> Result<Option<RepairReport>, BuildError> {
    let ctx = self.context;
    if !ctx.toolchain.is_cross() {
      return Ok(None);
    }

    let probe = ctx.in_source(Invocation::new(&ctx.bazel).arg("info"), options);
    let output = self.runner.run(&probe).await?;

    match self.classifier.classify(&output) {
      Diagnosis::NoError => Ok(None),
      Diagnosis::RecognizedRepairable(path) => {
        let path = ctx.resolve(&path);
        let report = repair_build_file(self.runner, &path, &ctx.formatter).await?;
        Ok(Some(report))
      }
      Diagnosis::Other(message) => Err(
        ToolError::Failed {
          command: probe.to_string(),
          code: output.code,
          output: message,
        }
        .into(),
      ),
    }
  }
}

fn append_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
  let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
  for line in lines {
    writeln!(file, "{}", line)?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::diagnostic::IndentationErrorClassifier;
  use crate::platform::{Arch, BuildType, Compiler, Os};
  use crate::util::testutil::{RecordingRunner, failed_output};
  use tempfile::TempDir;
  use tracing_test::traced_test;

  const BAD_BZL: &str = "def impl(ctx):\n    if ctx:\n          pass\n    return None\n";

  fn context(toolchain: Toolchain) -> (TempDir, BuildContext) {
    let temp = TempDir::new().unwrap();
    let mut config = RecipeConfig::default().with_work_dir(temp.path());
    config.bazel = "bazel".to_string();
    std::fs::create_dir_all(config.source_dir()).unwrap();
    (temp, BuildContext::new(&config, toolchain))
  }

  fn linux_host() -> Platform {
    Platform::new(Os::Linux, Arch::X86_64, Compiler::Gcc)
  }

  fn android() -> Platform {
    Platform::new(Os::Android, Arch::Armv8, Compiler::Clang)
  }

  #[tokio::test]
  #[traced_test]
  async fn host_build_runs_steps_in_order() {
    let (_temp, ctx) = context(Toolchain::host());
    let runner = RecordingRunner::new().on("patch -R --dry-run", failed_output(1, "hunk FAILED"));

    let report = Builder::new(&ctx, &runner, &IndentationErrorClassifier)
      .run(&linux_host(), &Features::default())
      .await
      .unwrap();

    let programs: Vec<String> = runner
      .calls()
      .iter()
      .map(|c| format!("{} {}", c.program, c.args.first().cloned().unwrap_or_default()))
      .collect();
    let configure = format!("{} configure.py", ctx.python);
    assert_eq!(
      programs,
      vec!["patch -R", "patch -s", configure.as_str(), "bazel shutdown", "bazel build"]
    );
    assert_eq!(report.stage, BuildStage::Built);
    assert_eq!(report.patch, PatchOutcome::Applied);
    assert!(report.repaired.is_none());
    assert!(report.invocation.ends_with("//tensorflow/lite:libtensorflowlite.so --verbose_failures"));
    assert!(logs_contain("build stage"));
  }

  #[tokio::test]
  async fn configure_runs_in_source_dir_with_env() {
    let (_temp, ctx) = context(Toolchain::host());
    let runner = RecordingRunner::new();

    Builder::new(&ctx, &runner, &IndentationErrorClassifier)
      .run(&linux_host(), &Features::default())
      .await
      .unwrap();

    let configure = runner
      .calls()
      .into_iter()
      .find(|c| c.has_arg("configure.py"))
      .unwrap();
    assert_eq!(configure.cwd.as_deref(), Some(ctx.source_dir.as_path()));
    assert_eq!(configure.env.get("PYTHON_BIN_PATH"), Some(&ctx.python));
    assert_eq!(configure.env.get("TF_NEED_CUDA").map(String::as_str), Some("0"));
  }

  #[tokio::test]
  async fn configure_failure_is_fatal() {
    let (_temp, ctx) = context(Toolchain::host());
    let runner = RecordingRunner::new().on("configure.py", failed_output(1, "Invalid python path"));
    let mut builder = Builder::new(&ctx, &runner, &IndentationErrorClassifier);

    let err = builder.run(&linux_host(), &Features::default()).await.unwrap_err();

    assert!(matches!(err, BuildError::Tool(ToolError::Failed { .. })));
    assert_eq!(builder.stage(), BuildStage::Patched);
    assert_eq!(runner.count_matching("bazel"), 0);
  }

  #[tokio::test]
  async fn gpu_build_targets_both_libraries() {
    let (_temp, ctx) = context(Toolchain::host());
    let runner = RecordingRunner::new();

    Builder::new(&ctx, &runner, &IndentationErrorClassifier)
      .run(&linux_host(), &Features { gpu: true })
      .await
      .unwrap();

    let build = runner.calls().into_iter().find(|c| c.has_arg("build")).unwrap();
    let primary = build
      .args
      .iter()
      .position(|a| a == "//tensorflow/lite:libtensorflowlite.so")
      .unwrap();
    let gpu = build
      .args
      .iter()
      .position(|a| a == "//tensorflow/lite/delegates/gpu:libtensorflowlite_gpu_gl.so")
      .unwrap();
    assert!(primary < gpu);
    assert!(build.has_arg("--cxxopt=-DMESA_EGL_NO_X11_HEADERS"));
    assert_eq!(runner.count_matching("bazel build"), 1);
  }

  #[tokio::test]
  async fn host_build_never_probes() {
    let (_temp, ctx) = context(Toolchain::host());
    let runner = RecordingRunner::new();

    Builder::new(&ctx, &runner, &IndentationErrorClassifier)
      .run(&linux_host(), &Features::default())
      .await
      .unwrap();

    assert_eq!(runner.count_matching("bazel info"), 0);
  }

  #[tokio::test]
  async fn ndk_build_appends_bazelrc() {
    let (_temp, ctx) = context(Toolchain::ndk("/opt/android-ndk"));
    let rc = ctx.source_dir.join(CONFIGURE_BAZELRC);
    std::fs::write(&rc, "build --action_env PYTHON_BIN_PATH=\"/usr/bin/python3\"\n").unwrap();
    let runner = RecordingRunner::new();

    Builder::new(&ctx, &runner, &IndentationErrorClassifier)
      .run(&android(), &Features::default())
      .await
      .unwrap();

    let content = std::fs::read_to_string(&rc).unwrap();
    assert!(content.starts_with("build --action_env PYTHON_BIN_PATH"));
    assert!(content.contains("build --action_env ANDROID_NDK_HOME=\"/opt/android-ndk\"\n"));
    assert!(content.contains("build --action_env ANDROID_NDK_API_LEVEL=\"18\"\n"));
    assert_eq!(runner.count_matching("bazel info"), 1);
  }

  #[tokio::test]
  async fn recognized_diagnostic_repairs_exactly_that_file() {
    let (_temp, ctx) = context(Toolchain::ndk("/opt/android-ndk"));
    let bzl = ctx.source_dir.join("third_party/android/android_configure.bzl");
    let other = ctx.source_dir.join("third_party/android/BUILD");
    std::fs::create_dir_all(bzl.parent().unwrap()).unwrap();
    std::fs::write(&bzl, BAD_BZL).unwrap();
    std::fs::write(&other, BAD_BZL).unwrap();
    let runner = RecordingRunner::new().on(
      "bazel info",
      failed_output(
        2,
        "ERROR: third_party/android/android_configure.bzl:3:11: indentation error\nINFO: Elapsed time: 0.2s\n",
      ),
    );

    let report = Builder::new(&ctx, &runner, &IndentationErrorClassifier)
      .run(&android(), &Features::default())
      .await
      .unwrap();

    let repaired = report.repaired.unwrap();
    assert_eq!(repaired.path, bzl);
    assert_eq!(repaired.removed_lines, 1);
    assert!(!std::fs::read_to_string(&bzl).unwrap().contains("pass"));
    assert_eq!(std::fs::read_to_string(&other).unwrap(), BAD_BZL);
    assert_eq!(runner.count_matching(&format!("autopep8 --in-place {}", bzl.display())), 1);
    assert_eq!(runner.count_matching("configure.py"), 1);
    assert_eq!(report.stage, BuildStage::Built);
  }

  #[tokio::test]
  async fn unrecognized_probe_failure_returns_original_error() {
    let (_temp, ctx) = context(Toolchain::ndk("/opt/android-ndk"));
    let runner = RecordingRunner::new().on("bazel info", failed_output(37, "FATAL: corrupt installation"));
    let mut builder = Builder::new(&ctx, &runner, &IndentationErrorClassifier);

    let err = builder.run(&android(), &Features::default()).await.unwrap_err();

    match err {
      BuildError::Tool(ToolError::Failed { command, code, output }) => {
        assert_eq!(command, "bazel info");
        assert_eq!(code, Some(37));
        assert_eq!(output, "FATAL: corrupt installation");
      }
      other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(builder.stage(), BuildStage::Configured);
    assert_eq!(runner.count_matching("autopep8"), 0);
    assert_eq!(runner.count_matching("bazel build"), 0);
  }

  #[tokio::test]
  async fn build_failure_is_reported_verbatim() {
    let (_temp, ctx) = context(Toolchain::host());
    let runner = RecordingRunner::new().on(
      "bazel build",
      failed_output(1, "ERROR: /src/tensorflow/lite/BUILD:1:1: C++ compilation failed"),
    );

    let err = Builder::new(&ctx, &runner, &IndentationErrorClassifier)
      .run(&linux_host().with_build_type(BuildType::Debug), &Features::default())
      .await
      .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("--compilation_mode=dbg"));
    assert!(message.contains("C++ compilation failed"));
  }
}
