//! Build option derivation.
//!
//! Translates a `Platform` plus `Features` into the environment consumed by
//! TensorFlow's `configure.py` and the flags passed to `bazel build`. Nothing
//! here touches the filesystem or spawns processes.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::consts::{GPU_LIB, GPU_TARGET, PRIMARY_LIB, PRIMARY_TARGET};
use crate::platform::{Arch, BuildType, Features, Os, Platform, StdLib};
use crate::tool::Invocation;
use crate::toolchain::Toolchain;

/// Flags passed to every `bazel build`.
pub const BASE_BUILD_FLAGS: [&str; 3] = [
  "--config=v2",
  "--cxxopt=--std=c++11",
  "--define=no_tensorflow_py_deps=true",
];

/// Accelerator backends switched off unless a rule turns one back on.
const DISABLED_BACKENDS: [&str; 7] = [
  "TF_ENABLE_XLA",
  "TF_NEED_OPENCL_SYCL",
  "TF_NEED_ROCM",
  "TF_NEED_CUDA",
  "TF_NEED_MPI",
  "TF_DOWNLOAD_CLANG",
  "TF_SET_ANDROID_WORKSPACE",
];

/// Options derived for one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildOptions {
  /// Environment for the non-interactive `configure.py` run.
  pub env: BTreeMap<String, String>,
  /// Compilation mode flags (`--config=opt` or `--compilation_mode=dbg`).
  pub mode_flags: Vec<String>,
  /// Platform-specific flags appended to `bazel build`.
  pub extra_flags: Vec<String>,
}

impl BuildOptions {
  /// Single `bazel build` call over every target.
  pub fn build_invocation(&self, bazel: &str, features: &Features) -> Invocation {
    Invocation::new(bazel)
      .arg("build")
      .args(BASE_BUILD_FLAGS)
      .args(self.mode_flags.iter().cloned())
      .args(self.extra_flags.iter().cloned())
      .args(targets(features))
      .arg("--verbose_failures")
  }
}

/// Derive the option set for `platform`.
///
/// `python` becomes `PYTHON_BIN_PATH`; `sycl_dir` is the extracted triSYCL
/// tree used for OpenCL on Android.
pub fn derive_options(
  platform: &Platform,
  features: &Features,
  toolchain: &Toolchain,
  python: &str,
  sycl_dir: &Path,
) -> BuildOptions {
  let mut env = BTreeMap::new();
  let mut extra_flags = Vec::new();

  env.insert("PYTHON_BIN_PATH".to_string(), python.to_string());
  env.insert("USE_DEFAULT_PYTHON_LIB_PATH".to_string(), "1".to_string());
  for key in DISABLED_BACKENDS {
    env.insert(key.to_string(), "0".to_string());
  }
  // configure.py prompts for iOS unless told up front
  env.insert(
    "TF_CONFIGURE_IOS".to_string(),
    (if platform.os == Os::Ios { "1" } else { "0" }).to_string(),
  );

  match platform.arch {
    Arch::Armv7 => extra_flags.push("--config=android_arm".to_string()),
    Arch::Armv8 => extra_flags.push("--config=android_arm64".to_string()),
    Arch::X86 | Arch::X86_64 if !platform.compiler.is_msvc() => {
      extra_flags.push("--linkopt=-latomic".to_string())
    }
    Arch::X86 | Arch::X86_64 => {}
  }

  let (cc, cxx) = toolchain.host_compilers(platform.compiler);
  env.insert("HOST_C_COMPILER".to_string(), cc);
  env.insert("HOST_CXX_COMPILER".to_string(), cxx);

  match toolchain.ndk_root() {
    Some(ndk) => {
      env.insert("ANDROID_NDK_HOME".to_string(), ndk.to_string_lossy().into_owned());
      env.insert("ANDROID_NDK_API_LEVEL".to_string(), toolchain.api_level().to_string());

      // OpenCL through triSYCL is the only accelerator available on Android
      env.insert("TF_NEED_OPENCL_SYCL".to_string(), "1".to_string());
      env.insert("TF_NEED_COMPUTECPP".to_string(), "0".to_string());
      env.insert(
        "TRISYCL_INCLUDE_DIR".to_string(),
        sycl_dir.join("include").to_string_lossy().into_owned(),
      );

      // NDK compilers reject -march=native
      env.insert("CC_OPT_FLAGS".to_string(), opt_flags(platform, true));
    }
    None => {
      if features.gpu {
        extra_flags.push("--cxxopt=-DMESA_EGL_NO_X11_HEADERS".to_string());
      }
      env.insert("CC_OPT_FLAGS".to_string(), opt_flags(platform, false));
    }
  }

  extra_flags.extend(stdlib_flags(platform));

  BuildOptions {
    env,
    mode_flags: mode_flags(platform.build_type),
    extra_flags,
  }
}

fn opt_flags(platform: &Platform, cross: bool) -> String {
  if platform.compiler.is_msvc() && !cross {
    return "/arch:AVX".to_string();
  }
  match (platform.build_type, cross) {
    (BuildType::Debug, _) => "-Wno-sign-compare -g".to_string(),
    (BuildType::Release, true) => "-Wno-sign-compare".to_string(),
    (BuildType::Release, false) => "-Wno-sign-compare -march=native".to_string(),
  }
}

fn mode_flags(build_type: BuildType) -> Vec<String> {
  match build_type {
    BuildType::Release => vec!["--config=opt".to_string()],
    BuildType::Debug => vec!["--compilation_mode=dbg".to_string()],
  }
}

fn stdlib_flags(platform: &Platform) -> Vec<String> {
  if platform.compiler.is_msvc() {
    return Vec::new();
  }

  let mut flags = Vec::new();
  if let Some(abi) = platform.stdlib.cxx11_abi() {
    flags.push(format!("--cxxopt=-D_GLIBCXX_USE_CXX11_ABI={}", abi));
  }
  if platform.compiler.is_clang() && platform.stdlib == StdLib::Libcxx {
    flags.push("--cxxopt=-stdlib=libc++".to_string());
    flags.push("--linkopt=-lc++".to_string());
  }
  flags
}

/// Bazel targets to build, primary library first.
pub fn targets(features: &Features) -> Vec<&'static str> {
  let mut targets = vec![PRIMARY_TARGET];
  if features.gpu {
    targets.push(GPU_TARGET);
  }
  targets
}

/// Library names consumers link against, primary library first.
pub fn link_names(features: &Features) -> Vec<&'static str> {
  let mut libs = vec![PRIMARY_LIB];
  if features.gpu {
    libs.push(GPU_LIB);
  }
  libs
}

/// Lines appended to the generated bazelrc when building with the NDK.
///
/// `configure.py` cannot express these itself without prompting.
pub fn ndk_bazelrc_lines(toolchain: &Toolchain) -> Vec<String> {
  match toolchain.ndk_root() {
    Some(ndk) => vec![
      format!("build --action_env ANDROID_NDK_HOME=\"{}\"", ndk.display()),
      format!("build --action_env ANDROID_NDK_API_LEVEL=\"{}\"", toolchain.api_level()),
    ],
    None => Vec::new(),
  }
}
