//! Cross-compilation toolchain context.
//!
//! The NDK root is discovered once, before the build starts, and then passed
//! explicitly to every step that depends on it.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::consts::NDK_API_LEVEL;
use crate::platform::{Arch, Compiler};

/// Environment variable naming the Android NDK root.
pub const NDK_ENV: &str = "ANDROID_NDK";

/// Host directory of the NDK's prebuilt LLVM toolchain.
const NDK_PREBUILT_BIN: &str = "toolchains/llvm/prebuilt/linux-x86_64/bin";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Toolchain {
  /// Android NDK root when cross-compiling for a mobile target.
  pub ndk_root: Option<PathBuf>,
}

impl Toolchain {
  /// Native host toolchain.
  pub fn host() -> Self {
    Self::default()
  }

  pub fn ndk(root: impl Into<PathBuf>) -> Self {
    Self {
      ndk_root: Some(root.into()),
    }
  }

  /// Discover the toolchain for `arch`.
  ///
  /// Only mobile architectures look at `ANDROID_NDK`; an unset or empty
  /// variable falls back to the host toolchain.
  pub fn resolve(arch: Arch) -> Self {
    if !arch.is_mobile() {
      return Self::host();
    }

    match std::env::var_os(NDK_ENV).filter(|v| !v.is_empty()) {
      Some(root) => {
        let root = PathBuf::from(root);
        info!(ndk = %root.display(), "using NDK");
        Self::ndk(root)
      }
      None => {
        debug!(arch = %arch, "{} not set, building without NDK", NDK_ENV);
        Self::host()
      }
    }
  }

  pub fn ndk_root(&self) -> Option<&Path> {
    self.ndk_root.as_deref()
  }

  pub fn is_cross(&self) -> bool {
    self.ndk_root.is_some()
  }

  pub fn api_level(&self) -> &'static str {
    NDK_API_LEVEL
  }

  /// `(C compiler, C++ compiler)` binaries for `compiler`.
  pub fn host_compilers(&self, compiler: Compiler) -> (String, String) {
    match self.ndk_root() {
      Some(ndk) => {
        let bin = ndk.join(NDK_PREBUILT_BIN);
        let (cc, cxx) = if compiler.is_clang() {
          ("clang", "clang++")
        } else {
          ("gcc", "g++")
        };
        (
          bin.join(cc).to_string_lossy().into_owned(),
          bin.join(cxx).to_string_lossy().into_owned(),
        )
      }
      None => {
        let (cc, cxx) = match compiler {
          Compiler::Clang => ("clang", "clang++"),
          Compiler::Msvc => ("cl.exe", "cl.exe"),
          Compiler::Gcc => ("gcc", "g++"),
        };
        (cc.to_string(), cxx.to_string())
      }
    }
  }
}
