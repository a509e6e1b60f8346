pub mod arch;
pub mod compiler;
pub mod os;
pub mod paths;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use arch::Arch;
pub use compiler::{BuildType, Compiler, StdLib};
pub use os::Os;

/// Errors while reading platform settings.
#[derive(Debug, Error)]
pub enum PlatformError {
  #[error("unsupported {setting} '{value}'")]
  UnknownSetting { setting: &'static str, value: String },

  #[error("unsupported host platform {os}/{arch}")]
  UnsupportedHost { os: String, arch: String },
}

/// Platform descriptor the package is built for.
///
/// Supplied by the caller and never mutated; every option the recipe derives
/// is a function of this value plus `Features`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
  pub os: Os,
  pub arch: Arch,
  pub compiler: Compiler,
  #[serde(default)]
  pub stdlib: StdLib,
  #[serde(default)]
  pub build_type: BuildType,
}

impl Platform {
  pub fn new(os: Os, arch: Arch, compiler: Compiler) -> Self {
    Self {
      os,
      arch,
      compiler,
      stdlib: StdLib::Default,
      build_type: BuildType::Release,
    }
  }

  pub fn with_stdlib(mut self, stdlib: StdLib) -> Self {
    self.stdlib = stdlib;
    self
  }

  pub fn with_build_type(mut self, build_type: BuildType) -> Self {
    self.build_type = build_type;
    self
  }

  /// Descriptor for a release build on the running host with its usual compiler.
  pub fn host() -> Result<Self, PlatformError> {
    let (os, arch) = match (Os::host(), Arch::host()) {
      (Some(os), Some(arch)) => (os, arch),
      _ => {
        return Err(PlatformError::UnsupportedHost {
          os: std::env::consts::OS.to_string(),
          arch: std::env::consts::ARCH.to_string(),
        });
      }
    };

    let compiler = match os {
      Os::Windows => Compiler::Msvc,
      Os::Macos | Os::Ios => Compiler::Clang,
      _ => Compiler::Gcc,
    };

    Ok(Self::new(os, arch, compiler))
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}-{} ({}, {}, {})",
      self.arch, self.os, self.compiler, self.stdlib, self.build_type
    )
  }
}

/// Optional features of the package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Features {
  /// Also build and package the OpenGL GPU delegate.
  #[serde(default)]
  pub gpu: bool,
}
