use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PlatformError;

/// CPU architectures the recipe knows how to build for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Arch {
  X86_64,
  X86,
  Armv7,
  Armv8,
}

impl Arch {
  pub const ALL: [Arch; 4] = [Arch::X86_64, Arch::X86, Arch::Armv7, Arch::Armv8];

  /// Detect the CPU architecture of the running host
  pub fn host() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86_64" => Some(Self::X86_64),
      "x86" => Some(Self::X86),
      "arm" => Some(Self::Armv7),
      "aarch64" => Some(Self::Armv8),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86_64 => "x86_64",
      Self::X86 => "x86",
      Self::Armv7 => "armv7",
      Self::Armv8 => "armv8",
    }
  }

  /// ARM targets are built through the Android NDK.
  pub fn is_mobile(&self) -> bool {
    matches!(self, Self::Armv7 | Self::Armv8)
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Arch {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "x86_64" => Ok(Self::X86_64),
      "x86" => Ok(Self::X86),
      "armv7" => Ok(Self::Armv7),
      "armv8" => Ok(Self::Armv8),
      _ => Err(PlatformError::UnknownSetting {
        setting: "arch",
        value: s.to_string(),
      }),
    }
  }
}

impl TryFrom<String> for Arch {
  type Error = PlatformError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Arch> for String {
  fn from(arch: Arch) -> Self {
    arch.as_str().to_string()
  }
}
