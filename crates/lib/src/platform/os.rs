use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PlatformError;

/// Target operating system of the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Os {
  Linux,
  Macos,
  Windows,
  Android,
  Ios,
}

impl Os {
  /// Detect the operating system the recipe is running on.
  ///
  /// Returns `None` for hosts that cannot run the Bazel installer.
  pub fn host() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::Macos),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Returns the setting name for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::Macos => "macos",
      Self::Windows => "windows",
      Self::Android => "android",
      Self::Ios => "ios",
    }
  }

  /// Returns the name Bazel uses in its release asset file names.
  pub fn bazel_name(&self) -> &'static str {
    match self {
      Self::Macos | Self::Ios => "darwin",
      Self::Windows => "windows",
      Self::Linux | Self::Android => "linux",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Os {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "linux" => Ok(Self::Linux),
      "macos" | "darwin" => Ok(Self::Macos),
      "windows" => Ok(Self::Windows),
      "android" => Ok(Self::Android),
      "ios" => Ok(Self::Ios),
      _ => Err(PlatformError::UnknownSetting {
        setting: "os",
        value: s.to_string(),
      }),
    }
  }
}

impl TryFrom<String> for Os {
  type Error = PlatformError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Os> for String {
  fn from(os: Os) -> Self {
    os.as_str().to_string()
  }
}
