//! Compiler identity, C++ standard library flavor and build mode settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PlatformError;

/// Compiler family used for the host build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Compiler {
  /// clang or apple-clang
  Clang,
  /// GCC, the default toolchain
  Gcc,
  /// Visual Studio
  Msvc,
}

impl Compiler {
  pub const ALL: [Compiler; 3] = [Compiler::Clang, Compiler::Gcc, Compiler::Msvc];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Clang => "clang",
      Self::Gcc => "gcc",
      Self::Msvc => "msvc",
    }
  }

  pub fn is_clang(&self) -> bool {
    matches!(self, Self::Clang)
  }

  pub fn is_msvc(&self) -> bool {
    matches!(self, Self::Msvc)
  }
}

impl fmt::Display for Compiler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Compiler {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "clang" | "apple-clang" => Ok(Self::Clang),
      "gcc" => Ok(Self::Gcc),
      "msvc" | "visual studio" => Ok(Self::Msvc),
      _ => Err(PlatformError::UnknownSetting {
        setting: "compiler",
        value: s.to_string(),
      }),
    }
  }
}

impl TryFrom<String> for Compiler {
  type Error = PlatformError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Compiler> for String {
  fn from(compiler: Compiler) -> Self {
    compiler.as_str().to_string()
  }
}

/// C++ standard library flavor (`compiler.libcxx`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StdLib {
  /// Whatever the compiler picks; no ABI flag is emitted.
  #[default]
  Default,
  /// libstdc++ with the pre-C++11 ABI
  Libstdcxx,
  /// libstdc++ with the C++11 ABI
  Libstdcxx11,
  /// LLVM libc++
  Libcxx,
}

impl StdLib {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Default => "default",
      Self::Libstdcxx => "libstdc++",
      Self::Libstdcxx11 => "libstdc++11",
      Self::Libcxx => "libc++",
    }
  }

  /// Value of `_GLIBCXX_USE_CXX11_ABI` selected by this flavor, if any.
  pub fn cxx11_abi(&self) -> Option<u8> {
    match self {
      Self::Libstdcxx => Some(0),
      Self::Libstdcxx11 => Some(1),
      Self::Default | Self::Libcxx => None,
    }
  }
}

impl fmt::Display for StdLib {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for StdLib {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "" | "default" => Ok(Self::Default),
      "libstdc++" => Ok(Self::Libstdcxx),
      "libstdc++11" => Ok(Self::Libstdcxx11),
      "libc++" => Ok(Self::Libcxx),
      _ => Err(PlatformError::UnknownSetting {
        setting: "stdlib",
        value: s.to_string(),
      }),
    }
  }
}

impl TryFrom<String> for StdLib {
  type Error = PlatformError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<StdLib> for String {
  fn from(stdlib: StdLib) -> Self {
    stdlib.as_str().to_string()
  }
}

/// Optimization/debug mode (`build_type`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BuildType {
  Debug,
  #[default]
  Release,
}

impl BuildType {
  pub const ALL: [BuildType; 2] = [BuildType::Debug, BuildType::Release];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Debug => "debug",
      Self::Release => "release",
    }
  }
}

impl fmt::Display for BuildType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for BuildType {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "debug" => Ok(Self::Debug),
      "release" => Ok(Self::Release),
      _ => Err(PlatformError::UnknownSetting {
        setting: "build_type",
        value: s.to_string(),
      }),
    }
  }
}

impl TryFrom<String> for BuildType {
  type Error = PlatformError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<BuildType> for String {
  fn from(build_type: BuildType) -> Self {
    build_type.as_str().to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn visual_studio_maps_to_msvc() {
    assert_eq!("Visual Studio".parse::<Compiler>().unwrap(), Compiler::Msvc);
    assert_eq!("apple-clang".parse::<Compiler>().unwrap(), Compiler::Clang);
  }

  #[test]
  fn only_libstdcxx_flavors_select_an_abi() {
    assert_eq!(StdLib::Libstdcxx.cxx11_abi(), Some(0));
    assert_eq!(StdLib::Libstdcxx11.cxx11_abi(), Some(1));
    assert_eq!(StdLib::Libcxx.cxx11_abi(), None);
    assert_eq!(StdLib::Default.cxx11_abi(), None);
  }

  #[test]
  fn build_type_parses_case_insensitively() {
    assert_eq!("Debug".parse::<BuildType>().unwrap(), BuildType::Debug);
    assert!("profile".parse::<BuildType>().is_err());
  }

  #[test]
  fn build_type_deserializes_like_the_flag() {
    let build_type: BuildType = serde_json::from_str(r#""Debug""#).unwrap();
    assert_eq!(build_type, BuildType::Debug);
    assert_eq!(serde_json::to_string(&BuildType::Release).unwrap(), r#""release""#);
    assert!(serde_json::from_str::<BuildType>(r#""profile""#).is_err());
  }
}
