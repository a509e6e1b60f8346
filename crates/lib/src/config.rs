//! Recipe configuration.
//!
//! Defaults come from the environment (`LITEPACK_ROOT`, `LITEPACK_PYTHON`,
//! `LITEPACK_BAZEL`) and can be overridden by a JSON profile that also carries
//! the platform descriptor and features.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{SOURCE_DIR, SYCL_DIR};
use crate::platform::{Features, Platform, paths};

pub const ROOT_ENV: &str = "LITEPACK_ROOT";
pub const PYTHON_ENV: &str = "LITEPACK_PYTHON";
pub const BAZEL_ENV: &str = "LITEPACK_BAZEL";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read profile {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid profile {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("cannot resolve directory {path}: {source}")]
  Resolve {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Code formatter run over a repaired Bazel file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
  /// Formatter executable, invoked as `<program> --in-place <file>`.
  pub program: String,
  /// pip executable used to install/upgrade the formatter; `None` skips it.
  pub pip: Option<String>,
}

impl Default for FormatterConfig {
  fn default() -> Self {
    Self {
      program: "autopep8".to_string(),
      pip: Some("pip3".to_string()),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeConfig {
  /// Directory holding the downloaded inputs and the source tree.
  pub work_dir: PathBuf,
  /// Package output directory; defaults to `<work_dir>/package`.
  pub package_dir: Option<PathBuf>,
  /// Python interpreter used for `configure.py` and `PYTHON_BIN_PATH`.
  pub python: String,
  pub bazel: String,
  pub formatter: FormatterConfig,
  /// Optional SHA-256 pins keyed by resource name.
  pub sha256: BTreeMap<String, String>,
}

impl Default for RecipeConfig {
  fn default() -> Self {
    let work_dir = std::env::var_os(ROOT_ENV)
      .filter(|v| !v.is_empty())
      .map(PathBuf::from)
      .unwrap_or_else(paths::cache_dir);

    Self {
      work_dir,
      package_dir: None,
      python: std::env::var(PYTHON_ENV).unwrap_or_else(|_| default_python().to_string()),
      bazel: std::env::var(BAZEL_ENV).unwrap_or_else(|_| "bazel".to_string()),
      formatter: FormatterConfig::default(),
      sha256: BTreeMap::new(),
    }
  }
}

#[cfg(windows)]
fn default_python() -> &'static str {
  "python"
}

#[cfg(not(windows))]
fn default_python() -> &'static str {
  "python3"
}

impl RecipeConfig {
  pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
    self.work_dir = work_dir.into();
    self
  }

  /// Make `work_dir` and `package_dir` absolute. Tools run with the source
  /// tree as their working directory, so relative paths would point elsewhere.
  pub fn absolute(mut self) -> Result<Self, ConfigError> {
    self.work_dir = absolute_dir(&self.work_dir)?;
    if let Some(package_dir) = &self.package_dir {
      self.package_dir = Some(absolute_dir(package_dir)?);
    }
    Ok(self)
  }

  pub fn source_dir(&self) -> PathBuf {
    self.work_dir.join(SOURCE_DIR)
  }

  pub fn sycl_dir(&self) -> PathBuf {
    self.work_dir.join(SYCL_DIR)
  }

  pub fn package_dir(&self) -> PathBuf {
    self
      .package_dir
      .clone()
      .unwrap_or_else(|| self.work_dir.join("package"))
  }
}

/// Canonical form of `path` when it exists, otherwise joined onto the
/// current directory.
fn absolute_dir(path: &Path) -> Result<PathBuf, ConfigError> {
  match dunce::canonicalize(path) {
    Ok(path) => Ok(path),
    Err(_) => std::path::absolute(path).map_err(|source| ConfigError::Resolve {
      path: path.to_path_buf(),
      source,
    }),
  }
}

/// Everything a run needs, as stored in a profile file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
  pub platform: Option<Platform>,
  pub features: Features,
  pub config: RecipeConfig,
}

impl Profile {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::{Arch, Compiler, Os};
  use serial_test::serial;
  use tempfile::tempdir;

  #[test]
  #[serial]
  fn root_env_sets_work_dir() {
    temp_env::with_vars(
      [(ROOT_ENV, Some("/tmp/litepack-root")), (PYTHON_ENV, Some("/usr/bin/python3.7"))],
      || {
        let config = RecipeConfig::default();
        assert_eq!(config.work_dir, PathBuf::from("/tmp/litepack-root"));
        assert_eq!(config.python, "/usr/bin/python3.7");
        assert_eq!(config.source_dir(), PathBuf::from("/tmp/litepack-root").join(SOURCE_DIR));
        assert_eq!(config.package_dir(), PathBuf::from("/tmp/litepack-root/package"));
      },
    );
  }

  #[test]
  #[serial]
  fn profile_overrides_defaults() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("profile.json");
    std::fs::write(
      &path,
      r#"{
        "platform": {"os": "android", "arch": "armv8", "compiler": "clang"},
        "features": {"gpu": true},
        "config": {"work_dir": "/work", "bazel": "/opt/bazel/bin/bazel", "formatter": {"pip": null}}
      }"#,
    )
    .unwrap();

    let profile = Profile::load(&path).unwrap();

    assert_eq!(
      profile.platform,
      Some(Platform::new(Os::Android, Arch::Armv8, Compiler::Clang))
    );
    assert!(profile.features.gpu);
    assert_eq!(profile.config.work_dir, PathBuf::from("/work"));
    assert_eq!(profile.config.bazel, "/opt/bazel/bin/bazel");
    assert_eq!(profile.config.formatter.program, "autopep8");
    assert_eq!(profile.config.formatter.pip, None);
  }

  #[test]
  #[serial]
  fn relative_dirs_become_absolute() {
    let temp = tempdir().unwrap();
    let existing = temp.path().join("existing");
    std::fs::create_dir_all(&existing).unwrap();

    let mut config = RecipeConfig::default().with_work_dir("not-created-yet/work");
    config.package_dir = Some(PathBuf::from("out"));
    let config = config.absolute().unwrap();

    assert!(config.work_dir.is_absolute());
    assert!(config.work_dir.ends_with("not-created-yet/work"));
    assert!(config.sycl_dir().is_absolute());
    assert!(config.package_dir().is_absolute());

    let config = RecipeConfig::default().with_work_dir(&existing).absolute().unwrap();
    assert_eq!(config.work_dir, dunce::canonicalize(&existing).unwrap());
  }

  #[test]
  fn malformed_profile_reports_path() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = Profile::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("broken.json"));
  }
}
