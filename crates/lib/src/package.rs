//! Packaging of built libraries and public headers.
//!
//! Output layout:
//!
//! ```text
//! <package>/
//!   lib/                     shared libraries, flat
//!   include/tensorflow/lite/ headers, relative layout kept
//!   package_info.json
//! ```

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::consts::{LIBRARY_VERSION, PACKAGE_NAME};
use crate::options::link_names;
use crate::platform::Features;
use crate::util::fs::{create_symlink, make_fully_accessible};

/// Name of the metadata file written at the package root.
pub const PACKAGE_INFO_FILE: &str = "package_info.json";

/// Runfiles trees Bazel leaves next to the libraries. They hold copies of
/// the same file names and would collide in a flat copy.
const RUNFILES_DIRS: [&str; 2] = [
  "libtensorflowlite.so.runfiles",
  "delegates/gpu/libtensorflowlite_gpu_gl.so.runfiles",
];

#[derive(Debug, Error)]
pub enum PackageError {
  #[error("build output not found at {0}, run the build first")]
  MissingBuildOutput(PathBuf),

  #[error("header directory not found at {0}, fetch the sources first")]
  MissingHeaders(PathBuf),

  #[error("library {name} built twice, at {first} and {second}")]
  DuplicateLibrary {
    name: String,
    first: PathBuf,
    second: PathBuf,
  },

  #[error("failed to walk {path}: {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to copy {from} to {to}: {source}")]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("I/O error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to serialize package info: {0}")]
  Serialize(#[from] serde_json::Error),
}

/// What consumers need to link against the package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
  pub name: String,
  pub version: String,
  /// Link names, primary library first.
  pub libs: Vec<String>,
  pub lib_dirs: Vec<String>,
  pub include_dirs: Vec<String>,
}

/// Package metadata for `features`.
pub fn package_info(features: &Features) -> PackageInfo {
  PackageInfo {
    name: PACKAGE_NAME.to_string(),
    version: LIBRARY_VERSION.to_string(),
    libs: link_names(features).into_iter().map(String::from).collect(),
    lib_dirs: vec!["lib".to_string()],
    include_dirs: vec!["include".to_string()],
  }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PackageReport {
  pub package_dir: PathBuf,
  /// Library files copied into `lib/`.
  pub libraries: Vec<PathBuf>,
  pub headers: usize,
}

/// Whether `name` is a shared library worth shipping.
fn is_library(name: &str) -> bool {
  name.ends_with(".so") || name.ends_with(".dll") || name.contains(".dylib")
}

fn is_header(name: &str) -> bool {
  name.ends_with(".h") || name.ends_with(".hpp")
}

/// Copy the built libraries and headers from `source_dir` into `package_dir`.
pub fn package(source_dir: &Path, package_dir: &Path, features: &Features) -> Result<PackageReport, PackageError> {
  let lib_src = source_dir.join("bazel-bin/tensorflow/lite");
  let inc_src = source_dir.join("tensorflow/lite");

  if !lib_src.exists() {
    return Err(PackageError::MissingBuildOutput(lib_src));
  }
  if !inc_src.is_dir() {
    return Err(PackageError::MissingHeaders(inc_src));
  }

  for runfiles in RUNFILES_DIRS {
    let path = lib_src.join(runfiles);
    if std::fs::remove_dir_all(&path).is_ok() {
      debug!(path = %path.display(), "removed runfiles");
    }
  }

  let lib_dst = package_dir.join("lib");
  let libraries = copy_libraries(&lib_src, &lib_dst)?;

  let inc_dst = package_dir.join("include/tensorflow/lite");
  let headers = copy_headers(&inc_src, &inc_dst)?;

  let info = package_info(features);
  let info_path = package_dir.join(PACKAGE_INFO_FILE);
  let json = serde_json::to_string_pretty(&info)?;
  std::fs::write(&info_path, json).map_err(|source| PackageError::Io { path: info_path, source })?;

  info!(
    package = %package_dir.display(),
    libraries = libraries.len(),
    headers,
    "packaged"
  );

  Ok(PackageReport {
    package_dir: package_dir.to_path_buf(),
    libraries,
    headers,
  })
}

/// Copy every library under `src` flat into `dst` and open up its
/// permissions so a later copy can overwrite it. Two libraries with the same
/// file name cannot share the flat directory and fail the copy.
fn copy_libraries(src: &Path, dst: &Path) -> Result<Vec<PathBuf>, PackageError> {
  create_dir(dst)?;

  let mut sources: HashMap<OsString, PathBuf> = HashMap::new();
  let mut copied = Vec::new();
  for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
    let entry = entry.map_err(|source| PackageError::Walk {
      path: src.to_path_buf(),
      source,
    })?;
    if !entry.file_type().is_file() {
      continue;
    }
    let name = entry.file_name().to_string_lossy();
    if !is_library(&name) {
      continue;
    }

    if let Some(first) = sources.get(entry.file_name()) {
      return Err(PackageError::DuplicateLibrary {
        name: name.into_owned(),
        first: first.clone(),
        second: entry.path().to_path_buf(),
      });
    }
    sources.insert(entry.file_name().to_os_string(), entry.path().to_path_buf());

    let target = dst.join(entry.file_name());
    // A stale copy may still carry read-only Bazel permissions
    if target.exists() {
      make_fully_accessible(&target).map_err(|source| PackageError::Io {
        path: target.clone(),
        source,
      })?;
    }
    std::fs::copy(entry.path(), &target).map_err(|source| PackageError::Copy {
      from: entry.path().to_path_buf(),
      to: target.clone(),
      source,
    })?;
    make_fully_accessible(&target).map_err(|source| PackageError::Io {
      path: target.clone(),
      source,
    })?;

    debug!(library = %target.display(), "copied library");
    copied.push(target);
  }

  copied.sort();
  Ok(copied)
}

/// Copy headers under `src` into `dst`, keeping relative paths. Symlinked
/// headers stay symlinks.
fn copy_headers(src: &Path, dst: &Path) -> Result<usize, PackageError> {
  let mut count = 0;

  for entry in WalkDir::new(src) {
    let entry = entry.map_err(|source| PackageError::Walk {
      path: src.to_path_buf(),
      source,
    })?;
    let file_type = entry.file_type();
    if file_type.is_dir() || !is_header(&entry.file_name().to_string_lossy()) {
      continue;
    }

    // strip_prefix cannot fail for entries yielded under `src`
    let Ok(relative) = entry.path().strip_prefix(src) else {
      continue;
    };
    let target = dst.join(relative);
    if let Some(parent) = target.parent() {
      create_dir(parent)?;
    }

    if file_type.is_symlink() {
      let link = std::fs::read_link(entry.path()).map_err(|source| PackageError::Io {
        path: entry.path().to_path_buf(),
        source,
      })?;
      if target.symlink_metadata().is_ok() {
        std::fs::remove_file(&target).map_err(|source| PackageError::Io {
          path: target.clone(),
          source,
        })?;
      }
      create_symlink(&link, &target).map_err(|source| PackageError::Io {
        path: target.clone(),
        source,
      })?;
    } else {
      std::fs::copy(entry.path(), &target).map_err(|source| PackageError::Copy {
        from: entry.path().to_path_buf(),
        to: target.clone(),
        source,
      })?;
    }
    count += 1;
  }

  Ok(count)
}

fn create_dir(path: &Path) -> Result<(), PackageError> {
  std::fs::create_dir_all(path).map_err(|source| PackageError::Io {
    path: path.to_path_buf(),
    source,
  })
}
