//! Provisioning of build inputs.
//!
//! Ensures the Bazel installer, the triSYCL headers and the TensorFlow source
//! tree exist in the work directory. Each resource is fetched only when its
//! local path is missing, so re-running is free once everything is present.

use std::collections::BTreeMap;
use std::future::Future;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{BAZEL_VERSION, LIBRARY_VERSION, SOURCE_DIR, SYCL_DIR};
use crate::platform::Os;
use crate::util::fs::make_executable;
use crate::util::hash::hash_bytes;

/// Errors that can occur while provisioning inputs.
#[derive(Debug, Error)]
pub enum ProvisionError {
  /// HTTP request failed.
  #[error("fetch failed for {url}: {message}")]
  FetchFailed { url: String, message: String },

  /// SHA256 hash mismatch after download.
  #[error("hash mismatch for {url}: expected {expected}, got {actual}")]
  HashMismatch {
    url: String,
    expected: String,
    actual: String,
  },

  #[error("unsupported archive format: {0}")]
  UnsupportedArchive(String),

  #[error("failed to extract {url}: {message}")]
  Extract { url: String, message: String },

  /// The archive did not contain the directory the recipe expects.
  #[error("expected {path} after extraction")]
  MissingExtracted { path: PathBuf },

  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// How a resource lands on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResourceKind {
  /// Single downloaded file.
  File { executable: bool },
  /// Archive unpacked into the work dir; `extracted` is its top-level
  /// directory, renamed to the resource's local path when they differ.
  Archive { extracted: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
  pub name: String,
  /// Path relative to the work directory.
  pub local: PathBuf,
  pub url: String,
  pub kind: ResourceKind,
  pub sha256: Option<String>,
}

/// Name of the Bazel release asset for `host`.
pub fn bazel_installer_name(host: Os) -> String {
  match host {
    Os::Windows => format!("bazel-{}-windows-x86_64.exe", BAZEL_VERSION),
    other => format!("bazel-{}-installer-{}-x86_64.sh", BAZEL_VERSION, other.bazel_name()),
  }
}

/// The three inputs of a build, in fetch order.
///
/// `pins` maps resource names (`bazel`, `trisycl`, `tensorflow`) to expected
/// SHA-256 digests.
pub fn resources(host: Os, pins: &BTreeMap<String, String>) -> Vec<Resource> {
  let bazel = bazel_installer_name(host);
  let pin = |name: &str| pins.get(name).cloned();

  vec![
    Resource {
      name: "bazel".to_string(),
      local: PathBuf::from(&bazel),
      url: format!(
        "https://github.com/bazelbuild/bazel/releases/download/{}/{}",
        BAZEL_VERSION, bazel
      ),
      kind: ResourceKind::File {
        executable: host != Os::Windows,
      },
      sha256: pin("bazel"),
    },
    Resource {
      name: "trisycl".to_string(),
      local: PathBuf::from(SYCL_DIR),
      url: "https://github.com/triSYCL/triSYCL/archive/master.zip".to_string(),
      kind: ResourceKind::Archive {
        extracted: SYCL_DIR.to_string(),
      },
      sha256: pin("trisycl"),
    },
    Resource {
      name: "tensorflow".to_string(),
      local: PathBuf::from(SOURCE_DIR),
      url: format!(
        "https://github.com/tensorflow/tensorflow/archive/v{}.tar.gz",
        LIBRARY_VERSION
      ),
      kind: ResourceKind::Archive {
        extracted: format!("tensorflow-{}", LIBRARY_VERSION),
      },
      sha256: pin("tensorflow"),
    },
  ]
}

/// Fetches remote resources.
pub trait Downloader {
  /// Download `url` to the file `dest`.
  fn download(
    &self,
    url: &str,
    dest: &Path,
    sha256: Option<&str>,
  ) -> impl Future<Output = Result<(), ProvisionError>>;

  /// Download the archive at `url` and unpack it inside `dest_dir`, keeping
  /// its top-level directory.
  fn download_archive(
    &self,
    url: &str,
    dest_dir: &Path,
    sha256: Option<&str>,
  ) -> impl Future<Output = Result<(), ProvisionError>>;
}

/// Outcome of a provisioning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
  pub fetched: Vec<String>,
  pub skipped: Vec<String>,
}

/// Make sure every resource exists under `work_dir`.
///
/// Failures are fatal and nothing is retried.
pub async fn provision(
  work_dir: &Path,
  resources: &[Resource],
  downloader: &impl Downloader,
) -> Result<ProvisionReport, ProvisionError> {
  tokio::fs::create_dir_all(work_dir)
    .await
    .map_err(|source| ProvisionError::Io {
      path: work_dir.to_path_buf(),
      source,
    })?;

  let mut report = ProvisionReport::default();

  for resource in resources {
    let local = work_dir.join(&resource.local);
    if local.exists() {
      debug!(name = %resource.name, path = %local.display(), "already present, skipping");
      report.skipped.push(resource.name.clone());
      continue;
    }

    info!(name = %resource.name, url = %resource.url, "downloading");

    match &resource.kind {
      ResourceKind::File { executable } => {
        downloader
          .download(&resource.url, &local, resource.sha256.as_deref())
          .await?;
        if *executable {
          make_executable(&local).map_err(|source| ProvisionError::Io {
            path: local.clone(),
            source,
          })?;
        }
      }
      ResourceKind::Archive { extracted } => {
        downloader
          .download_archive(&resource.url, work_dir, resource.sha256.as_deref())
          .await?;

        let extracted = work_dir.join(extracted);
        if !extracted.exists() {
          return Err(ProvisionError::MissingExtracted { path: extracted });
        }
        if extracted != local {
          debug!(from = %extracted.display(), to = %local.display(), "renaming extracted directory");
          tokio::fs::rename(&extracted, &local)
            .await
            .map_err(|source| ProvisionError::Io {
              path: local.clone(),
              source,
            })?;
        }
      }
    }

    report.fetched.push(resource.name.clone());
  }

  Ok(report)
}

/// `Downloader` over HTTPS with `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct HttpDownloader {
  client: reqwest::Client,
}

impl HttpDownloader {
  pub fn new() -> Self {
    Self::default()
  }

  async fn fetch_bytes(&self, url: &str, sha256: Option<&str>) -> Result<Vec<u8>, ProvisionError> {
    let fetch_failed = |message: String| ProvisionError::FetchFailed {
      url: url.to_string(),
      message,
    };

    let response = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|e| fetch_failed(e.to_string()))?;

    if !response.status().is_success() {
      return Err(fetch_failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| fetch_failed(e.to_string()))?;

    if let Some(expected) = sha256 {
      let actual = hash_bytes(&bytes);
      if !actual.matches(expected) {
        return Err(ProvisionError::HashMismatch {
          url: url.to_string(),
          expected: expected.to_string(),
          actual: actual.0,
        });
      }
      debug!(url = %url, "hash verified");
    }

    info!(url = %url, size = bytes.len(), "download complete");
    Ok(bytes.to_vec())
  }
}

impl Downloader for HttpDownloader {
  async fn download(&self, url: &str, dest: &Path, sha256: Option<&str>) -> Result<(), ProvisionError> {
    let bytes = self.fetch_bytes(url, sha256).await?;

    let io_err = |source| ProvisionError::Io {
      path: dest.to_path_buf(),
      source,
    };
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));

    // Write next to the destination and rename so an interrupted download
    // never leaves a file that the existence check would accept.
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.as_file_mut().write_all(&bytes).map_err(io_err)?;
    tmp.persist(dest).map_err(|e| io_err(e.error))?;

    Ok(())
  }

  async fn download_archive(&self, url: &str, dest_dir: &Path, sha256: Option<&str>) -> Result<(), ProvisionError> {
    let format = ArchiveFormat::from_url(url)?;
    let bytes = self.fetch_bytes(url, sha256).await?;

    let staging = tempfile::TempDir::new_in(dest_dir).map_err(|source| ProvisionError::Io {
      path: dest_dir.to_path_buf(),
      source,
    })?;
    let staging_path = staging.path().to_path_buf();

    let extract_url = url.to_string();
    tokio::task::spawn_blocking(move || format.unpack(&bytes, &staging_path))
      .await
      .map_err(|e| ProvisionError::Extract {
        url: extract_url.clone(),
        message: e.to_string(),
      })?
      .map_err(|message| ProvisionError::Extract {
        url: extract_url,
        message,
      })?;

    // Move the top-level entries out of the staging directory
    let entries = std::fs::read_dir(staging.path()).map_err(|source| ProvisionError::Io {
      path: staging.path().to_path_buf(),
      source,
    })?;
    for entry in entries {
      let entry = entry.map_err(|source| ProvisionError::Io {
        path: staging.path().to_path_buf(),
        source,
      })?;
      let target = dest_dir.join(entry.file_name());
      std::fs::rename(entry.path(), &target).map_err(|source| ProvisionError::Io { path: target, source })?;
    }

    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
  TarGz,
  Zip,
}

impl ArchiveFormat {
  fn from_url(url: &str) -> Result<Self, ProvisionError> {
    let path = url.split('?').next().unwrap_or(url);
    if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
      Ok(Self::TarGz)
    } else if path.ends_with(".zip") {
      Ok(Self::Zip)
    } else {
      Err(ProvisionError::UnsupportedArchive(url.to_string()))
    }
  }

  fn unpack(self, bytes: &[u8], dest: &Path) -> Result<(), String> {
    match self {
      Self::TarGz => {
        let decoder = flate2::read::GzDecoder::new(Cursor::new(bytes));
        tar::Archive::new(decoder).unpack(dest).map_err(|e| e.to_string())
      }
      Self::Zip => {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
        archive.extract(dest).map_err(|e| e.to_string())
      }
    }
  }
}
