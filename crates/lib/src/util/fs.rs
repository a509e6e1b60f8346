//! Filesystem helpers shared by the provisioner and the packager.

use std::io;
use std::path::Path;

/// Create a symlink at `link` pointing to `target`.
pub fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
  #[cfg(unix)]
  {
    std::os::unix::fs::symlink(target, link)
  }
  #[cfg(windows)]
  {
    let resolved = link.parent().map(|p| p.join(target)).unwrap_or_else(|| target.to_path_buf());
    if resolved.is_dir() {
      std::os::windows::fs::symlink_dir(target, link)
    } else {
      std::os::windows::fs::symlink_file(target, link)
    }
  }
}

/// Give a file fully open permissions (0777 on Unix, not read-only on Windows).
pub fn make_fully_accessible(path: &Path) -> io::Result<()> {
  let mut perms = std::fs::metadata(path)?.permissions();

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    perms.set_mode(0o777);
  }
  #[cfg(not(unix))]
  {
    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);
  }

  std::fs::set_permissions(path, perms)
}

/// Mark a downloaded installer as executable.
#[cfg(unix)]
pub fn make_executable(path: &Path) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;

  let mut perms = std::fs::metadata(path)?.permissions();
  perms.set_mode(perms.mode() | 0o755);
  std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> io::Result<()> {
  Ok(())
}
