//! MaskVault - Secure Filesystem Operations
//!
//! Atomic, owner-only writes for key material and encrypted artifacts, plus
//! the writability probe used by key directory resolution.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::error::VaultResult;

/// Filesystem handler rooted at one directory
#[derive(Debug, Clone)]
pub struct SecureFs {
    root: PathBuf,
}

impl SecureFs {
    /// Create new SecureFs with root directory
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get full path for a relative file
    pub fn full_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write file atomically under the root
    pub fn write_file(&self, relative_path: &str, data: &[u8]) -> VaultResult<PathBuf> {
        let path = self.full_path(relative_path);
        write_atomic(&path, data)?;
        Ok(path)
    }

    /// Write several files under the root as one unit
    pub fn write_files<const N: usize>(&self, files: [(&str, &[u8]); N]) -> VaultResult<[PathBuf; N]> {
        let paths = files.map(|(rel, _)| self.full_path(rel));
        let entries: Vec<(&Path, &[u8])> = paths
            .iter()
            .zip(files)
            .map(|(path, (_, data))| (path.as_path(), data))
            .collect();
        write_atomic_all(&entries)?;
        Ok(paths)
    }

    /// Read a file under the root
    pub fn read_file(&self, relative_path: &str) -> VaultResult<Vec<u8>> {
        Ok(fs::read(self.full_path(relative_path))?)
    }

    /// Whether a regular file exists under the root
    pub fn exists(&self, relative_path: &str) -> bool {
        self.full_path(relative_path).is_file()
    }
}

/// Temp file sitting next to `path`, so the final rename never crosses
/// filesystems.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

fn open_private(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(path)
}

fn write_temp(temp_path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = open_private(temp_path)?;
    file.write_all(data)?;
    file.sync_all()
}

fn create_parent(path: &Path) -> std::io::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

fn sync_parent(path: &Path) {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

/// Write `data` to `path` via temp file + fsync + rename.
///
/// A crash at any point leaves either the old file or the new one, never a
/// truncated mix. Files are created with 0600 on Unix.
pub fn write_atomic(path: &Path, data: &[u8]) -> VaultResult<()> {
    create_parent(path)?;

    let temp_path = temp_path_for(path);
    let result = write_temp(&temp_path, data).and_then(|()| fs::rename(&temp_path, path));

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    sync_parent(path);
    tracing::debug!(path = %path.display(), bytes = data.len(), "atomic write complete");
    Ok(())
}

/// Replace several files as one unit.
///
/// Every temp file is written and synced before the first rename. If a
/// rename fails, files already replaced get their previous content back
/// (or are removed if they did not exist).
pub fn write_atomic_all(files: &[(&Path, &[u8])]) -> VaultResult<()> {
    let temps: Vec<PathBuf> = files.iter().map(|(path, _)| temp_path_for(path)).collect();
    let discard_temps = || {
        for temp in &temps {
            let _ = fs::remove_file(temp);
        }
    };

    for ((path, data), temp) in files.iter().zip(&temps) {
        if let Err(e) = create_parent(path).and_then(|()| write_temp(temp, data)) {
            discard_temps();
            return Err(e.into());
        }
    }

    let previous: Vec<Option<Zeroizing<Vec<u8>>>> = files
        .iter()
        .map(|(path, _)| fs::read(path).ok().map(Zeroizing::new))
        .collect();

    for (index, ((path, _), temp)) in files.iter().zip(&temps).enumerate() {
        if let Err(e) = fs::rename(temp, path) {
            tracing::warn!(path = %path.display(), error = %e, "rename failed, restoring previous files");
            for ((done, _), old) in files[..index].iter().zip(&previous) {
                let _ = match old {
                    Some(bytes) => write_atomic(done, bytes),
                    None => fs::remove_file(done).map_err(Into::into),
                };
            }
            discard_temps();
            return Err(e.into());
        }
    }

    for (path, data) in files {
        sync_parent(path);
        tracing::debug!(path = %path.display(), bytes = data.len(), "atomic write complete");
    }
    Ok(())
}

/// Create `dir` (0700 on Unix) if needed and prove it is writable by
/// writing and removing a probe file. Existence alone proves nothing: a
/// directory can exist on a read-only mount.
pub fn ensure_writable_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.is_dir() {
        fs::create_dir_all(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
        }
    }

    let mut nonce = [0u8; 8];
    getrandom::getrandom(&mut nonce)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let probe = dir.join(format!(".write_probe_{}", hex::encode(nonce)));

    let outcome = (|| -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(&probe)?;
        file.write_all(b"probe")?;
        file.sync_all()
    })();
    let _ = fs::remove_file(&probe);
    outcome
}
