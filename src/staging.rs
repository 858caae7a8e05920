// Executable Staging
//
// Copies the bundled ccminer asset into app-private storage on first run and
// marks it executable. An existing staged copy is reused as-is.

use crate::error::MinerError;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Copied,
    AlreadyPresent,
}

#[derive(Debug, Clone)]
pub struct StagedExecutable {
    pub path: PathBuf,
    pub status: StageStatus,
}

impl StagedExecutable {
    /// Status line for the presenter
    pub fn user_message(&self) -> &'static str {
        match self.status {
            StageStatus::Copied => "ccminer binary ready.",
            StageStatus::AlreadyPresent => "ccminer binary already exists.",
        }
    }
}

/// Stage `asset` at `target` unless a copy is already there
pub fn stage_executable(asset: &Path, target: &Path) -> Result<StagedExecutable, MinerError> {
    if target.exists() {
        tracing::debug!(path = %target.display(), "ccminer binary already exists");
        return Ok(StagedExecutable {
            path: target.to_path_buf(),
            status: StageStatus::AlreadyPresent,
        });
    }

    copy_asset(asset, target).map_err(|source| {
        tracing::error!(asset = %asset.display(), error = %source, "Failed to copy ccminer binary");
        MinerError::StagingFailure {
            asset: asset.to_path_buf(),
            source,
        }
    })?;

    tracing::info!(path = %target.display(), "ccminer binary copied and set executable");
    Ok(StagedExecutable {
        path: target.to_path_buf(),
        status: StageStatus::Copied,
    })
}

fn copy_asset(asset: &Path, target: &Path) -> io::Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no parent directory"))?;
    fs::create_dir_all(parent)?;

    let mut source = File::open(asset)?;

    // A crash mid-copy must not leave a truncated binary behind to be reused
    let mut tmp = NamedTempFile::new_in(parent)?;
    io::copy(&mut source, tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    set_executable(tmp.path())?;
    tmp.persist(target).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// True if `path` is a regular file the current user may execute
pub fn is_executable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => has_exec_permission(path, &metadata),
        _ => false,
    }
}

#[cfg(unix)]
fn has_exec_permission(path: &Path, _metadata: &fs::Metadata) -> bool {
    use nix::unistd::{access, AccessFlags};
    access(path, AccessFlags::X_OK).is_ok()
}

#[cfg(not(unix))]
fn has_exec_permission(_path: &Path, _metadata: &fs::Metadata) -> bool {
    true
}
