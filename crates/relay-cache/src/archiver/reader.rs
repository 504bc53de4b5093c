use super::RESTORED_DIR_MODE;
use relay_core::{AnchoredPath, Error, Result};
use std::fs::{self, OpenOptions};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tar::{Entry, EntryType};
use tracing::{debug, info, warn};

/// Restores a zstd-compressed tar stream onto disk.
pub struct ArchiveReader<R: Read> {
    archive: tar::Archive<zstd::Decoder<'static, BufReader<R>>>,
}

/// A symlink whose target was absent when its entry was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSymlink {
    pub path: AnchoredPath,
    pub target: String,
}

impl<R: Read> ArchiveReader<R> {
    pub fn new(source: R) -> Result<Self> {
        let decoder = zstd::Decoder::new(source)?;
        Ok(Self {
            archive: tar::Archive::new(decoder),
        })
    }

    /// Restore every entry below `root`, returning restored paths in archive
    /// order.
    ///
    /// The first failure aborts the restore; anything written before it stays
    /// on disk.
    pub fn restore(mut self, root: &Path) -> Result<Vec<AnchoredPath>> {
        fs::create_dir_all(root)?;
        let root = fs::canonicalize(root)?;
        let root = root.as_path();

        let mut restored = Vec::new();
        let mut pending = Vec::new();

        let entries = self.archive.entries().map_err(malformed)?;
        for entry in entries {
            let mut entry = entry.map_err(malformed)?;
            let name = entry_name(&entry)?;
            let destination = name.resolve(root)?;
            let kind = entry.header().entry_type();
            // Directories are created through an existing link at their own path.
            check_contained(root, &name, kind == EntryType::Directory)?;

            match kind {
                EntryType::Directory => {
                    debug!(path = %name, "Restoring directory");
                    restore_directory(&destination)?;
                }
                EntryType::Regular | EntryType::Continuous => {
                    debug!(path = %name, "Restoring file");
                    restore_regular(&destination, &mut entry)?;
                }
                EntryType::Symlink => {
                    let link = PendingSymlink {
                        path: name.clone(),
                        target: link_target(&entry, &name)?,
                    };
                    if link.target_exists(&destination) {
                        debug!(path = %name, target = %link.target, "Restoring symlink");
                        link.materialize(&destination)?;
                    } else {
                        debug!(path = %name, target = %link.target, "Deferring symlink until its target exists");
                        pending.push(link);
                    }
                }
                other => {
                    warn!(path = %name, kind = ?other, "Skipping unhandled archive entry type");
                    continue;
                }
            }

            restored.push(name);
        }

        for link in &pending {
            debug!(path = %link.path, target = %link.target, "Restoring deferred symlink");
            link.materialize(&link.path.resolve(root)?)?;
        }

        info!(
            root = %root.display(),
            entries = restored.len(),
            deferred_symlinks = pending.len(),
            "Restored archive"
        );
        Ok(restored)
    }
}

impl PendingSymlink {
    fn target_exists(&self, destination: &Path) -> bool {
        resolve_link_target(destination, &self.target).exists()
    }

    /// Create the link, replacing whatever currently occupies its path.
    fn materialize(&self, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        if fs::symlink_metadata(destination).is_ok() {
            fs::remove_file(destination)?;
        }
        create_symlink(&self.target, destination)
    }
}

fn malformed(err: io::Error) -> Error {
    Error::ArchiveFormat(err.to_string())
}

fn entry_name<R: Read>(entry: &Entry<'_, R>) -> Result<AnchoredPath> {
    let bytes = entry.path_bytes();
    let name = std::str::from_utf8(&bytes)
        .map_err(|_| Error::ArchiveFormat("entry name is not valid UTF-8".to_string()))?;
    AnchoredPath::new(name)
}

fn link_target<R: Read>(entry: &Entry<'_, R>, name: &AnchoredPath) -> Result<String> {
    let bytes = entry
        .link_name_bytes()
        .ok_or_else(|| Error::LinkTargetNotOnHeader(name.to_string()))?;
    let target = std::str::from_utf8(&bytes).map_err(|_| {
        Error::ArchiveFormat(format!("link target of {} is not valid UTF-8", name))
    })?;
    Ok(target.to_string())
}

fn restore_directory(destination: &Path) -> Result<()> {
    fs::create_dir_all(destination)?;
    set_mode(destination, RESTORED_DIR_MODE)
}

fn restore_regular<R: Read>(destination: &Path, entry: &mut Entry<'_, R>) -> Result<()> {
    let mode = entry.header().mode().map_err(malformed)?;

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    // Never write through a link left at this path by an earlier entry.
    if fs::symlink_metadata(destination).is_ok_and(|m| m.file_type().is_symlink()) {
        fs::remove_file(destination)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }

    let mut file = options.open(destination)?;
    io::copy(entry, &mut file)?;
    set_mode(destination, mode)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &str, destination: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, destination)?;
    Ok(())
}

#[cfg(windows)]
fn create_symlink(target: &str, destination: &Path) -> Result<()> {
    if resolve_link_target(destination, target).is_dir() {
        std::os::windows::fs::symlink_dir(target, destination)?;
    } else {
        std::os::windows::fs::symlink_file(target, destination)?;
    }
    Ok(())
}

/// Where a link at `link` pointing to `target` lands, without touching disk.
fn resolve_link_target(link: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        return target.to_path_buf();
    }
    match link.parent() {
        Some(parent) => parent.join(target),
        None => target.to_path_buf(),
    }
}

/// Refuse an entry whose nearest existing ancestor, or the entry itself when
/// `include_self` is set, resolves outside `root` once every symlink is
/// followed. `root` must already be canonical.
fn check_contained(root: &Path, name: &AnchoredPath, include_self: bool) -> Result<()> {
    let mut current = if include_self {
        Some(name.clone())
    } else {
        name.parent()
    };
    while let Some(path) = current {
        let resolved = path.resolve(root)?;
        if fs::symlink_metadata(&resolved).is_ok() {
            let landing = fs::canonicalize(&resolved).ok();
            if !landing.as_ref().is_some_and(|landing| landing.starts_with(root)) {
                let landing = landing
                    .map(|landing| landing.display().to_string())
                    .unwrap_or_else(|| "an unresolvable link".to_string());
                return Err(Error::PathEscapesRoot(format!(
                    "{} (via {} -> {})",
                    name, path, landing
                )));
            }
            return Ok(());
        }
        current = path.parent();
    }
    Ok(())
}
