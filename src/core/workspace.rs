use crate::types::{BatchError, BatchResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Working directory owned by one processing step
///
/// Raw acquisitions are symlinked in by absolute path. Stage products shared
/// from `topo/` are pinned (hard-linked or copied) so a published result never
/// depends on the shared directory. Inputs that the tools rewrite (`.PRM`
/// metadata) are copied so the originals in `raw/` stay untouched.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    /// Create an empty workspace, discarding leftovers from an earlier run
    pub fn fresh<P: Into<PathBuf>>(dir: P) -> BatchResult<Self> {
        let dir = dir.into();

        if dir.exists() {
            log::warn!("Removing stale workspace {}", dir.display());
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        log::debug!("Created workspace {}", dir.display());
        Ok(Self { dir })
    }

    /// Open an existing directory as a workspace, creating it if needed
    pub fn open<P: Into<PathBuf>>(dir: P) -> BatchResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    /// Symlink a read-only shared input into the workspace
    pub fn link_shared(&self, source: &Path, name: &str) -> BatchResult<PathBuf> {
        if !source.exists() {
            return Err(BatchError::missing("shared input", source));
        }

        let target = self.path(name);
        remove_entry(&target)?;
        symlink(source, &target)?;

        log::debug!("Linked {} -> {}", target.display(), source.display());
        Ok(target)
    }

    /// Hard-link a shared stage product into the workspace, copying when the
    /// filesystem refuses the link
    ///
    /// The entry outlives the shared file: a later rebuild removes and
    /// rewrites `topo/`, and the published result keeps its own copy.
    pub fn pin_shared(&self, source: &Path, name: &str) -> BatchResult<PathBuf> {
        if !source.is_file() {
            return Err(BatchError::missing("shared product", source));
        }

        let target = self.path(name);
        remove_entry(&target)?;
        if let Err(e) = fs::hard_link(source, &target) {
            log::debug!(
                "Hard link {} failed ({}), copying instead",
                source.display(),
                e
            );
            fs::copy(source, &target)?;
        }

        log::debug!("Pinned {} -> {}", target.display(), source.display());
        Ok(target)
    }

    /// Copy an input the workspace may modify
    pub fn copy_owned(&self, source: &Path, name: &str) -> BatchResult<PathBuf> {
        if !source.is_file() {
            return Err(BatchError::missing("input file", source));
        }

        let target = self.path(name);
        remove_entry(&target)?;
        fs::copy(source, &target)?;

        log::debug!("Copied {} -> {}", source.display(), target.display());
        Ok(target)
    }

    /// Delete outputs that must be regenerated
    pub fn remove_stale(&self, names: &[&str]) -> BatchResult<()> {
        for name in names {
            let path = self.path(name);
            if remove_entry(&path)? {
                log::debug!("Removed stale {}", path.display());
            }
        }
        Ok(())
    }

    /// Sorted names of the entries currently in the workspace
    pub fn artifacts(&self) -> BatchResult<Vec<String>> {
        list_entries(&self.dir)
    }

    pub(crate) fn into_dir(self) -> PathBuf {
        self.dir
    }
}

pub(crate) fn list_entries(dir: &Path) -> BatchResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Remove a file or symlink (dangling links included); true when something was removed
fn remove_entry(path: &Path) -> BatchResult<bool> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => {
            fs::remove_dir_all(path)?;
            Ok(true)
        }
        Ok(_) => {
            fs::remove_file(path)?;
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    if source.is_dir() {
        std::os::windows::fs::symlink_dir(source, target)
    } else {
        std::os::windows::fs::symlink_file(source, target)
    }
}
