use super::workspace::{list_entries, Workspace};
use crate::types::{BatchResult, PairKey};
use std::fs;
use std::path::{Path, PathBuf};

/// Moves completed workspaces into the results collection
#[derive(Debug, Clone)]
pub struct ResultPublisher {
    results_dir: PathBuf,
}

impl ResultPublisher {
    pub fn new<P: Into<PathBuf>>(results_dir: P) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn result_dir(&self, key: &PairKey) -> PathBuf {
        self.results_dir.join(key.dir_name())
    }

    pub fn is_published(&self, key: &PairKey) -> bool {
        self.result_dir(key).is_dir()
    }

    /// Keys that currently have a published result
    pub fn published(&self) -> BatchResult<Vec<String>> {
        if !self.results_dir.is_dir() {
            return Ok(Vec::new());
        }
        Ok(list_entries(&self.results_dir)?
            .into_iter()
            .filter(|name| !name.starts_with('.'))
            .collect())
    }

    /// Replace the result at `key` with the contents of `workspace`
    ///
    /// The previous result is first renamed into a hidden scratch directory,
    /// so readers never see a mix of old and new artifacts. If the new result
    /// cannot be moved in, the previous one is restored.
    pub fn publish(&self, workspace: Workspace, key: &PairKey) -> BatchResult<PathBuf> {
        fs::create_dir_all(&self.results_dir)?;
        let destination = self.result_dir(key);
        let source = workspace.into_dir();

        let scratch = tempfile::Builder::new()
            .prefix(".replaced-")
            .tempdir_in(&self.results_dir)?;
        let previous = scratch.path().join(key.dir_name());

        let replaced = if destination.exists() {
            fs::rename(&destination, &previous)?;
            true
        } else {
            false
        };

        if let Err(e) = fs::rename(&source, &destination) {
            if replaced {
                if let Err(restore) = fs::rename(&previous, &destination) {
                    log::error!(
                        "Could not restore previous result {}: {}",
                        destination.display(),
                        restore
                    );
                }
            }
            return Err(e.into());
        }

        if replaced {
            log::info!("Replaced previous result for {}", key);
        }
        scratch.close()?;

        log::info!("Published {} -> {}", key, destination.display());
        Ok(destination)
    }
}
