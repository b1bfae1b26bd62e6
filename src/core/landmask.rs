use crate::types::{BatchError, BatchResult};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Land mask shared by every pair of a batch run
///
/// The mask is built on first request only. Concurrent callers block on the
/// in-flight build instead of starting their own, and every later caller gets
/// the same path. A failed build is not cached, so the next request retries.
#[derive(Debug, Default)]
pub struct LandmaskCache {
    mask: OnceCell<PathBuf>,
    builds: AtomicUsize,
}

impl LandmaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached mask, running `build` if no mask exists yet
    pub fn get_or_build<F>(&self, build: F) -> BatchResult<&Path>
    where
        F: FnOnce() -> BatchResult<PathBuf>,
    {
        let mask = self.mask.get_or_try_init(|| {
            log::info!("Building shared land mask");
            self.builds.fetch_add(1, Ordering::SeqCst);
            let path = build()?;
            log::info!("Land mask ready: {}", path.display());
            Ok::<_, BatchError>(path)
        })?;

        Ok(mask.as_path())
    }

    pub fn get(&self) -> Option<&Path> {
        self.mask.get().map(PathBuf::as_path)
    }

    /// Number of build attempts made during this run
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}
