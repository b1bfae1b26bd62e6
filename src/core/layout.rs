use crate::types::{BatchError, BatchResult, PairKey};
use std::path::{Path, PathBuf};

pub const RAW_DIR: &str = "raw";
pub const TOPO_DIR: &str = "topo";
pub const STAGING_DIR: &str = "intf";
pub const RESULTS_DIR: &str = "intf_all";

pub const DEM_FILE: &str = "dem.grd";
pub const TOPO_MASTER_PRM: &str = "master.PRM";
pub const TOPO_RA_FILE: &str = "topo_ra.grd";
pub const TOPO_SHIFT_FILE: &str = "topo_shift.grd";
pub const TRANSFORM_FILE: &str = "trans.dat";
pub const LANDMASK_FILE: &str = "landmask_ra.grd";

/// Absolute on-disk layout of a batch run
///
/// ```text
/// <root>/raw/       acquisitions (<id>.PRM, <id>.SLC, <id>.LED)
/// <root>/topo/      elevation model and stage-1 products
/// <root>/intf/      per-pair staging workspaces
/// <root>/intf_all/  published results
/// ```
#[derive(Debug, Clone)]
pub struct BatchLayout {
    root: PathBuf,
}

impl BatchLayout {
    /// Resolve the batch root to an absolute path
    pub fn new<P: AsRef<Path>>(root: P) -> BatchResult<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(BatchError::missing("batch root directory", root));
        }

        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join(RAW_DIR)
    }

    pub fn topo_dir(&self) -> PathBuf {
        self.root.join(TOPO_DIR)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join(RESULTS_DIR)
    }

    pub fn dem_path(&self) -> PathBuf {
        self.topo_dir().join(DEM_FILE)
    }

    pub fn landmask_path(&self) -> PathBuf {
        self.topo_dir().join(LANDMASK_FILE)
    }

    pub fn prm_path(&self, id: &str) -> PathBuf {
        self.raw_dir().join(format!("{}.PRM", id))
    }

    pub fn slc_path(&self, id: &str) -> PathBuf {
        self.raw_dir().join(format!("{}.SLC", id))
    }

    pub fn led_path(&self, id: &str) -> PathBuf {
        self.raw_dir().join(format!("{}.LED", id))
    }

    pub fn workspace_dir(&self, key: &PairKey) -> PathBuf {
        self.staging_dir().join(key.dir_name())
    }

    pub fn result_dir(&self, key: &PairKey) -> PathBuf {
        self.results_dir().join(key.dir_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AcquisitionEpoch;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths_are_absolute() {
        let dir = TempDir::new().unwrap();
        let layout = BatchLayout::new(dir.path()).unwrap();
        let key = PairKey::new(AcquisitionEpoch(2015146), AcquisitionEpoch(2015158));

        assert!(layout.root().is_absolute());
        assert!(layout.prm_path("S1_A").ends_with("raw/S1_A.PRM"));
        assert!(layout.workspace_dir(&key).ends_with("intf/2015146_2015158"));
        assert!(layout.result_dir(&key).ends_with("intf_all/2015146_2015158"));
        assert!(layout.dem_path().ends_with("topo/dem.grd"));
    }

    #[test]
    fn test_missing_root() {
        let dir = TempDir::new().unwrap();
        assert!(BatchLayout::new(dir.path().join("nope")).is_err());
    }
}
