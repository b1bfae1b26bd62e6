use super::layout::{
    BatchLayout, TOPO_MASTER_PRM, TOPO_RA_FILE, TOPO_SHIFT_FILE, TRANSFORM_FILE,
};
use super::workspace::Workspace;
use crate::io::Configuration;
use crate::tools::{OffsetSearch, ProcessingTools, AMPLITUDE_MULTIPLIER};
use crate::types::{BatchError, BatchResult};
use std::path::{Path, PathBuf};

/// Stage-1 products shared read-only by every pair
#[derive(Debug, Clone)]
pub struct TopoProducts {
    /// Topography phase in radar coordinates
    pub topo_ra: PathBuf,
    /// Amplitude-shifted topography phase, when `shift_topo` is enabled
    pub topo_shift: Option<PathBuf>,
    /// Radar-to-map transform
    pub transform: PathBuf,
}

impl TopoProducts {
    /// Locate products written by an earlier stage-1 run
    pub fn locate(layout: &BatchLayout, shift_topo: bool) -> BatchResult<Self> {
        let topo_dir = layout.topo_dir();
        let require = |name: &str, what: &str| -> BatchResult<PathBuf> {
            let path = topo_dir.join(name);
            if path.is_file() {
                Ok(path)
            } else {
                Err(BatchError::missing(what, path))
            }
        };

        let products = TopoProducts {
            topo_ra: require(TOPO_RA_FILE, "topography phase grid (run stage 1)")?,
            topo_shift: if shift_topo {
                Some(require(TOPO_SHIFT_FILE, "shifted topography grid (run stage 1)")?)
            } else {
                None
            },
            transform: require(TRANSFORM_FILE, "radar-to-map transform (run stage 1)")?,
        };

        log::info!("Using existing topography products in {}", topo_dir.display());
        Ok(products)
    }

    /// Grid passed to interferogram formation
    pub fn formation_grid(&self, shift_topo: bool) -> BatchResult<&Path> {
        if !shift_topo {
            return Ok(&self.topo_ra);
        }
        self.topo_shift.as_deref().ok_or_else(|| {
            BatchError::PreconditionViolation(
                "shift_topo = 1 but no shifted topography grid was produced".to_string(),
            )
        })
    }
}

/// Stage 1: reference topography-phase model
pub struct TopographyStage<'a> {
    config: &'a Configuration,
    layout: &'a BatchLayout,
    tools: &'a dyn ProcessingTools,
}

impl<'a> TopographyStage<'a> {
    pub fn new(
        config: &'a Configuration,
        layout: &'a BatchLayout,
        tools: &'a dyn ProcessingTools,
    ) -> Self {
        Self {
            config,
            layout,
            tools,
        }
    }

    /// Fail unless every input stage 1 reads for `master` is present
    ///
    /// Runs before `topo/` is touched, so a bad master never costs the
    /// products of an earlier run.
    pub fn check_inputs(&self, master: &str) -> BatchResult<()> {
        if !self.config.topo_phase {
            return Ok(());
        }

        let dem = self.layout.dem_path();
        if !dem.is_file() {
            return Err(BatchError::missing("elevation model", dem));
        }

        let mut required = vec![
            ("master metadata", self.layout.prm_path(master)),
            ("master orbit file", self.layout.led_path(master)),
        ];
        if self.config.region_cut.is_some() || self.config.shift_topo {
            required.push(("master image", self.layout.slc_path(master)));
        }

        for (what, path) in required {
            if !path.is_file() {
                return Err(BatchError::missing(what, path));
            }
        }
        Ok(())
    }

    /// Build the topography products for `master`; `None` when topography phase is disabled
    pub fn run(&self, master: &str) -> BatchResult<Option<TopoProducts>> {
        if !self.config.topo_phase {
            log::info!("Stage 1: topo_phase = 0, no topography phase to model");
            return Ok(None);
        }

        log::info!("Stage 1: modelling topography phase for {}", master);
        self.check_inputs(master)?;
        let dem = self.layout.dem_path();

        let workspace = Workspace::open(self.layout.topo_dir())?;
        workspace.remove_stale(&[TOPO_RA_FILE, TOPO_SHIFT_FILE, TRANSFORM_FILE])?;

        let mut prm = workspace.copy_owned(&self.layout.prm_path(master), TOPO_MASTER_PRM)?;
        workspace.link_shared(&self.layout.led_path(master), &format!("{}.LED", master))?;

        if let Some(region) = &self.config.region_cut {
            workspace.link_shared(&self.layout.slc_path(master), &format!("{}.SLC", master))?;
            log::info!("Clipping reference image to {}", region);
            prm = self.tools.clip_image(workspace.dir(), &prm, region)?;
        }

        let grids = self.tools.map_topography(workspace.dir(), &prm, &dem)?;
        log::info!("Topography phase grid: {}", grids.topo_ra.display());

        let topo_shift = if self.config.shift_topo {
            workspace.link_shared(&self.layout.slc_path(master), &format!("{}.SLC", master))?;
            let amplitude =
                self.tools
                    .extract_amplitude(workspace.dir(), &prm, AMPLITUDE_MULTIPLIER)?;
            let shifted = self.tools.estimate_topo_offset(
                workspace.dir(),
                &amplitude,
                &grids.topo_ra,
                &OffsetSearch::default(),
            )?;
            log::info!("Shifted topography grid: {}", shifted.display());
            Some(shifted)
        } else {
            None
        };

        Ok(Some(TopoProducts {
            topo_ra: grids.topo_ra,
            topo_shift,
            transform: grids.transform,
        }))
    }
}
