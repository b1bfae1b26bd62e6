use super::landmask::LandmaskCache;
use super::layout::{BatchLayout, LANDMASK_FILE, TRANSFORM_FILE};
use super::pipeline::CancellationFlag;
use super::publish::ResultPublisher;
use super::topography::TopoProducts;
use super::workspace::Workspace;
use crate::io::Configuration;
use crate::tools::{FilterParams, ProcessingTools, UnwrapParams};
use crate::types::{BatchError, BatchResult, ResolvedPair};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Outputs removed before geocoding so they are regenerated against the linked transform
const GEOCODE_STALE_OUTPUTS: &[&str] = &["raln.grd", "ralt.grd", TRANSFORM_FILE];

/// What a published pair contains
#[derive(Debug, Clone, Serialize)]
pub struct PairProducts {
    pub result_dir: PathBuf,
    pub artifacts: Vec<String>,
    pub unwrapped: bool,
    pub geocoded: bool,
}

/// Stage 2: per-pair interferogram processing
pub struct InterferogramStage<'a> {
    config: &'a Configuration,
    layout: &'a BatchLayout,
    tools: &'a dyn ProcessingTools,
    topo: Option<&'a TopoProducts>,
    landmask: &'a LandmaskCache,
    publisher: &'a ResultPublisher,
    cancel: &'a CancellationFlag,
}

impl<'a> InterferogramStage<'a> {
    pub fn new(
        config: &'a Configuration,
        layout: &'a BatchLayout,
        tools: &'a dyn ProcessingTools,
        topo: Option<&'a TopoProducts>,
        landmask: &'a LandmaskCache,
        publisher: &'a ResultPublisher,
        cancel: &'a CancellationFlag,
    ) -> Self {
        Self {
            config,
            layout,
            tools,
            topo,
            landmask,
            publisher,
            cancel,
        }
    }

    /// Run one pair from workspace creation to publication
    pub fn process_pair(&self, pair: &ResolvedPair) -> BatchResult<PairProducts> {
        let key = pair.key;
        log::info!("Pair {} ({})", key, pair.spec);

        self.cancel.check()?;
        let workspace = Workspace::fresh(self.layout.workspace_dir(&key))?;
        let (mut reference, mut repeat) = self.stage_inputs(&workspace, pair)?;

        if let Some(region) = &self.config.region_cut {
            self.cancel.check()?;
            log::info!("{}: clipping both images to {}", key, region);
            reference = self.tools.clip_image(workspace.dir(), &reference, region)?;
            repeat = self.tools.clip_image(workspace.dir(), &repeat, region)?;
        }

        self.cancel.check()?;
        let topo_grid = self.link_topography(&workspace)?;
        log::info!(
            "{}: forming interferogram ({})",
            key,
            if topo_grid.is_some() { "topography removed" } else { "no topography" }
        );
        self.tools
            .form_interferogram(workspace.dir(), &reference, &repeat, topo_grid.as_deref())?;

        self.cancel.check()?;
        let filter = FilterParams {
            wavelength: self.config.filter_wavelength,
            decimation: self.config.dec_factor,
            range_azimuth_dec: self.config.range_dec.zip(self.config.azimuth_dec),
        };
        log::info!("{}: filtering phase (wavelength {})", key, filter.wavelength);
        let filtered = self
            .tools
            .filter_phase(workspace.dir(), &reference, &repeat, &filter)?;

        let unwrapped = self.unwrap(&workspace, &filtered.phase)?;
        let geocoded = self.geocode(&workspace)?;

        self.cancel.check()?;
        let artifacts = workspace.artifacts()?;
        let result_dir = self.publisher.publish(workspace, &key)?;

        Ok(PairProducts {
            result_dir,
            artifacts,
            unwrapped,
            geocoded,
        })
    }

    /// Link images and orbit files, copy metadata; returns the two `.PRM` paths
    fn stage_inputs(
        &self,
        workspace: &Workspace,
        pair: &ResolvedPair,
    ) -> BatchResult<(PathBuf, PathBuf)> {
        let stage = |id: &str| -> BatchResult<PathBuf> {
            workspace.link_shared(&self.layout.slc_path(id), &format!("{}.SLC", id))?;
            workspace.link_shared(&self.layout.led_path(id), &format!("{}.LED", id))?;
            workspace.copy_owned(&self.layout.prm_path(id), &format!("{}.PRM", id))
        };

        Ok((stage(&pair.spec.reference)?, stage(&pair.spec.repeat)?))
    }

    /// Pin the stage-1 grid used for formation, if topography phase is enabled
    fn link_topography(&self, workspace: &Workspace) -> BatchResult<Option<PathBuf>> {
        if !self.config.topo_phase {
            return Ok(None);
        }

        let topo = self.topo.ok_or_else(|| {
            BatchError::PreconditionViolation(
                "topo_phase = 1 but no topography products are available".to_string(),
            )
        })?;
        let grid = topo.formation_grid(self.config.shift_topo)?;
        let name = grid
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        workspace.pin_shared(grid, &name).map(Some)
    }

    fn unwrap(&self, workspace: &Workspace, phase: &Path) -> BatchResult<bool> {
        if !self.config.unwrap_requested() {
            log::debug!("threshold_snaphu = 0, skipping unwrap");
            return Ok(false);
        }
        self.cancel.check()?;

        if self.config.needs_landmask() {
            let mask = self.landmask.get_or_build(|| {
                let region = self.tools.phase_extent(workspace.dir(), phase)?;
                log::info!("Land mask region taken from {}: {}", workspace.dir().display(), region);
                let topo = Workspace::open(self.layout.topo_dir())?;
                topo.remove_stale(&[LANDMASK_FILE])?;
                self.tools.build_landmask(topo.dir(), &region)
            })?;
            workspace.pin_shared(mask, LANDMASK_FILE)?;
        }

        let params = UnwrapParams {
            threshold: self.config.threshold_snaphu,
            max_deformation: self.config.defomax,
        };
        let variant = self.config.unwrap_variant();
        log::info!(
            "Unwrapping {} ({:?}, threshold {}, defomax {})",
            workspace.dir().display(),
            variant,
            params.threshold,
            params.max_deformation
        );
        self.tools.unwrap_phase(workspace.dir(), variant, &params)?;
        Ok(true)
    }

    fn geocode(&self, workspace: &Workspace) -> BatchResult<bool> {
        if !self.config.geocode_requested() {
            log::debug!("threshold_geocode = 0, skipping geocode");
            return Ok(false);
        }
        self.cancel.check()?;

        let topo = match (self.config.topo_phase, self.topo) {
            (true, Some(topo)) => topo,
            _ => {
                return Err(BatchError::PreconditionViolation(
                    "geocoding needs topo_phase = 1 for the radar-to-map transform".to_string(),
                ))
            }
        };

        workspace.remove_stale(GEOCODE_STALE_OUTPUTS)?;
        let transform = workspace.pin_shared(&topo.transform, TRANSFORM_FILE)?;
        let products = self
            .tools
            .geocode(workspace.dir(), self.config.threshold_geocode, &transform)?;
        log::info!(
            "Geocoded {} grid(s) in {}",
            products.len(),
            workspace.dir().display()
        );
        Ok(true)
    }
}
