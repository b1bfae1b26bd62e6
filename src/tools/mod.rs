//! Contracts for the external signal-processing tools
//!
//! The batch controller never computes radar products itself. Each processing
//! step is delegated to a [`ProcessingTools`] implementation that runs inside
//! an explicit working directory and reports the artifacts it produced.
//! [`GmtsarTools`] drives the GMTSAR command-line scripts.

pub mod gmtsar;

pub use gmtsar::GmtsarTools;

use crate::io::UnwrapVariant;
use crate::types::{BatchResult, Region};
use std::path::{Path, PathBuf};

/// Amplitude multiplier used when shifting the topography grid
pub const AMPLITUDE_MULTIPLIER: u32 = 4;

/// Outputs of the elevation-to-radar mapping
#[derive(Debug, Clone)]
pub struct TopoGrids {
    /// Topography phase in radar coordinates
    pub topo_ra: PathBuf,
    /// Radar-to-map transform table used by geocoding
    pub transform: PathBuf,
}

/// Offset search window for matching amplitude against topography
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetSearch {
    pub range_shift: i32,
    pub azimuth_shift: i32,
    pub search_radius: u32,
}

impl Default for OffsetSearch {
    fn default() -> Self {
        Self {
            range_shift: 0,
            azimuth_shift: 0,
            search_radius: 7,
        }
    }
}

/// Raw interferogram grids
#[derive(Debug, Clone)]
pub struct Interferogram {
    pub real: PathBuf,
    pub imag: PathBuf,
}

/// Phase filter and decimation settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    pub wavelength: f64,
    pub decimation: u32,
    /// Independent (range, azimuth) decimation
    pub range_azimuth_dec: Option<(u32, u32)>,
}

/// Filtered phase products
#[derive(Debug, Clone)]
pub struct FilteredPhase {
    pub phase: PathBuf,
    pub coherence: PathBuf,
}

/// Unwrapper arguments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnwrapParams {
    pub threshold: f64,
    pub max_deformation: f64,
}

/// Typed interface to the external processing tools
///
/// Every method runs with `dir` as its working directory; input paths may be
/// absolute or inside `dir`. Implementations must be shareable between
/// worker threads.
pub trait ProcessingTools: Send + Sync {
    /// Clip an image to a radar-coordinate region, returning the clipped `.PRM`
    fn clip_image(&self, dir: &Path, prm: &Path, region: &Region) -> BatchResult<PathBuf>;

    /// Map the elevation model into radar geometry
    fn map_topography(&self, dir: &Path, prm: &Path, dem: &Path) -> BatchResult<TopoGrids>;

    /// Compute an amplitude image from the reference acquisition
    fn extract_amplitude(&self, dir: &Path, prm: &Path, multiplier: u32) -> BatchResult<PathBuf>;

    /// Estimate the sub-pixel offset between amplitude and topography, returning the shifted grid
    fn estimate_topo_offset(
        &self,
        dir: &Path,
        amplitude: &Path,
        topo: &Path,
        search: &OffsetSearch,
    ) -> BatchResult<PathBuf>;

    /// Form the interferogram, optionally removing topography phase
    fn form_interferogram(
        &self,
        dir: &Path,
        reference: &Path,
        repeat: &Path,
        topo: Option<&Path>,
    ) -> BatchResult<Interferogram>;

    /// Filter and decimate the interferogram phase
    fn filter_phase(
        &self,
        dir: &Path,
        reference: &Path,
        repeat: &Path,
        params: &FilterParams,
    ) -> BatchResult<FilteredPhase>;

    /// Region bound covered by a grid
    fn phase_extent(&self, dir: &Path, grid: &Path) -> BatchResult<Region>;

    /// Build the radar-coordinate land mask for a region
    fn build_landmask(&self, dir: &Path, region: &Region) -> BatchResult<PathBuf>;

    /// Unwrap the filtered phase
    fn unwrap_phase(
        &self,
        dir: &Path,
        variant: UnwrapVariant,
        params: &UnwrapParams,
    ) -> BatchResult<PathBuf>;

    /// Geocode the radar-coordinate products, returning the geocoded grids
    fn geocode(&self, dir: &Path, threshold: f64, transform: &Path) -> BatchResult<Vec<PathBuf>>;
}
