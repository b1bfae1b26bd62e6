//! Batch configuration file reader
//!
//! The configuration is a flat text file with one `key = value` entry per
//! line. Only the third whitespace-separated token is taken as the value, so
//! trailing annotations after the value are ignored. Keys that are not used
//! by the batch controller are skipped, since the same file is shared with
//! other processing scripts.

use super::pair_list::is_valid_identifier;
use crate::types::{BatchError, BatchResult, Region};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Filter wavelength used when the configuration omits it
pub const DEFAULT_FILTER_WAVELENGTH: f64 = 200.0;

const KNOWN_KEYS: &[&str] = &[
    "proc_stage",
    "master_image",
    "filter_wavelength",
    "dec_factor",
    "range_dec",
    "azimuth_dec",
    "topo_phase",
    "shift_topo",
    "threshold_snaphu",
    "threshold_geocode",
    "region_cut",
    "switch_land",
    "defomax",
    "near_interp",
    "mask_water",
];

/// First stage to execute; earlier stages are assumed complete on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct StageGate(u8);

impl StageGate {
    pub const TOPOGRAPHY: StageGate = StageGate(1);
    pub const INTERFEROGRAM: StageGate = StageGate(2);

    pub fn new(stage: u8) -> Option<Self> {
        match stage {
            1 | 2 => Some(StageGate(stage)),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for StageGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed, validated processing options for one batch run
#[derive(Debug, Clone, Serialize)]
pub struct Configuration {
    /// Stage to start from; required in the file
    pub proc_stage: StageGate,
    /// Reference image for the topography stage
    pub master_image: Option<String>,
    /// Gaussian filter wavelength in meters
    pub filter_wavelength: f64,
    /// Decimation factor passed to the phase filter; required in the file
    pub dec_factor: u32,
    /// Independent range decimation (set together with `azimuth_dec`)
    pub range_dec: Option<u32>,
    /// Independent azimuth decimation (set together with `range_dec`)
    pub azimuth_dec: Option<u32>,
    /// Remove topography phase during formation
    pub topo_phase: bool,
    /// Use the amplitude-shifted topography grid
    pub shift_topo: bool,
    /// Unwrap coherence threshold; zero skips unwrapping
    pub threshold_snaphu: f64,
    /// Geocode coherence threshold; zero skips geocoding
    pub threshold_geocode: f64,
    /// Optional radar-coordinate clip applied before formation
    pub region_cut: Option<Region>,
    /// Land-switch filtering before unwrapping
    pub switch_land: bool,
    /// Maximum deformation bound for the unwrapper
    pub defomax: f64,
    /// Use the near-range interpolating unwrapper
    pub near_interp: bool,
    /// Mask water surfaces before unwrapping
    pub mask_water: bool,
}

/// Values used for keys the file omits
///
/// `proc_stage` and `dec_factor` have no default: `parse_str` requires both
/// and reports `MissingKey` when either is absent. Their values here only make
/// `Configuration::default()` a complete record for callers that build a
/// configuration in code.
impl Default for Configuration {
    fn default() -> Self {
        Self {
            proc_stage: StageGate::TOPOGRAPHY,
            master_image: None,
            filter_wavelength: DEFAULT_FILTER_WAVELENGTH,
            dec_factor: 2,
            range_dec: None,
            azimuth_dec: None,
            topo_phase: false,
            shift_topo: false,
            threshold_snaphu: 0.0,
            threshold_geocode: 0.0,
            region_cut: None,
            switch_land: false,
            defomax: 0.0,
            near_interp: false,
            mask_water: false,
        }
    }
}

/// Which unwrapping script variant to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnwrapVariant {
    Standard,
    NearRangeInterpolated,
}

impl Configuration {
    /// Load and validate a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> BatchResult<Self> {
        let path = path.as_ref();
        log::info!("Reading configuration: {}", path.display());

        if !path.is_file() {
            return Err(BatchError::missing("configuration file", path));
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    /// Parse configuration text
    pub fn parse_str(content: &str) -> BatchResult<Self> {
        let entries = ConfigEntries::parse(content)?;
        let defaults = Configuration::default();

        let proc_stage = {
            let raw = entries.require("proc_stage")?;
            raw.parse::<u8>()
                .ok()
                .and_then(StageGate::new)
                .ok_or_else(|| BatchError::invalid("proc_stage", raw, "1 or 2"))?
        };

        let filter_wavelength = match entries.get("filter_wavelength") {
            Some(raw) => parse_positive_f64("filter_wavelength", raw)?,
            None => {
                log::warn!(
                    "filter_wavelength not set, using default {}",
                    DEFAULT_FILTER_WAVELENGTH
                );
                defaults.filter_wavelength
            }
        };

        let dec_factor = parse_positive_u32("dec_factor", entries.require("dec_factor")?)?;

        let range_dec = entries
            .get("range_dec")
            .map(|raw| parse_positive_u32("range_dec", raw))
            .transpose()?;
        let azimuth_dec = entries
            .get("azimuth_dec")
            .map(|raw| parse_positive_u32("azimuth_dec", raw))
            .transpose()?;

        match (range_dec, azimuth_dec) {
            (Some(_), None) => {
                return Err(BatchError::invalid(
                    "azimuth_dec",
                    "",
                    "a value whenever range_dec is set",
                ))
            }
            (None, Some(_)) => {
                return Err(BatchError::invalid(
                    "range_dec",
                    "",
                    "a value whenever azimuth_dec is set",
                ))
            }
            _ => {}
        }

        let topo_phase = entries.flag("topo_phase", defaults.topo_phase)?;
        let shift_topo = match entries.get("shift_topo") {
            Some(raw) => parse_flag("shift_topo", raw)?,
            None if topo_phase => {
                return Err(BatchError::invalid(
                    "shift_topo",
                    "",
                    "0 or 1 when topo_phase = 1",
                ))
            }
            None => defaults.shift_topo,
        };

        let master_image = match entries.get("master_image") {
            Some(raw) if !is_valid_identifier(raw) => {
                return Err(BatchError::invalid(
                    "master_image",
                    raw,
                    "an acquisition identifier (letters, digits, '_', '.', '-')",
                ))
            }
            raw => raw.map(str::to_string),
        };

        let region_cut = entries
            .get("region_cut")
            .map(|raw| {
                Region::parse(raw).ok_or_else(|| {
                    BatchError::invalid("region_cut", raw, "rmin/rmax/amin/amax with min < max")
                })
            })
            .transpose()?;

        let config = Configuration {
            proc_stage,
            master_image,
            filter_wavelength,
            dec_factor,
            range_dec,
            azimuth_dec,
            topo_phase,
            shift_topo,
            threshold_snaphu: entries.non_negative("threshold_snaphu", defaults.threshold_snaphu)?,
            threshold_geocode: entries
                .non_negative("threshold_geocode", defaults.threshold_geocode)?,
            region_cut,
            switch_land: entries.flag("switch_land", defaults.switch_land)?,
            defomax: entries.non_negative("defomax", defaults.defomax)?,
            near_interp: entries.flag("near_interp", defaults.near_interp)?,
            mask_water: entries.flag("mask_water", defaults.mask_water)?,
        };

        log::debug!("Configuration: {:?}", config);
        Ok(config)
    }

    pub fn unwrap_requested(&self) -> bool {
        self.threshold_snaphu != 0.0
    }

    pub fn geocode_requested(&self) -> bool {
        self.threshold_geocode != 0.0
    }

    /// Whether unwrapping needs the shared land mask
    pub fn needs_landmask(&self) -> bool {
        self.unwrap_requested() && (self.mask_water || self.switch_land)
    }

    pub fn unwrap_variant(&self) -> UnwrapVariant {
        if self.near_interp {
            UnwrapVariant::NearRangeInterpolated
        } else {
            UnwrapVariant::Standard
        }
    }
}

/// Raw `key -> value` entries of a configuration file
struct ConfigEntries<'a> {
    values: HashMap<&'a str, &'a str>,
}

impl<'a> ConfigEntries<'a> {
    fn parse(content: &'a str) -> BatchResult<Self> {
        let mut values = HashMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut tokens = line.split_whitespace();
            let key = match tokens.next() {
                Some(key) => key,
                None => continue,
            };

            if !KNOWN_KEYS.contains(&key) {
                log::debug!("Ignoring configuration key '{}'", key);
                continue;
            }

            // key = value: the value is the third token
            let value = match tokens.nth(1) {
                Some(value) => value,
                None => continue,
            };

            if values.insert(key, value).is_some() {
                return Err(BatchError::invalid(key, value, "a single definition"));
            }
        }

        Ok(Self { values })
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.values.get(key).copied()
    }

    fn require(&self, key: &str) -> BatchResult<&'a str> {
        self.get(key)
            .ok_or_else(|| BatchError::MissingKey(key.to_string()))
    }

    fn flag(&self, key: &str, default: bool) -> BatchResult<bool> {
        match self.get(key) {
            Some(raw) => parse_flag(key, raw),
            None => Ok(default),
        }
    }

    fn non_negative(&self, key: &str, default: f64) -> BatchResult<f64> {
        match self.get(key) {
            Some(raw) => match raw.parse::<f64>() {
                Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
                _ => Err(BatchError::invalid(key, raw, "a number >= 0")),
            },
            None => Ok(default),
        }
    }
}

fn parse_flag(key: &str, raw: &str) -> BatchResult<bool> {
    match raw {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(BatchError::invalid(key, raw, "0 or 1")),
    }
}

fn parse_positive_f64(key: &str, raw: &str) -> BatchResult<f64> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(BatchError::invalid(key, raw, "a positive number")),
    }
}

fn parse_positive_u32(key: &str, raw: &str) -> BatchResult<u32> {
    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(BatchError::invalid(key, raw, "a positive integer")),
    }
}
