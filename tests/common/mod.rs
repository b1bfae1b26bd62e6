#![allow(dead_code)]

use intfbatch::tools::{
    FilterParams, FilteredPhase, Interferogram, OffsetSearch, ProcessingTools, TopoGrids,
    UnwrapParams,
};
use intfbatch::{
    BatchError, BatchLayout, BatchResult, BatchRunner, CancellationFlag, Configuration, PairList,
    Region,
    UnwrapVariant,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

pub const ACQ_A: &str = "S1_20150526_ALL_F1";
pub const ACQ_B: &str = "S1_20150607_ALL_F1";
pub const ACQ_C: &str = "S1_20150619_ALL_F1";

pub const KEY_AB: &str = "2015146_2015158";
pub const KEY_AC: &str = "2015146_2015170";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Stand-in for the external tools: writes placeholder outputs and records every call
#[derive(Default)]
pub struct FakeTools {
    calls: Mutex<Vec<String>>,
    /// Workspace directory name whose filter step fails
    fail_filter_in: Option<String>,
    /// Time spent building the land mask
    landmask_delay: Duration,
    /// Flag raised while a pair is being filtered
    cancel_on_filter: Mutex<Option<CancellationFlag>>,
}

impl FakeTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_filter_in(mut self, key: &str) -> Self {
        self.fail_filter_in = Some(key.to_string());
        self
    }

    pub fn with_landmask_delay(mut self, delay: Duration) -> Self {
        self.landmask_delay = delay;
        self
    }

    /// Raise `flag` from inside the next filter step
    pub fn cancel_during_filter(&self, flag: CancellationFlag) {
        *self.cancel_on_filter.lock().unwrap() = Some(flag);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls made to `tool`
    pub fn calls_to(&self, tool: &str) -> Vec<String> {
        let prefix = format!("{}:", tool);
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(&prefix))
            .collect()
    }

    pub fn count(&self, tool: &str) -> usize {
        self.calls_to(tool).len()
    }

    fn record(&self, tool: &str, dir: &Path, detail: String) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}:{}", tool, name_of(dir), detail));
    }
}

impl ProcessingTools for FakeTools {
    fn clip_image(&self, dir: &Path, prm: &Path, region: &Region) -> BatchResult<PathBuf> {
        self.record("clip_image", dir, format!("{}:{}", name_of(prm), region));
        let stem = prm.file_stem().unwrap().to_string_lossy().into_owned();
        let clipped = dir.join(format!("{}_cut.PRM", stem));
        fs::copy(prm, &clipped)?;
        Ok(clipped)
    }

    fn map_topography(&self, dir: &Path, prm: &Path, dem: &Path) -> BatchResult<TopoGrids> {
        self.record("map_topography", dir, format!("{}:{}", name_of(prm), name_of(dem)));
        let topo_ra = dir.join("topo_ra.grd");
        let transform = dir.join("trans.dat");
        fs::write(&topo_ra, "topo_ra")?;
        fs::write(&transform, "trans")?;
        Ok(TopoGrids { topo_ra, transform })
    }

    fn extract_amplitude(&self, dir: &Path, prm: &Path, multiplier: u32) -> BatchResult<PathBuf> {
        self.record("extract_amplitude", dir, format!("{}:{}", name_of(prm), multiplier));
        let amplitude = dir.join("amp-master.grd");
        fs::write(&amplitude, "amplitude")?;
        Ok(amplitude)
    }

    fn estimate_topo_offset(
        &self,
        dir: &Path,
        amplitude: &Path,
        topo: &Path,
        search: &OffsetSearch,
    ) -> BatchResult<PathBuf> {
        self.record(
            "estimate_topo_offset",
            dir,
            format!("{}:{}:{}", name_of(amplitude), name_of(topo), search.search_radius),
        );
        let shifted = dir.join("topo_shift.grd");
        fs::write(&shifted, "topo_shift")?;
        Ok(shifted)
    }

    fn form_interferogram(
        &self,
        dir: &Path,
        reference: &Path,
        repeat: &Path,
        topo: Option<&Path>,
    ) -> BatchResult<Interferogram> {
        self.record(
            "form_interferogram",
            dir,
            format!(
                "{}:{}:{}",
                name_of(reference),
                name_of(repeat),
                topo.map(name_of).unwrap_or_else(|| "none".to_string())
            ),
        );
        let real = dir.join("real.grd");
        let imag = dir.join("imag.grd");
        fs::write(&real, "real")?;
        fs::write(&imag, "imag")?;
        Ok(Interferogram { real, imag })
    }

    fn filter_phase(
        &self,
        dir: &Path,
        reference: &Path,
        repeat: &Path,
        params: &FilterParams,
    ) -> BatchResult<FilteredPhase> {
        self.record(
            "filter_phase",
            dir,
            format!(
                "{}:{}:{}:{}",
                name_of(reference),
                name_of(repeat),
                params.wavelength,
                params.decimation
            ),
        );

        if self.fail_filter_in.as_deref() == Some(name_of(dir).as_str()) {
            return Err(BatchError::ExternalTool {
                tool: "filter.csh".to_string(),
                status: "exit status: 1".to_string(),
                output: "filter failed".to_string(),
            });
        }

        if let Some(flag) = self.cancel_on_filter.lock().unwrap().as_ref() {
            flag.cancel();
        }

        let phase = dir.join("phasefilt.grd");
        let coherence = dir.join("corr.grd");
        fs::write(&phase, "phasefilt")?;
        fs::write(&coherence, "corr")?;
        Ok(FilteredPhase { phase, coherence })
    }

    fn phase_extent(&self, dir: &Path, grid: &Path) -> BatchResult<Region> {
        self.record("phase_extent", dir, name_of(grid));
        Ok(Region::parse("0/1000/0/500").unwrap())
    }

    fn build_landmask(&self, dir: &Path, region: &Region) -> BatchResult<PathBuf> {
        self.record("build_landmask", dir, region.to_string());
        std::thread::sleep(self.landmask_delay);
        let mask = dir.join("landmask_ra.grd");
        fs::write(&mask, format!("landmask {}", region))?;
        Ok(mask)
    }

    fn unwrap_phase(
        &self,
        dir: &Path,
        variant: UnwrapVariant,
        params: &UnwrapParams,
    ) -> BatchResult<PathBuf> {
        self.record(
            "unwrap_phase",
            dir,
            format!("{:?}:{}:{}", variant, params.threshold, params.max_deformation),
        );
        let mask = fs::read_to_string(dir.join("landmask_ra.grd"))
            .unwrap_or_else(|_| "no mask".to_string());
        let unwrapped = dir.join("unwrap.grd");
        fs::write(&unwrapped, format!("unwrapped with {}", mask))?;
        Ok(unwrapped)
    }

    fn geocode(&self, dir: &Path, threshold: f64, transform: &Path) -> BatchResult<Vec<PathBuf>> {
        self.record("geocode", dir, format!("{}:{}", threshold, name_of(transform)));
        let transform_content = fs::read_to_string(transform)?;
        let geocoded = dir.join("phasefilt_ll.grd");
        fs::write(&geocoded, format!("geocoded via {}", transform_content))?;
        Ok(vec![geocoded])
    }
}

/// Temporary batch root with raw acquisitions and an elevation model
pub struct BatchFixture {
    pub dir: TempDir,
}

impl BatchFixture {
    pub fn new() -> Self {
        init_logging();
        let fixture = Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        };
        fs::create_dir_all(fixture.root().join("raw")).unwrap();
        fs::create_dir_all(fixture.root().join("topo")).unwrap();
        fs::write(fixture.root().join("topo/dem.grd"), "dem").unwrap();

        fixture.add_acquisition(ACQ_A, "2015146.5983798150");
        fixture.add_acquisition(ACQ_B, "2015158.5983812640");
        fixture.add_acquisition(ACQ_C, "2015170.5983830210");
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn add_acquisition(&self, id: &str, clock_start: &str) {
        let raw = self.root().join("raw");
        fs::write(
            raw.join(format!("{}.PRM", id)),
            format!(
                "input_file = {id}.raw\nSLC_file = {id}.SLC\nled_file = {id}.LED\nSC_clock_start = {clock_start}\n"
            ),
        )
        .unwrap();
        fs::write(raw.join(format!("{}.SLC", id)), format!("slc {}", id)).unwrap();
        fs::write(raw.join(format!("{}.LED", id)), format!("led {}", id)).unwrap();
    }

    pub fn write_config(&self, text: &str) -> PathBuf {
        let path = self.root().join("batch.config");
        fs::write(&path, text).unwrap();
        path
    }

    pub fn write_manifest(&self, text: &str) -> PathBuf {
        let path = self.root().join("intf.in");
        fs::write(&path, text).unwrap();
        path
    }

    pub fn layout(&self) -> BatchLayout {
        BatchLayout::new(self.root()).unwrap()
    }

    /// Load config and manifest the way the binary does and build a runner
    pub fn runner(
        &self,
        config: &str,
        manifest: &str,
        tools: FakeTools,
    ) -> BatchResult<BatchRunner<FakeTools>> {
        let config = Configuration::load(self.write_config(config))?;
        let pairs = PairList::parse(self.write_manifest(manifest))?;
        Ok(BatchRunner::new(config, pairs, self.layout(), tools))
    }

    pub fn topo_file(&self, name: &str) -> PathBuf {
        self.root().join("topo").join(name)
    }

    pub fn result_dir(&self, key: &str) -> PathBuf {
        self.root().join("intf_all").join(key)
    }

    pub fn staging_dir(&self, key: &str) -> PathBuf {
        self.root().join("intf").join(key)
    }

    /// Entries in the results collection
    pub fn published(&self) -> Vec<String> {
        let dir = self.root().join("intf_all");
        if !dir.exists() {
            return Vec::new();
        }
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn result_files(&self, key: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.result_dir(key))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
