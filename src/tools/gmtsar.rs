use super::{
    FilterParams, FilteredPhase, Interferogram, OffsetSearch, ProcessingTools, TopoGrids,
    UnwrapParams,
};
use crate::io::UnwrapVariant;
use crate::types::{BatchError, BatchResult, Region};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Lines of tool output kept in error reports
const OUTPUT_TAIL_LINES: usize = 15;

static GRDINFO_REGION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-R([-+0-9.eE]+)/([-+0-9.eE]+)/([-+0-9.eE]+)/([-+0-9.eE]+)")
        .expect("grdinfo region pattern is valid")
});

/// [`ProcessingTools`] backed by the GMTSAR command-line scripts
#[derive(Debug, Clone, Default)]
pub struct GmtsarTools {
    /// Directory holding the scripts; `PATH` lookup when unset
    bin_dir: Option<PathBuf>,
}

impl GmtsarTools {
    pub fn new() -> Self {
        Self { bin_dir: None }
    }

    /// Resolve every command inside `bin_dir`
    ///
    /// The directory is made absolute here, since commands are spawned from
    /// inside the workspace and a relative program path would resolve there.
    pub fn with_bin_dir<P: AsRef<Path>>(bin_dir: P) -> BatchResult<Self> {
        let bin_dir = bin_dir.as_ref();
        if !bin_dir.is_dir() {
            return Err(BatchError::missing("tool directory", bin_dir));
        }

        Ok(Self {
            bin_dir: Some(bin_dir.canonicalize()?),
        })
    }

    pub fn bin_dir(&self) -> Option<&Path> {
        self.bin_dir.as_deref()
    }

    fn program(&self, name: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    /// Run a command in `dir`, returning its combined output
    fn run(&self, dir: &Path, tool: &str, args: &[String]) -> BatchResult<String> {
        log::debug!("[{}] {} {}", dir.display(), tool, args.join(" "));

        let output = Command::new(self.program(tool))
            .args(args)
            .current_dir(dir)
            .output()
            .map_err(|e| BatchError::ExternalTool {
                tool: tool.to_string(),
                status: "not started".to_string(),
                output: e.to_string(),
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        for line in text.lines() {
            log::trace!("{}: {}", tool, line);
        }

        if !output.status.success() {
            return Err(BatchError::ExternalTool {
                tool: tool.to_string(),
                status: output.status.to_string(),
                output: output_tail(&text, OUTPUT_TAIL_LINES),
            });
        }

        Ok(text)
    }

    /// Path of an output the tool must have written
    fn expect_output(&self, dir: &Path, tool: &str, name: &str) -> BatchResult<PathBuf> {
        let path = dir.join(name);
        if path.exists() {
            Ok(path)
        } else {
            Err(BatchError::ExternalTool {
                tool: tool.to_string(),
                status: "exit 0".to_string(),
                output: format!("expected output {} was not produced", name),
            })
        }
    }
}

/// Argument form of a path: bare file name when it lives in `dir`
fn arg(dir: &Path, path: &Path) -> String {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if parent == dir => name.to_string_lossy().into_owned(),
        _ => path.display().to_string(),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn output_tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

/// Extract the `-Rxmin/xmax/ymin/ymax` bound printed by `gmt grdinfo -I-`
pub fn parse_grdinfo_region(output: &str) -> Option<Region> {
    let captures = GRDINFO_REGION.captures(output)?;
    let text = format!(
        "{}/{}/{}/{}",
        &captures[1], &captures[2], &captures[3], &captures[4]
    );
    Region::parse(&text)
}

impl ProcessingTools for GmtsarTools {
    fn clip_image(&self, dir: &Path, prm: &Path, region: &Region) -> BatchResult<PathBuf> {
        let stem = format!("{}_cut", file_stem(prm));
        self.run(
            dir,
            "cut_slc",
            &[arg(dir, prm), stem.clone(), region.to_string()],
        )?;
        self.expect_output(dir, "cut_slc", &format!("{}.PRM", stem))
    }

    fn map_topography(&self, dir: &Path, prm: &Path, dem: &Path) -> BatchResult<TopoGrids> {
        let tool = "dem2topo_ra.csh";
        self.run(dir, tool, &[arg(dir, prm), arg(dir, dem)])?;
        Ok(TopoGrids {
            topo_ra: self.expect_output(dir, tool, "topo_ra.grd")?,
            transform: self.expect_output(dir, tool, "trans.dat")?,
        })
    }

    fn extract_amplitude(&self, dir: &Path, prm: &Path, multiplier: u32) -> BatchResult<PathBuf> {
        let tool = "slc2amp.csh";
        let output = format!("amp-{}.grd", file_stem(prm));
        self.run(
            dir,
            tool,
            &[arg(dir, prm), multiplier.to_string(), output.clone()],
        )?;
        self.expect_output(dir, tool, &output)
    }

    fn estimate_topo_offset(
        &self,
        dir: &Path,
        amplitude: &Path,
        topo: &Path,
        search: &OffsetSearch,
    ) -> BatchResult<PathBuf> {
        let tool = "offset_topo";
        self.run(
            dir,
            tool,
            &[
                arg(dir, amplitude),
                arg(dir, topo),
                search.range_shift.to_string(),
                search.azimuth_shift.to_string(),
                search.search_radius.to_string(),
                "topo_shift.grd".to_string(),
            ],
        )?;
        self.expect_output(dir, tool, "topo_shift.grd")
    }

    fn form_interferogram(
        &self,
        dir: &Path,
        reference: &Path,
        repeat: &Path,
        topo: Option<&Path>,
    ) -> BatchResult<Interferogram> {
        let tool = "intf.csh";
        let mut args = vec![arg(dir, reference), arg(dir, repeat)];
        if let Some(topo) = topo {
            args.push("-topo".to_string());
            args.push(arg(dir, topo));
        }
        self.run(dir, tool, &args)?;

        Ok(Interferogram {
            real: self.expect_output(dir, tool, "real.grd")?,
            imag: self.expect_output(dir, tool, "imag.grd")?,
        })
    }

    fn filter_phase(
        &self,
        dir: &Path,
        reference: &Path,
        repeat: &Path,
        params: &FilterParams,
    ) -> BatchResult<FilteredPhase> {
        let tool = "filter.csh";
        let mut args = vec![
            arg(dir, reference),
            arg(dir, repeat),
            params.wavelength.to_string(),
            params.decimation.to_string(),
        ];
        if let Some((range_dec, azimuth_dec)) = params.range_azimuth_dec {
            args.push(range_dec.to_string());
            args.push(azimuth_dec.to_string());
        }
        self.run(dir, tool, &args)?;

        Ok(FilteredPhase {
            phase: self.expect_output(dir, tool, "phasefilt.grd")?,
            coherence: self.expect_output(dir, tool, "corr.grd")?,
        })
    }

    fn phase_extent(&self, dir: &Path, grid: &Path) -> BatchResult<Region> {
        let output = self.run(
            dir,
            "gmt",
            &["grdinfo".to_string(), "-I-".to_string(), arg(dir, grid)],
        )?;

        parse_grdinfo_region(&output).ok_or_else(|| BatchError::ExternalTool {
            tool: "gmt grdinfo".to_string(),
            status: "exit 0".to_string(),
            output: format!("no region bound in output: {}", output.trim()),
        })
    }

    fn build_landmask(&self, dir: &Path, region: &Region) -> BatchResult<PathBuf> {
        let tool = "landmask.csh";
        self.run(dir, tool, &[region.to_string()])?;
        self.expect_output(dir, tool, "landmask_ra.grd")
    }

    fn unwrap_phase(
        &self,
        dir: &Path,
        variant: UnwrapVariant,
        params: &UnwrapParams,
    ) -> BatchResult<PathBuf> {
        let tool = match variant {
            UnwrapVariant::Standard => "snaphu.csh",
            UnwrapVariant::NearRangeInterpolated => "snaphu_interp.csh",
        };
        self.run(
            dir,
            tool,
            &[params.threshold.to_string(), params.max_deformation.to_string()],
        )?;
        self.expect_output(dir, tool, "unwrap.grd")
    }

    fn geocode(&self, dir: &Path, threshold: f64, transform: &Path) -> BatchResult<Vec<PathBuf>> {
        let tool = "geocode.csh";
        if !transform.exists() {
            return Err(BatchError::missing("radar-to-map transform", transform));
        }
        self.run(dir, tool, &[threshold.to_string()])?;

        let mut products = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let geocoded = path
                .file_name()
                .map(|name| name.to_string_lossy().ends_with("_ll.grd"))
                .unwrap_or(false);
            if geocoded {
                products.push(path);
            }
        }
        products.sort();

        if products.is_empty() {
            return Err(BatchError::ExternalTool {
                tool: tool.to_string(),
                status: "exit 0".to_string(),
                output: "no geocoded (*_ll.grd) grids were produced".to_string(),
            });
        }

        Ok(products)
    }
}
