use crate::types::{AcquisitionEpoch, BatchError, BatchResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static CLOCK_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*SC_clock_start[ \t]*=[ \t]*([0-9]+)(?:\.[0-9]*)?[ \t]*\r?$")
        .expect("clock start pattern is valid")
});

/// Reader for processing-parameter (`.PRM`) metadata files
pub struct PrmReader;

impl PrmReader {
    /// Resolve the acquisition epoch of a `.PRM` file
    pub fn read_epoch<P: AsRef<Path>>(path: P) -> BatchResult<AcquisitionEpoch> {
        let path = path.as_ref();

        if !path.is_file() {
            return Err(BatchError::missing("acquisition metadata", path));
        }

        let content = std::fs::read_to_string(path)?;
        let epoch = Self::parse_epoch(&content).ok_or_else(|| BatchError::Metadata {
            path: path.to_path_buf(),
            reason: "no numeric SC_clock_start entry".to_string(),
        })?;

        log::debug!("{}: acquisition epoch {}", path.display(), epoch);
        Ok(epoch)
    }

    /// Integer part of `SC_clock_start`
    pub fn parse_epoch(content: &str) -> Option<AcquisitionEpoch> {
        let captures = CLOCK_START.captures(content)?;
        captures[1].parse::<i64>().ok().map(AcquisitionEpoch)
    }
}
