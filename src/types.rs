use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Acquisition epoch: integer part of the `SC_clock_start` value (yyyyddd)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AcquisitionEpoch(pub i64);

impl std::fmt::Display for AcquisitionEpoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key identifying a pair's workspace and published result
///
/// Ordered as (reference, repeat); the directory name is `<ref>_<rep>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub reference: AcquisitionEpoch,
    pub repeat: AcquisitionEpoch,
}

impl PairKey {
    pub fn new(reference: AcquisitionEpoch, repeat: AcquisitionEpoch) -> Self {
        Self { reference, repeat }
    }

    /// Directory name used under the staging and results collections
    pub fn dir_name(&self) -> String {
        format!("{}_{}", self.reference, self.repeat)
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.reference, self.repeat)
    }
}

/// One manifest entry: reference and repeat acquisition identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairSpec {
    pub reference: String,
    pub repeat: String,
    /// 1-based manifest line the entry came from
    pub line: usize,
}

impl std::fmt::Display for PairSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.reference, self.repeat)
    }
}

/// A pair whose identifiers have been resolved to acquisition epochs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPair {
    pub spec: PairSpec,
    pub key: PairKey,
}

/// Radar-coordinate bound (range min/max, azimuth min/max)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub range_min: f64,
    pub range_max: f64,
    pub azimuth_min: f64,
    pub azimuth_max: f64,
}

impl Region {
    /// Parse `rmin/rmax/amin/amax`
    pub fn parse(text: &str) -> Option<Self> {
        let values: Vec<f64> = text
            .trim()
            .split('/')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;

        if values.len() != 4 || values.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let region = Region {
            range_min: values[0],
            range_max: values[1],
            azimuth_min: values[2],
            azimuth_max: values[3],
        };

        if region.range_min < region.range_max && region.azimuth_min < region.azimuth_max {
            Some(region)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.range_min, self.range_max, self.azimuth_min, self.azimuth_max
        )
    }
}

/// Error types for batch interferogram processing
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing {what}: {}", .path.display())]
    MissingInput { what: String, path: PathBuf },

    #[error("Missing required configuration key '{0}'")]
    MissingKey(String),

    #[error("Invalid configuration value for '{key}': '{value}' (expected {expected})")]
    InvalidConfiguration {
        key: String,
        value: String,
        expected: String,
    },

    #[error("Pair manifest line {line}: {reason}")]
    ManifestParse { line: usize, reason: String },

    #[error("Metadata error in {}: {reason}", .path.display())]
    Metadata { path: PathBuf, reason: String },

    #[error("Pair key {key} from manifest line {second_line} collides with line {first_line}")]
    DuplicatePairKey {
        key: PairKey,
        first_line: usize,
        second_line: usize,
    },

    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("External tool '{tool}' failed ({status}):\n{output}")]
    ExternalTool {
        tool: String,
        status: String,
        output: String,
    },

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Batch cancelled")]
    Cancelled,
}

impl BatchError {
    pub(crate) fn missing<P: Into<PathBuf>>(what: &str, path: P) -> Self {
        BatchError::MissingInput {
            what: what.to_string(),
            path: path.into(),
        }
    }

    pub(crate) fn invalid(key: &str, value: &str, expected: &str) -> Self {
        BatchError::InvalidConfiguration {
            key: key.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }
}

/// Result type for batch operations
pub type BatchResult<T> = Result<T, BatchError>;
