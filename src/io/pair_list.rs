use crate::types::{BatchError, BatchResult, PairSpec};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Delimiter between the reference and repeat identifiers
pub const PAIR_DELIMITER: char = ':';

static PAIR_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9_.-]+):([A-Za-z0-9_.-]+)$").expect("pair line pattern is valid")
});

/// Acquisition identifiers name files under `raw/`: no separators, no leading dot
pub fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Ordered list of acquisition pairs read from a manifest
pub struct PairList;

impl PairList {
    /// Read a pair manifest (`reference:repeat` per line)
    pub fn parse<P: AsRef<Path>>(path: P) -> BatchResult<Vec<PairSpec>> {
        let path = path.as_ref();
        log::info!("Reading pair manifest: {}", path.display());

        if !path.is_file() {
            return Err(BatchError::missing("pair manifest", path));
        }

        let content = std::fs::read_to_string(path)?;
        let pairs = Self::parse_str(&content)?;
        log::info!("Manifest lists {} pair(s)", pairs.len());
        Ok(pairs)
    }

    /// Parse manifest text; any empty or malformed line is an error
    pub fn parse_str(content: &str) -> BatchResult<Vec<PairSpec>> {
        let mut pairs = Vec::new();

        for (index, raw_line) in content.lines().enumerate() {
            let line_number = index + 1;
            let line = raw_line.trim();

            if line.is_empty() {
                return Err(BatchError::ManifestParse {
                    line: line_number,
                    reason: "empty line".to_string(),
                });
            }

            let captures = PAIR_LINE.captures(line).ok_or_else(|| BatchError::ManifestParse {
                line: line_number,
                reason: format!(
                    "expected 'reference{}repeat', found '{}'",
                    PAIR_DELIMITER, line
                ),
            })?;

            for id in [&captures[1], &captures[2]] {
                if !is_valid_identifier(id) {
                    return Err(BatchError::ManifestParse {
                        line: line_number,
                        reason: format!("invalid acquisition identifier '{}'", id),
                    });
                }
            }

            pairs.push(PairSpec {
                reference: captures[1].to_string(),
                repeat: captures[2].to_string(),
                line: line_number,
            });
        }

        if pairs.is_empty() {
            return Err(BatchError::ManifestParse {
                line: 0,
                reason: "manifest contains no pairs".to_string(),
            });
        }

        Ok(pairs)
    }
}
