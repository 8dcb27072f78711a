//! Computation parameters and their defaults.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::ops::RangeInclusive;
use std::path::Path;

use crate::error::{IriError, Result};

pub const DEFAULT_SEGMENT_LENGTH: u32 = 100;
pub const SEGMENT_LENGTH_RANGE: RangeInclusive<u32> = 25..=500;
pub const DEFAULT_CUTOFF_FREQ: f64 = 10.0;
pub const DEFAULT_CHUNK_HINT: usize = 10_000;

fn default_segment_length() -> u32 {
    DEFAULT_SEGMENT_LENGTH
}

fn default_cutoff_freq() -> f64 {
    DEFAULT_CUTOFF_FREQ
}

fn default_chunk_hint() -> usize {
    DEFAULT_CHUNK_HINT
}

fn check_segment_length(segment_length: u32) -> Result<()> {
    if !SEGMENT_LENGTH_RANGE.contains(&segment_length) {
        return Err(IriError::Validation(format!(
            "segment_length must be between {} and {}, got {}",
            SEGMENT_LENGTH_RANGE.start(),
            SEGMENT_LENGTH_RANGE.end(),
            segment_length
        )));
    }
    Ok(())
}

// =====================
// Full engine
// =====================
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComputeParams {
    #[serde(default = "default_segment_length")]
    pub segment_length: u32,
    #[serde(default = "default_cutoff_freq")]
    pub cutoff_freq: f64,
}

impl Default for ComputeParams {
    fn default() -> Self {
        ComputeParams {
            segment_length: DEFAULT_SEGMENT_LENGTH,
            cutoff_freq: DEFAULT_CUTOFF_FREQ,
        }
    }
}

impl ComputeParams {
    pub fn new(segment_length: u32, cutoff_freq: f64) -> Self {
        ComputeParams { segment_length, cutoff_freq }
    }

    pub fn validate(&self) -> Result<()> {
        check_segment_length(self.segment_length)?;
        if !self.cutoff_freq.is_finite() || self.cutoff_freq <= 0.0 {
            return Err(IriError::Validation(format!(
                "cutoff_freq must be a positive number, got {}",
                self.cutoff_freq
            )));
        }
        Ok(())
    }

    /// Loads parameters from a JSON file; absent keys take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let f = File::open(&path)?;
        let params: ComputeParams = serde_json::from_reader(BufReader::new(f))?;
        params.validate()?;
        Ok(params)
    }
}

// =====================
// Lite engine
// =====================
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiteParams {
    #[serde(default = "default_segment_length")]
    pub segment_length: u32,
    /// Expected row count per read batch; only used to size buffers, and
    /// capped at [`crate::loader::MAX_PREALLOC_ROWS`].
    #[serde(default = "default_chunk_hint")]
    pub chunk_hint: usize,
}

impl Default for LiteParams {
    fn default() -> Self {
        LiteParams {
            segment_length: DEFAULT_SEGMENT_LENGTH,
            chunk_hint: DEFAULT_CHUNK_HINT,
        }
    }
}

impl LiteParams {
    pub fn new(segment_length: u32, chunk_hint: usize) -> Self {
        LiteParams { segment_length, chunk_hint }
    }

    pub fn validate(&self) -> Result<()> {
        check_segment_length(self.segment_length)?;
        if self.chunk_hint == 0 {
            return Err(IriError::Validation("chunk_hint must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let p = ComputeParams::default();
        assert_eq!(p.segment_length, 100);
        assert_eq!(p.cutoff_freq, 10.0);
        assert!(p.validate().is_ok());

        let l = LiteParams::default();
        assert_eq!(l.segment_length, 100);
        assert_eq!(l.chunk_hint, 10_000);
    }

    #[test]
    fn segment_length_bounds_are_inclusive() {
        assert!(ComputeParams::new(25, 10.0).validate().is_ok());
        assert!(ComputeParams::new(500, 10.0).validate().is_ok());
        assert!(matches!(
            ComputeParams::new(24, 10.0).validate(),
            Err(IriError::Validation(_))
        ));
        assert!(LiteParams::new(501, 10).validate().is_err());
    }

    #[test]
    fn rejects_non_positive_cutoff() {
        assert!(ComputeParams::new(100, 0.0).validate().is_err());
        assert!(ComputeParams::new(100, f64::NAN).validate().is_err());
    }

    #[test]
    fn missing_json_keys_fall_back_to_defaults() {
        let p: ComputeParams = serde_json::from_str(r#"{"segment_length": 50}"#).unwrap();
        assert_eq!(p, ComputeParams::new(50, 10.0));

        let l: LiteParams = serde_json::from_str("{}").unwrap();
        assert_eq!(l, LiteParams::default());
    }
}
