//! Tunable parameters for detection, filtering and the frame loop.
//!
//! Every struct deserializes with `#[serde(default)]`, so a JSON config file
//! only needs the keys it overrides.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TrackResult;

// Detector calibration knobs, tied to the 8-bit intensity scale.
pub const CONFIDENCE_DARK_LEVEL: f64 = 50.0;
pub const CONFIDENCE_SPAN: f64 = 20.0;
pub const CONFIDENCE_FLOOR: f64 = 0.3;
pub const STD_WEIGHT: f64 = 0.3;
pub const DISTANCE_WEIGHT: f64 = 0.1;
pub const UPWARD_WEIGHT: f64 = 0.5;
pub const SEARCH_RADIUS: f64 = 100.0;
pub const PRIOR_STEP: usize = 5;
pub const COLD_START_STEP: usize = 7;
pub const COLD_START_FRACTION: f64 = 0.6;
pub const RADIUS_STEP: usize = 2;

// Kalman noise levels (diagonal entries).
pub const PROCESS_NOISE: f64 = 0.1;
pub const MEASUREMENT_NOISE: f64 = 10.0;
pub const INITIAL_COVARIANCE: f64 = 100.0;

// Frame loop defaults.
pub const DEFAULT_RADIUS_RANGE: (u32, u32) = (8, 35);
pub const FALLBACK_DIAMETER: f64 = 30.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Half-width of the prior-guided search box (pixels)
    pub search_radius: f64,
    /// Window step when a prior center is available
    pub prior_step: usize,
    /// Window step on cold start
    pub cold_start_step: usize,
    /// Fraction of the region height searched on cold start
    pub cold_start_fraction: f64,
    pub radius_step: usize,
    pub std_weight: f64,
    pub distance_weight: f64,
    /// Penalty per pixel for candidates above the prior
    pub upward_weight: f64,
    /// Mean intensity at which confidence starts rising above zero
    pub confidence_dark_level: f64,
    pub confidence_span: f64,
    pub confidence_floor: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            search_radius: SEARCH_RADIUS,
            prior_step: PRIOR_STEP,
            cold_start_step: COLD_START_STEP,
            cold_start_fraction: COLD_START_FRACTION,
            radius_step: RADIUS_STEP,
            std_weight: STD_WEIGHT,
            distance_weight: DISTANCE_WEIGHT,
            upward_weight: UPWARD_WEIGHT,
            confidence_dark_level: CONFIDENCE_DARK_LEVEL,
            confidence_span: CONFIDENCE_SPAN,
            confidence_floor: CONFIDENCE_FLOOR,
        }
    }
}

/// Diagonal noise levels of the constant-velocity filter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanNoise {
    pub process: f64,
    pub measurement: f64,
    pub initial_covariance: f64,
}

impl Default for KalmanNoise {
    fn default() -> Self {
        Self {
            process: PROCESS_NOISE,
            measurement: MEASUREMENT_NOISE,
            initial_covariance: INITIAL_COVARIANCE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seconds between frames (1 / fps)
    pub dt: f64,
    /// Inclusive (min, max) ball radius in pixels
    pub radius_range: (u32, u32),
    /// Diameter reported for predicted frames before any detection diameter exists
    pub fallback_diameter: f64,
    /// Confidence reported for predicted frames
    pub fallback_confidence: f64,
    pub detector: DetectorConfig,
    pub kalman: KalmanNoise,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 30.0,
            radius_range: DEFAULT_RADIUS_RANGE,
            fallback_diameter: FALLBACK_DIAMETER,
            fallback_confidence: CONFIDENCE_FLOOR,
            detector: DetectorConfig::default(),
            kalman: KalmanNoise::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_fps(fps: f64) -> Self {
        Self {
            dt: 1.0 / fps,
            ..Self::default()
        }
    }
}

/// Load a pipeline config from a JSON file
pub fn load_config(path: &Path) -> TrackResult<PipelineConfig> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.radius_range, (8, 35));
        assert_eq!(config.detector.prior_step, 5);
        assert_eq!(config.detector.cold_start_step, 7);
        assert_eq!(config.kalman.measurement, 10.0);
        assert_eq!(config.fallback_confidence, 0.3);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "radius_range": [10, 20], "detector": { "std_weight": 0.5 } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.radius_range, (10, 20));
        assert_eq!(config.detector.std_weight, 0.5);
        assert_eq!(config.detector.search_radius, 100.0);
        assert_eq!(config.kalman, KalmanNoise::default());
    }

    #[test]
    fn test_with_fps() {
        let config = PipelineConfig::with_fps(60.0);
        assert!((config.dt - 1.0 / 60.0).abs() < 1e-12);
    }
}
