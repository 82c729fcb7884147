pub mod linalg;

pub use linalg::*;

use serde::{Deserialize, Serialize};

/// Best dark circle found in a frame region.
///
/// `x`/`y` are region-local pixel coordinates of the search window center.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x: f64,
    pub y: f64,
    pub diameter: f64,
    /// Darkness-based trust in `[0.3, 1.0]`
    pub confidence: f64,
    /// Mean intensity inside the winning disc
    pub mean_intensity: f64,
}

impl Detection {
    pub fn center(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// Position measured by the detector
    Detected,
    /// Detector failed, Kalman prediction substituted
    Predicted,
}

/// One accepted frame of the trajectory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// 1-based frame number
    pub frame: usize,
    /// Accepted center (raw detection or substituted prediction)
    pub x: f64,
    pub y: f64,
    /// Tracker position after the measurement update
    pub filtered_x: f64,
    pub filtered_y: f64,
    /// Prediction made before detection, absent on the frame that created the tracker
    pub predicted: Option<(f64, f64)>,
    pub diameter: f64,
    pub confidence: f64,
    pub source: DetectionSource,
}
