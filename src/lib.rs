//! Falling-ball tracking and viscometry.
//!
//! Locates a dark ball in grayscale frames, smooths its trajectory with a
//! constant-velocity Kalman filter, estimates terminal velocity and converts
//! it into a viscosity via Stokes' law.

pub mod analysis;
pub mod config;
pub mod detector;
pub mod error;
pub mod filters;
pub mod frames;
pub mod physics;
pub mod pipeline;
pub mod session;
pub mod smoothing;
pub mod types;

pub use analysis::{analyze_trajectory, TrajectoryAnalysis};
pub use config::{load_config, DetectorConfig, KalmanNoise, PipelineConfig};
pub use detector::{find_darkest_circle, DarkestCircleDetector};
pub use error::{TrackResult, TrackingError};
pub use filters::KalmanTracker;
pub use frames::{FrameRange, Roi};
pub use physics::{compute_viscosity, ArrheniusCalibration, StokesParameters};
pub use pipeline::{FrameOutcome, TrajectoryEstimator};
pub use session::{SessionExport, SessionMetadata};
pub use types::{Detection, DetectionSource, TrackPoint};
