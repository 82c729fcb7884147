//! Per-frame trajectory estimation.
//!
//! Each frame: the tracker predicts, the detector searches around that
//! prediction (or the last accepted position before a tracker exists), and a
//! successful detection corrects the tracker. When detection fails the
//! prediction stands in with reduced confidence; without a tracker the frame
//! is skipped. The first accepted position creates the tracker.

use log::{debug, info, warn};
use ndarray::ArrayView2;

use crate::config::PipelineConfig;
use crate::detector::DarkestCircleDetector;
use crate::error::TrackResult;
use crate::filters::KalmanTracker;
use crate::types::{DetectionSource, TrackPoint};

#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    Tracked(TrackPoint),
    /// No detection and no tracker to fall back on
    Skipped,
}

pub struct TrajectoryEstimator {
    config: PipelineConfig,
    detector: DarkestCircleDetector,
    tracker: Option<KalmanTracker>,
    prev_center: Option<(f64, f64)>,
    points: Vec<TrackPoint>,
    skipped_frames: usize,
    predicted_frames: usize,
}

impl TrajectoryEstimator {
    pub fn new(config: PipelineConfig) -> Self {
        let detector = DarkestCircleDetector::new(config.detector.clone());
        Self {
            config,
            detector,
            tracker: None,
            prev_center: None,
            points: Vec::new(),
            skipped_frames: 0,
            predicted_frames: 0,
        }
    }

    /// Process one cropped grayscale region; `frame` is the 0-based frame index
    pub fn process_frame(
        &mut self,
        frame: usize,
        region: ArrayView2<u8>,
    ) -> TrackResult<FrameOutcome> {
        let predicted = self.tracker.as_mut().map(|t| t.predict());
        let prior = predicted.or(self.prev_center);

        let detection = self
            .detector
            .detect(region, prior, self.config.radius_range);

        let (center, diameter, confidence, source) = match (detection, predicted) {
            (Some(det), _) => {
                if self.tracker.is_none() {
                    info!(
                        "First detection at frame {}: ({:.1}, {:.1}), diameter={:.1}",
                        frame, det.x, det.y, det.diameter
                    );
                }
                (det.center(), det.diameter, det.confidence, DetectionSource::Detected)
            }
            (None, Some(prediction)) => {
                warn!("Frame {}: detection failed, using Kalman prediction", frame);
                let diameter = self
                    .points
                    .last()
                    .map(|p| p.diameter)
                    .unwrap_or(self.config.fallback_diameter);
                self.predicted_frames += 1;
                (
                    prediction,
                    diameter,
                    self.config.fallback_confidence,
                    DetectionSource::Predicted,
                )
            }
            (None, None) => {
                debug!("Frame {}: no detection possible, skipping", frame);
                self.skipped_frames += 1;
                return Ok(FrameOutcome::Skipped);
            }
        };

        let (dt, noise) = (self.config.dt, self.config.kalman);
        let tracker = self.tracker.get_or_insert_with(|| {
            info!("Kalman tracker initialized at frame {}", frame);
            KalmanTracker::with_noise(center.0, center.1, dt, noise)
        });
        let filtered = tracker.update(center)?;

        let point = TrackPoint {
            frame: frame + 1,
            x: center.0,
            y: center.1,
            filtered_x: filtered.0,
            filtered_y: filtered.1,
            predicted,
            diameter,
            confidence,
            source,
        };
        self.points.push(point.clone());
        self.prev_center = Some(center);

        Ok(FrameOutcome::Tracked(point))
    }

    pub fn track_points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn into_track_points(self) -> Vec<TrackPoint> {
        self.points
    }

    pub fn tracker(&self) -> Option<&KalmanTracker> {
        self.tracker.as_ref()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn skipped_frames(&self) -> usize {
        self.skipped_frames
    }

    /// Frames whose position came from the Kalman prediction
    pub fn predicted_frames(&self) -> usize {
        self.predicted_frames
    }
}
