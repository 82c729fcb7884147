//! Position and velocity analysis of a tracked fall.
//!
//! Positions are smoothed with a causal moving average, differentiated on the
//! frame time grid, and the smoothed velocity is fitted with a cubic. The
//! first frames are skipped because the ball may still be accelerating.

use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{TrackResult, TrackingError};
use crate::smoothing::{gradient, moving_average};
use crate::types::TrackPoint;

const MAX_SMOOTHING_WINDOW: usize = 20;
const MIN_SMOOTHING_WINDOW: usize = 3;
const MAX_SKIP_FRAMES: usize = 24;
/// Samples that must remain after skipping the acceleration phase
const MIN_KEPT_SAMPLES: usize = 5;
const CUBIC_TERMS: usize = 4;

/// `a t^3 + b t^2 + c t + d` with `coeffs = [a, b, c, d]`
pub fn poly3(t: f64, coeffs: &[f64; 4]) -> f64 {
    let [a, b, c, d] = *coeffs;
    a * t.powi(3) + b * t.powi(2) + c * t + d
}

/// Least-squares cubic fit, returns `[a, b, c, d]`
pub fn fit_cubic(t: &[f64], values: &[f64]) -> TrackResult<[f64; 4]> {
    if t.len() != values.len() || t.len() < CUBIC_TERMS {
        return Err(TrackingError::InsufficientData(format!(
            "cubic fit needs at least {} matching samples, got {} times and {} values",
            CUBIC_TERMS,
            t.len(),
            values.len()
        )));
    }

    let design = DMatrix::from_fn(t.len(), CUBIC_TERMS, |row, col| {
        t[row].powi((CUBIC_TERMS - 1 - col) as i32)
    });
    let rhs = DVector::from_column_slice(values);
    let solution = design
        .svd(true, true)
        .solve(&rhs, 1e-12)
        .map_err(|e| TrackingError::InsufficientData(format!("cubic fit failed: {e}")))?;

    Ok([solution[0], solution[1], solution[2], solution[3]])
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrajectoryAnalysis {
    /// Seconds since the first tracked frame
    pub time: Vec<f64>,
    pub position_y: Vec<f64>,
    pub filtered_y: Vec<f64>,
    pub smoothing_window: usize,
    /// Leading samples excluded from the velocity estimate
    pub skip_frames: usize,
    /// Velocities over `time[skip_frames..]` (pixels/s)
    pub velocity: Vec<f64>,
    pub velocity_filtered: Vec<f64>,
    pub cubic_fit: Option<[f64; 4]>,
    /// Cubic evaluated on the kept times, or the filtered velocity when no fit was possible
    pub fitted_velocity: Vec<f64>,
    pub terminal_velocity_px_s: f64,
    pub average_diameter_px: f64,
    pub mean_confidence: f64,
}

/// Analyze an accepted trajectory recorded at `fps` frames per second
pub fn analyze_trajectory(points: &[TrackPoint], fps: f64) -> TrackResult<TrajectoryAnalysis> {
    if points.is_empty() {
        return Err(TrackingError::NoTrackedFrames);
    }
    if !(fps > 0.0) {
        return Err(TrackingError::InvalidParameters(format!(
            "fps must be positive, got {fps}"
        )));
    }

    let n = points.len();
    let first_frame = points[0].frame as f64;
    let time: Vec<f64> = points
        .iter()
        .map(|p| (p.frame as f64 - first_frame) / fps)
        .collect();
    let position_y: Vec<f64> = points.iter().map(|p| p.y).collect();

    let smoothing_window = (n / 3).max(MIN_SMOOTHING_WINDOW).min(MAX_SMOOTHING_WINDOW);
    let filtered_y = moving_average(&position_y, smoothing_window);

    let mut skip_frames = n.saturating_sub(MIN_KEPT_SAMPLES).min(MAX_SKIP_FRAMES);
    let (velocity, velocity_filtered, cubic_fit) = if n > skip_frames + 3 {
        let t = &time[skip_frames..];
        let velocity = gradient(&position_y[skip_frames..], t)?;
        let velocity_filtered = gradient(&filtered_y[skip_frames..], t)?;
        let cubic_fit = if velocity_filtered.len() >= CUBIC_TERMS {
            Some(fit_cubic(t, &velocity_filtered)?)
        } else {
            None
        };
        (velocity, velocity_filtered, cubic_fit)
    } else {
        skip_frames = 0;
        (
            gradient(&position_y, &time)?,
            gradient(&filtered_y, &time)?,
            None,
        )
    };

    let fitted_velocity = match &cubic_fit {
        Some(coeffs) => time[skip_frames..]
            .iter()
            .map(|&t| poly3(t, coeffs))
            .collect(),
        None => velocity_filtered.clone(),
    };

    let terminal_velocity_px_s = velocity_filtered.last().copied().unwrap_or(0.0);
    let average_diameter_px = points.iter().map(|p| p.diameter).sum::<f64>() / n as f64;
    let mean_confidence = points.iter().map(|p| p.confidence).sum::<f64>() / n as f64;

    debug!(
        "analysis: n={} window={} skip={} fit={:?}",
        n, smoothing_window, skip_frames, cubic_fit
    );
    info!(
        "Terminal velocity {:.2} px/s, average diameter {:.2} px, mean confidence {:.2}",
        terminal_velocity_px_s, average_diameter_px, mean_confidence
    );

    Ok(TrajectoryAnalysis {
        time,
        position_y,
        filtered_y,
        smoothing_window,
        skip_frames,
        velocity,
        velocity_filtered,
        cubic_fit,
        fitted_velocity,
        terminal_velocity_px_s,
        average_diameter_px,
        mean_confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DetectionSource;
    use approx::assert_abs_diff_eq;

    fn point(frame: usize, y: f64) -> TrackPoint {
        TrackPoint {
            frame,
            x: 50.0,
            y,
            filtered_x: 50.0,
            filtered_y: y,
            predicted: None,
            diameter: 24.0,
            confidence: 0.8,
            source: DetectionSource::Detected,
        }
    }

    #[test]
    fn test_poly3() {
        assert_eq!(poly3(1.0, &[2.0, 3.0, 4.0, 5.0]), 14.0);
        assert_eq!(poly3(0.0, &[1.0, 2.0, 3.0, 10.0]), 10.0);
        assert_eq!(poly3(2.0, &[-1.0, -1.0, -1.0, -1.0]), -15.0);
    }

    #[test]
    fn test_fit_cubic_recovers_coefficients() {
        let t: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
        let coeffs = [2.0, -1.0, 3.0, 4.0];
        let v: Vec<f64> = t.iter().map(|&t| poly3(t, &coeffs)).collect();

        let fit = fit_cubic(&t, &v).unwrap();
        for (got, want) in fit.iter().zip(coeffs.iter()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_fit_cubic_needs_four_points() {
        assert!(fit_cubic(&[0.0, 1.0, 2.0], &[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_constant_fall_terminal_velocity() {
        // 5 px per frame at 30 fps = 150 px/s
        let points: Vec<TrackPoint> = (1..=40).map(|f| point(f, 10.0 + 5.0 * f as f64)).collect();
        let analysis = analyze_trajectory(&points, 30.0).unwrap();

        assert_eq!(analysis.smoothing_window, 13);
        assert_eq!(analysis.skip_frames, 24);
        assert_eq!(analysis.velocity.len(), 16);
        assert_abs_diff_eq!(analysis.terminal_velocity_px_s, 150.0, epsilon = 1e-6);
        assert!(analysis.cubic_fit.is_some());
        for v in &analysis.fitted_velocity {
            assert_abs_diff_eq!(*v, 150.0, epsilon = 1e-4);
        }
        assert_abs_diff_eq!(analysis.average_diameter_px, 24.0, epsilon = 1e-12);
        assert_abs_diff_eq!(analysis.mean_confidence, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_short_track_uses_all_samples() {
        let points: Vec<TrackPoint> = (1..=3).map(|f| point(f, 2.0 * f as f64)).collect();
        let analysis = analyze_trajectory(&points, 10.0).unwrap();
        assert_eq!(analysis.skip_frames, 0);
        assert!(analysis.cubic_fit.is_none());
        assert_eq!(analysis.velocity.len(), 3);
        assert_abs_diff_eq!(analysis.velocity[1], 20.0, epsilon = 1e-9);
        assert_eq!(analysis.fitted_velocity, analysis.velocity_filtered);
    }

    #[test]
    fn test_time_uses_frame_gaps() {
        // Frame 3 was skipped by the tracker
        let points = vec![point(1, 0.0), point(2, 1.0), point(4, 3.0), point(5, 4.0)];
        let analysis = analyze_trajectory(&points, 1.0).unwrap();
        assert_eq!(analysis.time, vec![0.0, 1.0, 3.0, 4.0]);
        for v in &analysis.velocity {
            assert_abs_diff_eq!(*v, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_no_points_is_tracking_failure() {
        assert!(matches!(
            analyze_trajectory(&[], 30.0),
            Err(TrackingError::NoTrackedFrames)
        ));
    }

    #[test]
    fn test_single_point_insufficient() {
        assert!(matches!(
            analyze_trajectory(&[point(1, 0.0)], 30.0),
            Err(TrackingError::InsufficientData(_))
        ));
    }
}
