use std::collections::VecDeque;

use crate::error::{TrackResult, TrackingError};

/// Causal moving-average filter for trajectory samples
///
/// Equivalent to an FIR filter with `window` equal taps of `1/window` and zero
/// initial conditions: the first `window - 1` outputs are pulled toward zero
/// because the missing history counts as zeros.
pub struct MovingAverage {
    window: VecDeque<f64>,
    window_size: usize,
}

impl MovingAverage {
    /// Create a new filter with given window size (clamped to at least 1)
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        MovingAverage {
            window: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    /// Push a sample and return the filtered value
    pub fn apply(&mut self, value: f64) -> f64 {
        self.window.push_back(value);
        while self.window.len() > self.window_size {
            self.window.pop_front();
        }
        self.window.iter().sum::<f64>() / self.window_size as f64
    }

    /// Get current window fill (actual, not max)
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

/// Filter a whole signal with a fresh [`MovingAverage`]
pub fn moving_average(signal: &[f64], window_size: usize) -> Vec<f64> {
    let mut filter = MovingAverage::new(window_size);
    signal.iter().map(|&v| filter.apply(v)).collect()
}

/// Numerical derivative `d values / d coords` on a non-uniform grid
///
/// Interior points use the second-order three-point formula, the two ends use
/// one-sided first differences.
pub fn gradient(values: &[f64], coords: &[f64]) -> TrackResult<Vec<f64>> {
    let n = values.len();
    if n != coords.len() {
        return Err(TrackingError::InsufficientData(format!(
            "gradient needs matching lengths, got {} values and {} coordinates",
            n,
            coords.len()
        )));
    }
    if n < 2 {
        return Err(TrackingError::InsufficientData(format!(
            "gradient needs at least 2 samples, got {n}"
        )));
    }
    if coords.windows(2).any(|w| w[1] <= w[0]) {
        return Err(TrackingError::InvalidParameters(
            "gradient coordinates must be strictly increasing".to_string(),
        ));
    }

    let mut out = Vec::with_capacity(n);
    out.push((values[1] - values[0]) / (coords[1] - coords[0]));
    for i in 1..n - 1 {
        let hs = coords[i] - coords[i - 1];
        let hd = coords[i + 1] - coords[i];
        let a = -hd / (hs * (hd + hs));
        let b = (hd - hs) / (hd * hs);
        let c = hs / (hd * (hd + hs));
        out.push(a * values[i - 1] + b * values[i] + c * values[i + 1]);
    }
    out.push((values[n - 1] - values[n - 2]) / (coords[n - 1] - coords[n - 2]));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_single_value_zero_history() {
        let mut filter = MovingAverage::new(4);
        // Missing history counts as zeros
        assert_eq!(filter.apply(8.0), 2.0);
    }

    #[test]
    fn test_window_wrapping() {
        let mut filter = MovingAverage::new(2);
        filter.apply(1.0);
        filter.apply(2.0);
        let result = filter.apply(3.0);
        assert_eq!(filter.len(), 2);
        assert_abs_diff_eq!(result, 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_moving_average_signal() {
        let out = moving_average(&[3.0, 3.0, 3.0, 6.0], 3);
        assert_abs_diff_eq!(out[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[1], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[2], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[3], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gradient_linear_exact() {
        let t = [0.0, 0.1, 0.3, 0.4, 0.7];
        let y: Vec<f64> = t.iter().map(|t| 5.0 + 12.0 * t).collect();
        for g in gradient(&y, &t).unwrap() {
            assert_abs_diff_eq!(g, 12.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_gradient_quadratic_interior() {
        let t = [0.0, 1.0, 3.0, 4.0];
        let y: Vec<f64> = t.iter().map(|t| t * t).collect();
        let g = gradient(&y, &t).unwrap();
        // Three-point formula is exact for quadratics
        assert_abs_diff_eq!(g[1], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(g[2], 6.0, epsilon = 1e-9);
        // Ends are first differences
        assert_abs_diff_eq!(g[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(g[3], 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_gradient_rejects_bad_input() {
        assert!(gradient(&[1.0], &[0.0]).is_err());
        assert!(gradient(&[1.0, 2.0], &[0.0]).is_err());
        assert!(gradient(&[1.0, 2.0, 3.0], &[0.0, 1.0, 1.0]).is_err());
    }
}
