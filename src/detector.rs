//! Darkest-circle ball detector.
//!
//! Slides disc-shaped windows of several radii over a grayscale region and
//! keeps the single candidate that is darkest and most uniform. Works on low
//! contrast footage where thresholding fails.
//!
//! Scoring (lower is better):
//!   score = mean + std_weight * std
//!         + distance_weight * |candidate - prior|           (prior only)
//!         + upward_weight * |dy|   when candidate is above  (prior only)
//!
//! Reported `(x, y)` is the center of the `2r x 2r` window, i.e. the disc center.

use std::collections::HashMap;

use log::debug;
use ndarray::ArrayView2;

use crate::config::DetectorConfig;
use crate::types::Detection;

/// Pixel offsets `(row, col)` inside a `2r x 2r` window that fall on the disc.
#[derive(Clone, Debug)]
pub struct DiscMask {
    radius: usize,
    offsets: Vec<(usize, usize)>,
}

impl DiscMask {
    pub fn new(radius: usize) -> Self {
        let r = radius as i64;
        let side = 2 * radius;
        let mut offsets = Vec::new();
        for i in 0..side {
            for j in 0..side {
                let di = i as i64 - r;
                let dj = j as i64 - r;
                if di * di + dj * dj <= r * r {
                    offsets.push((i, j));
                }
            }
        }
        Self { radius, offsets }
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Mean and population standard deviation of the masked pixels of the
    /// window centered at `(x, y)`. Caller guarantees the window is in bounds.
    fn stats(&self, region: &ArrayView2<u8>, x: usize, y: usize) -> (f64, f64) {
        let top = y - self.radius;
        let left = x - self.radius;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for &(i, j) in &self.offsets {
            let v = region[[top + i, left + j]] as f64;
            sum += v;
            sum_sq += v * v;
        }
        let n = self.offsets.len() as f64;
        let mean = sum / n;
        let variance = (sum_sq / n - mean * mean).max(0.0);
        (mean, variance.sqrt())
    }
}

/// Half-open pixel bounds of the candidate-center search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchWindow {
    pub x_min: usize,
    pub x_max: usize,
    pub y_min: usize,
    pub y_max: usize,
}

impl SearchWindow {
    /// With a prior the box extends further downward than upward (the ball falls).
    /// Without one, the top part of the region is searched across its full width.
    pub fn new(
        height: usize,
        width: usize,
        prior_center: Option<(f64, f64)>,
        config: &DetectorConfig,
    ) -> Self {
        match prior_center {
            Some((px, py)) => {
                let search_radius = config.search_radius;
                Self {
                    y_min: clip(py - (search_radius / 2.0).floor(), height),
                    y_max: clip(py + search_radius * 2.0, height),
                    x_min: clip(px - search_radius, width),
                    x_max: clip(px + search_radius, width),
                }
            }
            None => Self {
                y_min: 0,
                y_max: clip(height as f64 * config.cold_start_fraction, height),
                x_min: 0,
                x_max: width,
            },
        }
    }
}

/// Truncate toward zero and clamp into `[0, upper]`.
fn clip(value: f64, upper: usize) -> usize {
    (value.trunc() as i64).clamp(0, upper as i64) as usize
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    x: usize,
    y: usize,
    radius: usize,
    mean_intensity: f64,
}

/// Detector with a per-radius disc mask cache.
///
/// Masks depend only on the radius, so the cache never couples to an image.
#[derive(Debug, Default)]
pub struct DarkestCircleDetector {
    config: DetectorConfig,
    mask_cache: HashMap<usize, DiscMask>,
}

impl DarkestCircleDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            mask_cache: HashMap::new(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Number of radii with a cached mask
    pub fn cached_masks(&self) -> usize {
        self.mask_cache.len()
    }

    /// Find the darkest, most uniform disc in `region`.
    ///
    /// `radius_range` is inclusive and walked in `radius_step` increments.
    /// Returns `None` when no candidate window fits (empty region, inverted
    /// range, radii larger than the region).
    pub fn detect(
        &mut self,
        region: ArrayView2<u8>,
        prior_center: Option<(f64, f64)>,
        radius_range: (u32, u32),
    ) -> Option<Detection> {
        let (height, width) = region.dim();
        if height == 0 || width == 0 {
            return None;
        }

        let config = &self.config;
        let window = SearchWindow::new(height, width, prior_center, config);
        let step = if prior_center.is_some() {
            config.prior_step
        } else {
            config.cold_start_step
        }
        .max(1);

        let (min_radius, max_radius) = radius_range;
        let mut best_score = f64::INFINITY;
        let mut best_result: Option<Candidate> = None;

        for radius in (min_radius..=max_radius).step_by(config.radius_step.max(1)) {
            let radius = radius as usize;
            if radius == 0 || 2 * radius > height || 2 * radius > width {
                continue;
            }
            let mask = self
                .mask_cache
                .entry(radius)
                .or_insert_with(|| DiscMask::new(radius));

            let y_start = window.y_min.max(radius);
            let y_end = window.y_max.min(height - radius);
            let x_start = window.x_min.max(radius);
            let x_end = window.x_max.min(width - radius);

            for y in (y_start..y_end).step_by(step) {
                for x in (x_start..x_end).step_by(step) {
                    let (mean, std) = mask.stats(&region, x, y);
                    let mut score = mean + std * config.std_weight;

                    if let Some((px, py)) = prior_center {
                        let dx = x as f64 - px;
                        let dy = y as f64 - py;
                        score += (dx * dx + dy * dy).sqrt() * config.distance_weight;
                        if dy < 0.0 {
                            score += dy.abs() * config.upward_weight;
                        }
                    }

                    if score < best_score {
                        best_score = score;
                        best_result = Some(Candidate {
                            x,
                            y,
                            radius,
                            mean_intensity: mean,
                        });
                    }
                }
            }
        }

        let best = best_result?;
        let raw = (config.confidence_dark_level - best.mean_intensity) / config.confidence_span;
        let confidence = raw.min(1.0).max(config.confidence_floor);

        debug!(
            "darkest circle at ({}, {}) r={} mean={:.1} score={:.2} conf={:.2}",
            best.x, best.y, best.radius, best.mean_intensity, best_score, confidence
        );

        Some(Detection {
            x: best.x as f64,
            y: best.y as f64,
            diameter: (best.radius * 2) as f64,
            confidence,
            mean_intensity: best.mean_intensity,
        })
    }
}

/// Stateless detection with default calibration.
pub fn find_darkest_circle(
    region: ArrayView2<u8>,
    prior_center: Option<(f64, f64)>,
    radius_range: (u32, u32),
) -> Option<Detection> {
    DarkestCircleDetector::default().detect(region, prior_center, radius_range)
}
