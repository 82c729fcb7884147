/// Constant-Velocity Kalman Filter (4D)
///
/// State Vector (4D):
/// [0-1]: Position (x, y) in region pixels
/// [2-3]: Velocity (vx, vy) in pixels/second
///
/// Measurement: detector position (x, y).
///
/// A falling ball at terminal velocity moves uniformly, so the motion model
/// has no acceleration term and the filter only smooths detector noise.
/// `predict` and `update` may be called in any order; the frame loop predicts
/// without updating when detection fails.
use log::trace;
use serde::{Deserialize, Serialize};

use crate::config::KalmanNoise;
use crate::error::{TrackResult, TrackingError};
use crate::types::{KalmanGainPos, ObservationPos, PosNoise, PosVec, StateMat4, StateVec4};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KalmanCvState {
    pub position: (f64, f64),
    pub velocity: (f64, f64),

    /// Covariance trace for uncertainty
    pub covariance_trace: f64,

    pub predict_count: u64,
    pub update_count: u64,
}

#[derive(Clone, Debug)]
pub struct KalmanTracker {
    /// Time step [seconds]
    dt: f64,

    /// State vector [x, y, vx, vy]
    state: StateVec4,

    /// Covariance matrix [4x4]
    covariance: StateMat4,

    /// State transition [4x4]
    transition: StateMat4,

    /// Observation matrix [2x4]
    observation: ObservationPos,

    /// Process noise [4x4]
    process_noise: StateMat4,

    /// Measurement noise [2x2]
    measurement_noise: PosNoise,

    predict_count: u64,
    update_count: u64,
}

impl KalmanTracker {
    /// Create a tracker at rest at `(x0, y0)` with the default noise model
    pub fn new(x0: f64, y0: f64, dt: f64) -> Self {
        Self::with_noise(x0, y0, dt, KalmanNoise::default())
    }

    pub fn with_noise(x0: f64, y0: f64, dt: f64, noise: KalmanNoise) -> Self {
        Self {
            dt,
            state: StateVec4::new(x0, y0, 0.0, 0.0),
            covariance: StateMat4::identity() * noise.initial_covariance,
            transition: Self::build_transition(dt),
            observation: Self::position_observation(),
            process_noise: StateMat4::identity() * noise.process,
            measurement_noise: PosNoise::identity() * noise.measurement,
            predict_count: 0,
            update_count: 0,
        }
    }

    fn build_transition(dt: f64) -> StateMat4 {
        let mut f = StateMat4::identity();
        f[(0, 2)] = dt;
        f[(1, 3)] = dt;
        f
    }

    fn position_observation() -> ObservationPos {
        let mut h = ObservationPos::zeros();
        h[(0, 0)] = 1.0;
        h[(1, 1)] = 1.0;
        h
    }

    /// Time update: `x = F x`, `P = F P F^T + Q`. Returns the predicted position.
    pub fn predict(&mut self) -> (f64, f64) {
        self.state = self.transition * self.state;
        self.covariance =
            self.transition * self.covariance * self.transition.transpose() + self.process_noise;
        self.predict_count += 1;
        self.position()
    }

    /// Measurement update with a position fix. Returns the corrected position.
    ///
    /// Fails only when the innovation covariance `S = H P H^T + R` is singular,
    /// which needs a degenerate noise configuration.
    pub fn update(&mut self, measurement: (f64, f64)) -> TrackResult<(f64, f64)> {
        let z = PosVec::new(measurement.0, measurement.1);
        let h = &self.observation;
        let h_t = h.transpose();

        let innovation = z - h * self.state;
        let s = h * self.covariance * h_t + self.measurement_noise;
        let Some(s_inv) = s.try_inverse() else {
            return Err(TrackingError::SingularInnovation);
        };
        let k: KalmanGainPos = self.covariance * h_t * s_inv;

        self.state += k * innovation;
        self.covariance = (StateMat4::identity() - k * h) * self.covariance;
        self.update_count += 1;

        trace!(
            "kalman update: innovation=({:.2}, {:.2}) velocity=({:.2}, {:.2})",
            innovation[0],
            innovation[1],
            self.state[2],
            self.state[3]
        );

        Ok(self.position())
    }

    pub fn position(&self) -> (f64, f64) {
        (self.state[0], self.state[1])
    }

    pub fn velocity(&self) -> (f64, f64) {
        (self.state[2], self.state[3])
    }

    /// Overwrite the velocity estimate, e.g. when the fall speed is known in advance
    pub fn set_velocity(&mut self, vx: f64, vy: f64) {
        self.state[2] = vx;
        self.state[3] = vy;
    }

    pub fn state(&self) -> &StateVec4 {
        &self.state
    }

    pub fn covariance(&self) -> &StateMat4 {
        &self.covariance
    }

    pub fn transition(&self) -> &StateMat4 {
        &self.transition
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn get_state(&self) -> KalmanCvState {
        KalmanCvState {
            position: self.position(),
            velocity: self.velocity(),
            covariance_trace: self.covariance.trace(),
            predict_count: self.predict_count,
            update_count: self.update_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Box-Muller normal sample
    fn gaussian(rng: &mut StdRng, sigma: f64) -> f64 {
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen::<f64>();
        sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    #[test]
    fn test_initialization() {
        let tracker = KalmanTracker::new(100.0, 200.0, 0.1);
        assert_eq!(tracker.position(), (100.0, 200.0));
        assert_eq!(tracker.velocity(), (0.0, 0.0));
        assert_abs_diff_eq!(tracker.transition()[(0, 2)], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(tracker.transition()[(1, 3)], 0.1, epsilon = 1e-12);
        assert_eq!(*tracker.covariance(), StateMat4::identity() * 100.0);
    }

    #[test]
    fn test_predict_stationary() {
        for dt in [0.01, 1.0 / 30.0, 1.0, 5.0] {
            let mut tracker = KalmanTracker::new(100.0, 200.0, dt);
            let (x, y) = tracker.predict();
            assert_abs_diff_eq!(x, 100.0, epsilon = 1e-9);
            assert_abs_diff_eq!(y, 200.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_predict_constant_velocity() {
        let mut tracker = KalmanTracker::new(100.0, 200.0, 0.5);
        tracker.set_velocity(10.0, 20.0);
        let (x, y) = tracker.predict();
        assert_abs_diff_eq!(x, 105.0, epsilon = 1e-9);
        assert_abs_diff_eq!(y, 210.0, epsilon = 1e-9);
    }

    #[test]
    fn test_predict_grows_covariance() {
        let mut tracker = KalmanTracker::new(0.0, 0.0, 1.0);
        let before = tracker.covariance().trace();
        tracker.predict();
        assert!(tracker.covariance().trace() > before);
    }

    #[test]
    fn test_update_moves_toward_measurement() {
        let mut tracker = KalmanTracker::new(100.0, 200.0, 1.0);
        let (x, y) = tracker.update((105.0, 205.0)).unwrap();
        assert!(x > 100.0 && x < 105.0);
        assert!(y > 200.0 && y < 205.0);
    }

    #[test]
    fn test_update_without_predict_large_coordinates() {
        let mut tracker = KalmanTracker::new(3840.0, 2160.0, 1.0);
        let (x, y) = tracker.update((3850.0, 2170.0)).unwrap();
        assert!(x > 3840.0);
        assert!(y > 2160.0);
    }

    #[test]
    fn test_velocity_converges_on_falling_ball() {
        let mut tracker = KalmanTracker::new(100.0, 100.0, 0.1);
        for step in 1..=5 {
            tracker.predict();
            tracker.update((100.0, 100.0 + 10.0 * step as f64)).unwrap();
        }
        let (vx, vy) = tracker.velocity();
        assert!(vy > 50.0, "vy = {vy}");
        assert!(vx.abs() < 1e-9);
    }

    #[test]
    fn test_noise_attenuation() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tracker = KalmanTracker::new(100.0, 100.0, 1.0);

        let mut errors = Vec::new();
        for i in 0..10 {
            let true_y = 100.0 + 10.0 * i as f64;
            let measurement = (100.0 + gaussian(&mut rng, 2.0), true_y + gaussian(&mut rng, 2.0));
            tracker.predict();
            let (_, y) = tracker.update(measurement).unwrap();
            errors.push((y - true_y).abs());
        }

        let tail: f64 = errors[7..].iter().sum::<f64>() / 3.0;
        assert!(tail < 5.0, "mean tail error {tail}");
    }

    #[test]
    fn test_identical_inputs_identical_trajectories() {
        let measurements = [(10.0, 12.0), (10.5, 19.0), (9.8, 31.0), (10.1, 40.5)];
        let mut a = KalmanTracker::new(10.0, 5.0, 1.0 / 30.0);
        let mut b = KalmanTracker::new(10.0, 5.0, 1.0 / 30.0);

        for m in measurements {
            assert_eq!(a.predict(), b.predict());
            assert_eq!(a.update(m).unwrap(), b.update(m).unwrap());
        }
        assert_eq!(a.state(), b.state());
        assert_eq!(a.covariance(), b.covariance());
    }

    #[test]
    fn test_covariance_stays_symmetric() {
        let mut tracker = KalmanTracker::new(0.0, 0.0, 0.1);
        for step in 0..20 {
            tracker.predict();
            tracker.update((0.0, step as f64 * 3.0)).unwrap();
        }
        let p = tracker.covariance();
        assert_abs_diff_eq!(*p, p.transpose(), epsilon = 1e-6);
    }

    #[test]
    fn test_singular_innovation_is_error() {
        let noise = KalmanNoise {
            process: 0.0,
            measurement: 0.0,
            initial_covariance: 0.0,
        };
        let mut tracker = KalmanTracker::with_noise(0.0, 0.0, 1.0, noise);
        let result = tracker.update((1.0, 1.0));
        assert!(matches!(result, Err(TrackingError::SingularInnovation)));
        assert_eq!(tracker.position(), (0.0, 0.0));
    }

    #[test]
    fn test_get_state_counts() {
        let mut tracker = KalmanTracker::new(0.0, 0.0, 1.0);
        tracker.predict();
        tracker.predict();
        tracker.update((1.0, 2.0)).unwrap();
        let state = tracker.get_state();
        assert_eq!(state.predict_count, 2);
        assert_eq!(state.update_count, 1);
    }
}
