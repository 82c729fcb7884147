//! Linear algebra type system for the ball tracker
//!
//! Provides compile-time dimension checking and clean type aliases
//! for the constant-velocity Kalman filter.

use nalgebra::{SMatrix, SVector};

// ===== State Dimensions =====
pub const STATE_DIM_CV: usize = 4; // (x, y, vx, vy)

// ===== Measurement Dimensions =====
pub const MEASURE_DIM_POS: usize = 2; // (x, y)

// ===== Constant-Velocity Filter Types =====
pub type StateVec4 = SVector<f64, STATE_DIM_CV>;
pub type StateMat4 = SMatrix<f64, STATE_DIM_CV, STATE_DIM_CV>;

// Measurement types
pub type PosVec = SVector<f64, MEASURE_DIM_POS>;
pub type PosNoise = SMatrix<f64, MEASURE_DIM_POS, MEASURE_DIM_POS>;

// Observation matrix (2×4)
pub type ObservationPos = SMatrix<f64, MEASURE_DIM_POS, STATE_DIM_CV>;

// Kalman gain (4×2)
pub type KalmanGainPos = SMatrix<f64, STATE_DIM_CV, MEASURE_DIM_POS>;
