//! State estimation filters

pub mod kalman_cv;

pub use kalman_cv::{KalmanCvState, KalmanTracker};
