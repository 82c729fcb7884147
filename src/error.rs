use thiserror::Error;

/// Ball tracker error types
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Innovation covariance is singular")]
    SingularInnovation,

    #[error("Invalid ROI: {0}")]
    InvalidRoi(String),

    #[error("Invalid frame range: {0}")]
    InvalidFrameRange(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Ball was not tracked in any frame")]
    NoTrackedFrames,

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for tracking operations
pub type TrackResult<T> = Result<T, TrackingError>;
