use thiserror::Error;

#[derive(Error, Debug)]
pub enum GradeError {
    #[error("Malformed LUT asset: {0}")]
    MalformedAsset(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GradeError>;

/// Admission limiter is at capacity; the caller drops the frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Admission capacity exceeded ({capacity} in flight)")]
pub struct CapacityExceeded {
    pub capacity: usize,
}

/// Presentation surface could not provide a target this tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Surface unavailable: {0}")]
pub struct SurfaceUnavailable(pub String);
