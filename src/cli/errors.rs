use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Cloud cover {value} out of range 0..={max}")]
    InvalidCloudCover { value: f64, max: f64 },

    #[error("Max size must be greater than 0")]
    ZeroSize,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Eo(#[from] eoprocess::Error),
}
