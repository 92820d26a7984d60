//! Error types for the label raster conversion.

use thiserror::Error;

/// Errors that can occur while converting a label raster.
///
/// Every variant is fatal for the unit of work (one raster) that produced it
/// only; the dataset pipeline logs it and moves on to the next file.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The raster or the category table cannot be interpreted.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error occurred while reading or writing a file.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Error occurred while decoding or encoding an image file.
    #[error("image: {0}")]
    Image(#[from] image::ImageError),

    /// Error occurred while parsing or writing JSON.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// The worker pool could not be started.
    #[error("worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl ConvertError {
    /// Creates an `InvalidInput` error from anything printable.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ConvertError::InvalidInput {
            message: message.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_wrapped_errors_keep_their_cause() {
        let err = ConvertError::from(io::Error::new(
            io::ErrorKind::NotFound,
            "config.json: No such file",
        ));
        assert_eq!(err.to_string(), "io: config.json: No such file");

        let err = ConvertError::from(serde_json::from_str::<u32>("nope").unwrap_err());
        assert!(err.to_string().starts_with("json: expected value"));
    }
}
