//! Error types for dominant color extraction

use thiserror::Error;

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Everything that can stop an extraction.
///
/// A `colorCount` below 2 is not represented here: it is clamped, never rejected.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The raster could not produce a pixel at a sampled coordinate
    #[error("Failed to read pixel ({x}, {y}) of a {width}x{height} image")]
    ImageAccess {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// Not enough sampled points to form a single cluster
    #[error("Insufficient data: got {points} sample points, need at least {required}")]
    InsufficientData { points: usize, required: usize },

    /// A configuration or engine parameter is out of range
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    /// Image bytes or file could not be decoded
    #[error("Failed to load image: {message}")]
    ImageLoad {
        message: String,
        #[source]
        source: image::ImageError,
    },

    /// Configuration file could not be read or parsed
    #[error("Failed to load configuration: {message}")]
    Config {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ExtractError {
    /// Create an image load error with context
    pub fn image_load(message: impl Into<String>, source: image::ImageError) -> Self {
        Self::ImageLoad {
            message: message.into(),
            source,
        }
    }

    /// Create a configuration error with context
    pub fn config<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            source: Box::new(source),
        }
    }

    pub fn invalid_parameter(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }
}
