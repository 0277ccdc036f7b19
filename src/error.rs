//! Error types for setu-slam.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum SetuError {
    /// `update` or a visual refresh was called before a pose graph was bound.
    #[error("pose graph has not been bound yet")]
    GraphNotBound,

    /// Visuals were initialized before configuration parameters were loaded.
    #[error("configuration parameters have not been loaded yet")]
    ConfigNotLoaded,

    /// A visual operation was requested without a bound display handle.
    #[error("display handle has not been bound yet")]
    DisplayNotBound,

    /// `update_visuals` was called before `initialize_visuals`.
    #[error("visuals have not been initialized yet")]
    VisualsNotInitialized,

    /// Malformed or undecodable configuration source.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed externally stored scan payload.
    #[error("scan payload error: {0}")]
    Payload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl From<toml::de::Error> for SetuError {
    fn from(e: toml::de::Error) -> Self {
        SetuError::Config(e.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SetuError>;
