use thiserror::Error;

/// Configuration loading failures. Everything else in the pipeline degrades
/// rather than erroring; config is the one place a bad value should be loud.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key} must be an integer, got {value:?}")]
    InvalidInteger { key: String, value: String },

    #[error("{key} must be one of S/A/B/C/D, got {value:?}")]
    InvalidTier { key: String, value: String },
}
