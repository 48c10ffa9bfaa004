pub mod config;
pub mod error;
pub mod normalize;
pub mod types;

pub use config::Config;
pub use error::ConfigError;
pub use normalize::{normalize_name, normalize_series_loose};
pub use types::*;
