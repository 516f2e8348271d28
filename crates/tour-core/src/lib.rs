pub mod config;
pub mod error;
pub mod types;

pub use config::TourConfig;
pub use error::{Result, TourError};
pub use types::*;
