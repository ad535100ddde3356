//! ClockRelay core — shared types, configuration, estimate parsing
//! and usage classification.

pub mod config;
pub mod error;
pub mod estimate;
pub mod status;
pub mod types;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
