//! Shared types, config, and error definitions for trade-guardian.

pub mod breakdown;
pub mod config;
pub mod error;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use breakdown::{Breakdown, Component};
pub use config::{DiagonalConfig, DteWindow, EngineConfig, ProbeConfig, RoutePreference};
pub use error::Error;
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
