//! Core types and configuration for the pairs analytics system.
//!
//! This crate provides shared types used across all other crates:
//! - Tick and resampled/aligned series types
//! - Stage outputs (hedge ratio, spread, z-score, stationarity)
//! - Cycle state and result
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
