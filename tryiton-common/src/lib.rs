//! # TryItOn Common Library
//!
//! Shared code for the TryItOn services:
//! - Error and result types
//! - Configuration file discovery and TOML loading
//! - SQLite initialization and the model-record table

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;

pub use error::{Error, Result};
