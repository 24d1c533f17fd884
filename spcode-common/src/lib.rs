//! # spcode Common Library
//!
//! Shared code for the spcode service and its command-line tools:
//! - Bootstrap configuration (TOML file + compiled defaults)
//! - Data folder resolution and initialization
//! - Common error type

pub mod config;
pub mod error;

pub use error::{Error, Result};
