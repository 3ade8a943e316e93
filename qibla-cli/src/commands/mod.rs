//! CLI command implementations.

pub mod bearing;
pub mod common;
pub mod config;
pub mod declination;
pub mod simulate;
