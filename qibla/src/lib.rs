//! Qibla - directional sensor fusion for a compass that points at a target
//!
//! This library turns raw device orientation readings into a stable,
//! declination-corrected heading and the bearing from the device to a fixed
//! geographic target (the Kaaba by default).
//!
//! # Modules
//!
//! - [`geo`] - great-circle bearing and distance
//! - [`declination`] - magnetic declination with offline fallback
//! - [`heading`] - smoothing and calibration detection
//! - [`session`] - lifecycle state machine and async runner
//! - [`config`] - INI configuration file
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod declination;
pub mod geo;
pub mod heading;
pub mod logging;
pub mod session;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
