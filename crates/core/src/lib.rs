//! Core utilities for the frame loop.
//!
//! This crate provides foundational types and utilities used across the
//! workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer utilities
//! - Renderer configuration

mod config;
mod error;
mod logging;
mod timer;

pub use config::{DEFAULT_FRAMES_IN_FLIGHT, MAX_FRAMES_IN_FLIGHT, RendererConfig, WindowConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
