//! Error types shared across the frame loop.

use thiserror::Error;

/// Main error type for the application layers above the RHI.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Vulkan-related errors surfaced through the platform layer
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the frame loop's Error type.
pub type Result<T> = std::result::Result<T, Error>;
