//! Renderer configuration.
//!
//! Settings that shape the frame loop at startup: window geometry, the
//! number of frames in flight, vsync, and validation layers. Values are
//! loadable from a TOML file and fall back to defaults when the file is
//! absent.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Default number of frames in flight (double buffering).
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

/// Upper bound on frames in flight; deeper queues add latency without
/// improving throughput.
pub const MAX_FRAMES_IN_FLIGHT: usize = 4;

/// Window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Initial window width in pixels.
    pub width: u32,
    /// Initial window height in pixels.
    pub height: u32,
    /// Window title.
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "frameloop".to_string(),
        }
    }
}

/// Top-level renderer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Window settings.
    pub window: WindowConfig,
    /// Number of frame slots used round-robin by the render loop.
    pub frames_in_flight: usize,
    /// Prefer the blocking FIFO present mode (vsync) over MAILBOX.
    pub vsync: bool,
    /// Enable Vulkan validation layers when available.
    pub validation: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            vsync: false,
            validation: cfg!(debug_assertions),
        }
    }
}

impl RendererConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?;
        Ok(config.sanitized())
    }

    /// Loads configuration from a TOML file, falling back to defaults.
    ///
    /// A missing file is expected on first run; a malformed file is logged
    /// and ignored rather than aborting startup.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(Error::Io(_)) => Self::default(),
            Err(e) => {
                warn!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Clamps out-of-range values to usable ones.
    ///
    /// Frames in flight must be at least 1 and at most
    /// [`MAX_FRAMES_IN_FLIGHT`].
    pub fn sanitized(mut self) -> Self {
        if self.frames_in_flight < 1 || self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            warn!(
                "frames_in_flight {} out of range, clamping to {}",
                self.frames_in_flight, DEFAULT_FRAMES_IN_FLIGHT
            );
            self.frames_in_flight = DEFAULT_FRAMES_IN_FLIGHT;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RendererConfig::default();
        assert_eq!(config.frames_in_flight, DEFAULT_FRAMES_IN_FLIGHT);
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert!(!config.vsync);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: RendererConfig = toml::from_str(
            r#"
            vsync = true

            [window]
            width = 800
            height = 600
            "#,
        )
        .unwrap();

        assert!(config.vsync);
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        // Unspecified fields take defaults
        assert_eq!(config.frames_in_flight, DEFAULT_FRAMES_IN_FLIGHT);
    }

    #[test]
    fn test_sanitize_clamps_frames_in_flight() {
        let config = RendererConfig {
            frames_in_flight: 0,
            ..Default::default()
        };
        assert_eq!(config.sanitized().frames_in_flight, DEFAULT_FRAMES_IN_FLIGHT);

        let config = RendererConfig {
            frames_in_flight: 16,
            ..Default::default()
        };
        assert_eq!(config.sanitized().frames_in_flight, DEFAULT_FRAMES_IN_FLIGHT);

        let config = RendererConfig {
            frames_in_flight: 3,
            ..Default::default()
        };
        assert_eq!(config.sanitized().frames_in_flight, 3);
    }
}
