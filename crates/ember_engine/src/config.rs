//! Renderer configuration
//!
//! Serializable configuration for the graphics backend: application metadata,
//! frames-in-flight tuning, shader locations, and validation layer control.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Hard upper bound on frames in flight; more buys nothing but latency.
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Config file could not be parsed as TOML
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse
        path: String,
        /// Underlying TOML error
        source: toml::de::Error,
    },
}

/// Configuration for the Vulkan graphics backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Application name used for Vulkan instance creation and window titles
    pub application_name: String,
    /// Requested number of frames in flight (clamped to [1, 3])
    pub frames_in_flight: usize,
    /// Base directory holding precompiled SPIR-V shader binaries
    pub shader_dir: PathBuf,
    /// Vertex shader file name, resolved against `shader_dir`
    pub vertex_shader: String,
    /// Fragment shader file name, resolved against `shader_dir`
    pub fragment_shader: String,
    /// Validation layer toggle; `None` means "debug builds only"
    pub enable_validation: Option<bool>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "ember".to_string(),
            frames_in_flight: 2,
            shader_dir: PathBuf::from("shaders"),
            vertex_shader: "vert.spv".to_string(),
            fragment_shader: "frag.spv".to_string(),
            enable_validation: None,
        }
    }
}

impl RendererConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Frames in flight clamped to the supported range
    pub fn clamped_frames_in_flight(&self) -> usize {
        self.frames_in_flight.clamp(1, MAX_FRAMES_IN_FLIGHT)
    }

    /// Whether validation layers should be enabled for this build
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = RendererConfig::default();
        assert_eq!(config.clamped_frames_in_flight(), 2);
        assert_eq!(config.vertex_shader, "vert.spv");
        assert_eq!(config.fragment_shader, "frag.spv");
    }

    #[test]
    fn frames_in_flight_is_clamped() {
        let mut config = RendererConfig::default();

        config.frames_in_flight = 0;
        assert_eq!(config.clamped_frames_in_flight(), 1);

        config.frames_in_flight = 8;
        assert_eq!(config.clamped_frames_in_flight(), 3);

        config.frames_in_flight = 3;
        assert_eq!(config.clamped_frames_in_flight(), 3);
    }

    #[test]
    fn parses_from_toml() {
        let text = r#"
            application_name = "demo"
            frames_in_flight = 3
            shader_dir = "assets/shaders"
            vertex_shader = "triangle.vert.spv"
            fragment_shader = "triangle.frag.spv"
            enable_validation = false
        "#;
        let config: RendererConfig = toml::from_str(text).unwrap();
        assert_eq!(config.application_name, "demo");
        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.shader_dir, PathBuf::from("assets/shaders"));
        assert!(!config.validation_enabled());
    }
}
