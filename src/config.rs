//! Viewer configuration.
//!
//! A small JSON file (`glance.json` next to the executable's working
//! directory) controls the initial window size and the multisample count used
//! for the visible framebuffer. Missing file or unknown fields fall back to
//! defaults so a fresh checkout runs without any setup.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// File name the configuration is loaded from.
pub const CONFIG_FILE: &str = "glance.json";

static CONFIG: Lazy<ViewerConfig> = Lazy::new(ViewerConfig::load);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window_width: u32,
    pub window_height: u32,
    /// Sample count of the visible framebuffer. The offscreen target sets are
    /// always single-sampled; picking reads individual id texels.
    pub sample_count: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            sample_count: 1,
        }
    }
}

impl ViewerConfig {
    /// Configuration for this process, loaded once on first use.
    pub fn global() -> &'static ViewerConfig {
        &CONFIG
    }

    fn load() -> Self {
        match std::fs::read_to_string(CONFIG_FILE) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(config) => config,
                Err(err) => {
                    log::warn!("failed to parse {CONFIG_FILE}: {err}; using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Multisample state matching the visible framebuffer.
    pub fn multisample_state(&self) -> wgpu::MultisampleState {
        wgpu::MultisampleState {
            count: self.sample_count.max(1),
            mask: !0,
            alpha_to_coverage_enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.window_width, 1280);
        assert_eq!(config.window_height, 720);
        assert_eq!(config.sample_count, 1);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ViewerConfig = serde_json::from_str(r#"{"window_width": 800}"#).unwrap();
        assert_eq!(config.window_width, 800);
        assert_eq!(config.window_height, 720);
    }

    #[test]
    fn test_roundtrip() {
        let config = ViewerConfig {
            window_width: 640,
            window_height: 480,
            sample_count: 4,
        };
        let text = serde_json::to_string(&config).unwrap();
        let back: ViewerConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_multisample_state_never_zero() {
        let config = ViewerConfig {
            sample_count: 0,
            ..Default::default()
        };
        assert_eq!(config.multisample_state().count, 1);
    }
}
