//! # Server Configuration
//!
//! Loaded once at startup from TOML; every field has a playable default so
//! a bare `bulwark_server` boots without a file.

use crate::error::SimResult;
use bulwark_shared::constants;
use serde::Deserialize;
use std::path::Path;

/// Configuration for one arena instance.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Tick rate in Hz.
    pub tick_rate: u32,
    /// Half extent of the square arena, world units.
    pub arena_half_extent: f32,
    /// Broad-phase cell size as a power of two (7 = 128 units).
    pub cell_shift: u32,
    /// Maximum live entities.
    pub capacity: usize,
    /// Seed for the deterministic simulation RNG.
    pub seed: u64,
    /// Ticks a deletion animation runs.
    pub deletion_anim_ticks: u32,
    /// Half extent of a client's view rectangle.
    pub view_half_extent: f32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: constants::TICK_RATE,
            arena_half_extent: 2000.0,
            cell_shift: 7,
            capacity: 4096,
            seed: 0x1077_ED42,
            deletion_anim_ticks: constants::DELETION_ANIMATION_TICKS,
            view_half_extent: constants::VIEW_HALF_EXTENT,
        }
    }
}

impl ServerConfig {
    /// Loads a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed.
    pub fn from_toml(path: impl AsRef<Path>) -> SimResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Parses a config from a TOML string.
    ///
    /// # Errors
    ///
    /// Fails if the string is not valid TOML for this schema.
    pub fn from_toml_str(raw: &str) -> SimResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Duration of one tick.
    #[must_use]
    pub fn tick_duration(&self) -> std::time::Duration {
        std::time::Duration::from_micros(1_000_000 / u64::from(self.tick_rate.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_playable() {
        let config = ServerConfig::default();
        assert!(config.tick_rate > 0);
        assert!(config.capacity > 0);
        assert!(config.arena_half_extent > config.view_half_extent);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = ServerConfig::from_toml_str("tick_rate = 50\nseed = 7\n").unwrap();
        assert_eq!(config.tick_rate, 50);
        assert_eq!(config.seed, 7);
        assert_eq!(config.capacity, ServerConfig::default().capacity);
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        assert!(ServerConfig::from_toml_str("tick_rate = \"fast\"").is_err());
    }
}
