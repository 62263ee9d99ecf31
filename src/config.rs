//! Engine Configuration
//!
//! Read from a TOML file at startup. Every field has a default, so a partial
//! file only overrides what it names and a missing file means defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::feedback::FeedbackDurations;
use crate::overworld::Locomotion;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "SPROUT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "sprout.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementMode {
    Grid,
    FreeRoam,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Holds quests/ and levels/
    pub data_dir: PathBuf,
    /// Level entered at startup
    pub level: u32,
    pub movement: MovementMode,
    pub tick_hz: u32,
    pub timing: TimingConfig,
    pub free_roam: FreeRoamConfig,
    pub store: StoreConfig,
    pub scenario: ScenarioConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            level: 1,
            movement: MovementMode::Grid,
            tick_hz: 20,
            timing: TimingConfig::default(),
            free_roam: FreeRoamConfig::default(),
            store: StoreConfig::default(),
            scenario: ScenarioConfig::default(),
        }
    }
}

/// Delays in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub twist_return_ms: u64,
    pub coach_ms: u64,
    pub toast_ms: u64,
    pub quiz_close_ms: u64,
    pub celebration_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            twist_return_ms: 2000,
            coach_ms: 2200,
            toast_ms: 2200,
            quiz_close_ms: 1500,
            celebration_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn feedback(&self) -> FeedbackDurations {
        FeedbackDurations {
            toast_ms: self.toast_ms,
            coach_ms: self.coach_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreeRoamConfig {
    /// Pixels per second
    pub speed: f32,
    pub tile_size: f32,
    /// Pixels
    pub interact_radius: f32,
}

impl Default for FreeRoamConfig {
    fn default() -> Self {
        Self {
            speed: 110.0,
            tile_size: 32.0,
            interact_radius: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Json,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// JSON file for the json backend
    pub path: PathBuf,
    pub database_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Json,
            path: PathBuf::from("save/player_state.json"),
            database_url: "sqlite://save/sprout.db?mode=rwc".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// JSON scenario file; unset means no provider is configured
    pub file: Option<PathBuf>,
}

impl EngineConfig {
    /// Load from a file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load from `SPROUT_CONFIG`, or `sprout.toml`
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(Path::new(&path))
    }

    pub fn locomotion(&self) -> Locomotion {
        match self.movement {
            MovementMode::Grid => Locomotion::Grid,
            MovementMode::FreeRoam => Locomotion::FreeRoam {
                speed: self.free_roam.speed,
                tile_size: self.free_roam.tile_size,
                interact_radius: self.free_roam.interact_radius,
            },
        }
    }

    pub fn quests_dir(&self) -> PathBuf {
        self.data_dir.join("quests")
    }

    pub fn levels_dir(&self) -> PathBuf {
        self.data_dir.join("levels")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::load(&dir.path().join("sprout.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.timing.twist_return_ms, 2000);
        assert_eq!(config.locomotion(), Locomotion::Grid);
    }

    #[test]
    fn test_partial_file_overrides_named_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sprout.toml");
        std::fs::write(
            &path,
            r#"
            level = 5
            movement = "free_roam"

            [timing]
            coach_ms = 1500

            [store]
            backend = "sqlite"

            [scenario]
            file = "data/scenarios.json"
            "#,
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.level, 5);
        assert_eq!(config.timing.coach_ms, 1500);
        assert_eq!(config.timing.toast_ms, 2200);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.path, PathBuf::from("save/player_state.json"));
        assert_eq!(config.scenario.file, Some(PathBuf::from("data/scenarios.json")));
        assert!(matches!(
            config.locomotion(),
            Locomotion::FreeRoam { speed, .. } if speed == 110.0
        ));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sprout.toml");
        std::fs::write(&path, "movement = \"teleport\"").unwrap();
        assert!(matches!(EngineConfig::load(&path), Err(ConfigError::Parse { .. })));
    }
}
