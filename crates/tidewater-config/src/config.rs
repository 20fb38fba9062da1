//! Top-level configuration with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::terrain::TerrainConfig;

/// Top-level tool configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Parameters handed unchanged to the terrain pipeline.
    pub terrain: TerrainConfig,
    /// Where and how generated tiles are written.
    pub output: OutputConfig,
    /// Background generation pool settings.
    pub worker: WorkerConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory that receives `.geojson` and heightfield files.
    pub directory: PathBuf,
    /// Pretty-print JSON output.
    pub pretty: bool,
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of generation threads (0 = derive from CPU count).
    pub threads: usize,
    /// Seconds a single 3x3 generation may run before its result is discarded.
    pub timeout_secs: u64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Write a JSON log file next to the output.
    pub log_to_file: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            pretty: false,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            timeout_secs: 120,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: false,
        }
    }
}

/// Platform config directory for Tidewater, falling back to `./config`.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("tidewater"))
        .unwrap_or_else(|| PathBuf::from("config"))
}

/// File name of the persisted configuration inside its directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

fn ron_layout() -> ron::ser::PrettyConfig {
    ron::ser::PrettyConfig::new()
        .depth_limit(4)
        .struct_names(false)
        .enumerate_arrays(false)
}

impl Config {
    /// Path of `config.ron` inside `config_dir`.
    pub fn path_in(config_dir: &Path) -> PathBuf {
        config_dir.join(CONFIG_FILE_NAME)
    }

    /// Parses RON text. Missing sections take their defaults; the terrain
    /// block must pass validation.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: Config = ron::from_str(text).map_err(ConfigError::ParseError)?;
        config.terrain.validate()?;
        Ok(config)
    }

    /// Pretty RON text of this configuration.
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron_layout()).map_err(ConfigError::SerializeError)
    }

    fn read(config_dir: &Path) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(Self::path_in(config_dir)).map_err(ConfigError::ReadError)?;
        Self::from_ron(&text)
    }

    /// Reads `config.ron` from `config_dir`, writing the defaults there first
    /// when the file does not exist yet.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = Self::path_in(config_dir);
        if !path.exists() {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("wrote default terrain config to {}", path.display());
            return Ok(config);
        }
        let config = Self::read(config_dir)?;
        log::info!(
            "terrain config from {} (seed {}, {:?})",
            path.display(),
            config.terrain.seed,
            config.terrain.world_type
        );
        Ok(config)
    }

    /// Writes `config.ron` into `config_dir`, creating the directory.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;
        std::fs::write(Self::path_in(config_dir), self.to_ron()?).map_err(ConfigError::WriteError)
    }

    /// Re-reads `config.ron`; `Some` only when it differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = Self::read(config_dir)?;
        if fresh == *self {
            return Ok(None);
        }
        log::info!("terrain config changed on disk");
        Ok(Some(fresh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::WorldType;

    #[test]
    fn test_default_text_lists_terrain_parameters() {
        let text = Config::default().to_ron().unwrap();
        assert!(text.contains("resolution: 64"));
        assert!(text.contains("timeout_secs: 120"));
        assert_eq!(Config::from_ron(&text).unwrap(), Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = Config::from_ron("(terrain: (seed: 7), debug: ())").unwrap();
        assert_eq!(config.terrain.seed, 7);
        assert_eq!(config.worker, WorkerConfig::default());
        assert_eq!(config.terrain.beach, crate::BeachConfig::default());
        assert_eq!(Config::from_ron("(future_setting: true)").unwrap(), Config::default());
    }

    #[test]
    fn test_world_type_parses_by_tag() {
        let config = Config::from_ron("(terrain: (world_type: bay_harbor))").unwrap();
        assert_eq!(config.terrain.world_type, WorldType::BayHarbor);
        assert!(matches!(
            Config::from_ron("(terrain: (world_type: volcano))"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_invalid_terrain_rejected_when_parsing() {
        assert!(matches!(
            Config::from_ron("(terrain: (water_level: 1.5))"),
            Err(ConfigError::Invalid { field: "terrain.water_level", .. })
        ));
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("tidewater");
        let config = Config::load_or_create(&nested).unwrap();
        assert_eq!(config, Config::default());
        assert!(Config::path_in(&nested).exists());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.terrain.seed = 1234;
        config.terrain.world_type = WorldType::Peninsula;
        config.output.pretty = true;

        config.save(dir.path()).unwrap();
        assert_eq!(Config::load_or_create(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_invalid_terrain() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.terrain.resolution = 2;
        config.save(dir.path()).unwrap();

        let result = Config::load_or_create(dir.path());
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_reload_reports_only_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();
        assert!(config.reload(dir.path()).unwrap().is_none());

        let mut modified = config.clone();
        modified.terrain.water_level = 0.5;
        modified.save(dir.path()).unwrap();
        let reloaded = config.reload(dir.path()).unwrap().unwrap();
        assert_eq!(reloaded.terrain.water_level, 0.5);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::default().reload(dir.path()),
            Err(ConfigError::ReadError(_))
        ));
    }
}
