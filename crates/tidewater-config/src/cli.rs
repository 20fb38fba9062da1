//! Command-line argument parsing for Tidewater.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, WorldType};

/// Tidewater command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "tidewater", about = "Deterministic tiled terrain generator")]
pub struct CliArgs {
    /// Center tile x index.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub tx: i32,

    /// Center tile y index.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub ty: i32,

    /// World seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Grid samples per tile edge.
    #[arg(long)]
    pub resolution: Option<usize>,

    /// World type tag (coastal, island, inland, peninsula, bay_harbor,
    /// river_valley, lakefront, delta).
    #[arg(long)]
    pub world_type: Option<String>,

    /// Output directory.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Pretty-print JSON output.
    #[arg(long)]
    pub pretty: Option<bool>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.terrain.seed = seed;
        }
        if let Some(res) = args.resolution {
            self.terrain.resolution = res;
        }
        if let Some(ref tag) = args.world_type {
            self.terrain.world_type = WorldType::from_tag(tag);
        }
        if let Some(ref dir) = args.output {
            self.output.directory = dir.clone();
        }
        if let Some(pretty) = args.pretty {
            self.output.pretty = pretty;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> CliArgs {
        CliArgs {
            tx: 0,
            ty: 0,
            seed: None,
            resolution: None,
            world_type: None,
            output: None,
            pretty: None,
            log_level: None,
            config: None,
        }
    }

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            seed: Some(99),
            world_type: Some("island".to_string()),
            ..empty_args()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.terrain.seed, 99);
        assert_eq!(config.terrain.world_type, WorldType::Island);
        // Non-overridden fields retain defaults
        assert_eq!(config.terrain.resolution, 64);
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&empty_args());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_negative_tiles() {
        let args = CliArgs::try_parse_from(["tidewater", "--tx", "-3", "--ty", "2"]).unwrap();
        assert_eq!(args.tx, -3);
        assert_eq!(args.ty, 2);
    }
}
