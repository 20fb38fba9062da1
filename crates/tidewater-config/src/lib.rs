//! Configuration system for the Tidewater terrain generator.
//!
//! Holds the immutable per-generation [`TerrainConfig`] consumed by the terrain
//! core, plus the surrounding tool settings (output, worker pool, logging).
//! Settings persist to disk as RON files and accept CLI overrides via clap.

mod cli;
mod config;
mod error;
mod terrain;

pub use cli::CliArgs;
pub use config::{
    CONFIG_FILE_NAME, Config, DebugConfig, OutputConfig, WorkerConfig, default_config_dir,
};
pub use error::ConfigError;
pub use terrain::{
    BarrierIslandConfig, BayConfig, BeachConfig, CoastlineConfig, ContourConfig, DeltaConfig,
    ErosionConfig, LakeConfig, NoiseConfig, RiverConfig, TerrainConfig, WorldType,
};
