//! Command-line front end: generates one 3×3 block of tiles and writes a
//! GeoJSON file plus a heightfield file per tile.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p tidewater-cli -- --seed 7 --tx 2 --ty -1 --pretty true`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tidewater_config::{CliArgs, Config, default_config_dir};
use tidewater_terrain::export::write_tile_files;
use tidewater_terrain::{
    AsyncTerrainGenerator, GenerationTask, TerrainError, TerrainResult, TileCoord,
};
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Terrain(#[from] TerrainError),

    #[error("failed to start generation workers: {0}")]
    Workers(#[source] std::io::Error),

    #[error("generation queue rejected the job")]
    QueueFull,

    #[error("generation did not finish within {0}s")]
    TimedOut(u64),
}

fn generate_block(config: &Config, center: TileCoord) -> Result<TerrainResult, CliError> {
    let pool = AsyncTerrainGenerator::from_config(&config.worker).map_err(CliError::Workers)?;
    let task = GenerationTask {
        job_id: 0,
        config: Arc::new(config.terrain.clone()),
        center,
    };
    pool.submit(task).map_err(|_| CliError::QueueFull)?;

    let timeout = config.worker.timeout_secs;
    let done = pool
        .recv_timeout(0, Duration::from_secs(timeout))
        .ok_or(CliError::TimedOut(timeout))?;
    info!(
        tx = center.tx,
        ty = center.ty,
        workers = pool.worker_count(),
        generation_time_us = done.generation_time_us,
        "terrain block ready"
    );
    Ok(done.result?)
}

fn write_block(result: &TerrainResult, dir: &Path, pretty: bool) -> Result<Vec<PathBuf>, CliError> {
    let mut written = Vec::with_capacity(18);
    for (coord, tile) in result.all_tiles() {
        let (geojson, heights) = write_tile_files(dir, tile, pretty)?;
        info!(
            tx = coord.tx,
            ty = coord.ty,
            features = tile.features.len(),
            "wrote {}",
            geojson.display()
        );
        written.push(geojson);
        written.push(heights);
    }
    Ok(written)
}

fn run(config: &Config, center: TileCoord) -> Result<(), CliError> {
    let result = generate_block(config, center)?;
    let written = write_block(&result, &config.output.directory, config.output.pretty)?;
    info!(
        files = written.len(),
        dir = %config.output.directory.display(),
        "output complete"
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let file_logging = cfg!(debug_assertions) || config.debug.log_to_file;
    tidewater_log::init_logging(Some(&config.output.directory), file_logging, Some(&config));
    info!(
        seed = config.terrain.seed,
        world_type = config.terrain.world_type.tag(),
        resolution = config.terrain.resolution,
        "tidewater starting"
    );

    match run(&config, TileCoord::new(args.tx, args.ty)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("tidewater: {e}");
            ExitCode::FAILURE
        }
    }
}
