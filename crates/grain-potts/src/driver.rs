//! The simulation loop: step, transition on schedule, checkpoint on
//! schedule, stop at the configured end.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use thiserror::Error;
use tracing::{error, info};

use crate::analysis::LatticeAnalyzer;
use crate::config::Config;
use crate::potts::{Lattice, LatticeError};
use crate::vtk::{self, VtkError};

#[derive(Error, Debug)]
pub enum DriverError {
    #[error(transparent)]
    Vtk(#[from] VtkError),

    #[error(transparent)]
    Lattice(#[from] LatticeError),

    #[error("failed to create output folder {path}: {source}")]
    OutputFolder {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Simulated time between progress log lines.
const PROGRESS_LOG_INTERVAL: f64 = 20_000.0;

/// Load the initial state and build a configured, uninitialized lattice.
pub fn build_lattice(config: &Config) -> Result<Lattice, DriverError> {
    let mut grid = vtk::from_file(&config.initial_state_path)?;
    if config.scale_multiplier != 1.0 {
        grid = vtk::scale_grid(&grid, config.scale_multiplier);
    }

    let mut lattice = Lattice::from_grid(&grid, config.rng_seed);
    lattice.default_mobility = config.default_mobility;
    lattice.transitioned_mobility = config.transitioned_mobility;
    lattice.grain_count = config.const_grain_count;
    Ok(lattice)
}

/// Run the full simulation described by `config`.
pub fn run(config: &Config) -> Result<(), DriverError> {
    fs::create_dir_all(&config.output_folder).map_err(|source| DriverError::OutputFolder {
        path: config.output_folder.display().to_string(),
        source,
    })?;

    let mut lattice = build_lattice(config)?;
    if config.log_transitions {
        lattice.begin_logging_transitions(&config.output_folder)?;
    }
    lattice.init()?;

    let checkpoints = config.checkpoint_list();
    let mut curr_checkpoint = 0usize;
    let mut next_checkpoint = config.checkpoint_interval;
    let mut vtk_count = 0usize;

    let mut timestep = 0.0;
    let mut log_duration = 0.0;
    let mut transition_duration = 0.0;

    let mut analyzer = LatticeAnalyzer::new();
    let timer = Instant::now();
    let mut lap = Instant::now();

    loop {
        let curr_step = lattice.step()?;
        timestep += curr_step;
        log_duration += curr_step;
        transition_duration += curr_step;

        if log_duration >= PROGRESS_LOG_INTERVAL {
            info!(
                t = timestep,
                dt = curr_step,
                activity = lattice.system_activity(),
                flips = lattice.total_flips,
                transformed_flips = lattice.transformed_flips,
                lap_s = lap.elapsed().as_secs_f64(),
                total_s = timer.elapsed().as_secs_f64(),
                "progress"
            );
            lap = Instant::now();
            log_duration = 0.0;
        }

        if transition_duration >= config.transition_interval && config.transition_count > 0 {
            if config.log_transitions {
                lattice.set_log_timestep(timestep);
            }
            lattice.transition_boundaries(
                config.transition_count,
                config.propagation_chance,
                config.propagation_ratio,
                config.use_potential_energy,
            )?;
            transition_duration = 0.0;
        }

        if !checkpoints.is_empty()
            && curr_checkpoint < checkpoints.len()
            && timestep >= checkpoints[curr_checkpoint]
        {
            write_checkpoint(config, &mut lattice, &mut analyzer, vtk_count + 1, timestep);
            vtk_count += 1;
            curr_checkpoint += 1;

            if config.max_timestep <= 0.0 && curr_checkpoint >= checkpoints.len() {
                break;
            }
        } else if config.checkpoint_interval > 0.0 && timestep >= next_checkpoint {
            write_checkpoint(config, &mut lattice, &mut analyzer, vtk_count + 1, timestep);
            vtk_count += 1;
            next_checkpoint += config.checkpoint_interval;
        }

        if config.max_timestep > 0.0 && timestep >= config.max_timestep {
            break;
        }
    }

    if config.log_transitions {
        lattice.stop_logging_transitions()?;
    }
    info!(
        t = timestep,
        flips = lattice.total_flips,
        total_s = timer.elapsed().as_secs_f64(),
        "simulation finished"
    );
    Ok(())
}

/// Path of the `n`th checkpoint at `timestep`.
fn checkpoint_path(config: &Config, vtk_index: usize, timestep: f64, suffix: &str) -> PathBuf {
    config.output_folder.join(format!(
        "{}_{:04}_{}{}",
        config.identifier, vtk_index, timestep as u64, suffix
    ))
}

/// Write one checkpoint (and its analysis file when enabled). IO failures
/// here are logged and swallowed; the simulation carries on.
fn write_checkpoint(
    config: &Config,
    lattice: &mut Lattice,
    analyzer: &mut LatticeAnalyzer,
    vtk_index: usize,
    timestep: f64,
) {
    let path = checkpoint_path(config, vtk_index, timestep, ".vtk");
    if let Err(err) = vtk::to_vtk(&path, lattice) {
        error!(%err, path = %path.display(), "checkpoint write failed; continuing");
    }
    if config.log_transitions {
        if let Err(err) = lattice.flush_log_file() {
            error!(%err, "transition log flush failed; continuing");
        }
    }

    if config.generate_analysis_files {
        info!("beginning analysis");
        analyzer.load_lattice(lattice);
        let path = checkpoint_path(config, vtk_index, timestep, "_analysis.txt");
        if let Err(err) = analyzer.save_analysis(&path, lattice) {
            error!(%err, path = %path.display(), "analysis write failed; continuing");
        }
    }
}
