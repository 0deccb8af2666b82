use crate::analysis::Analyzer;
use crate::config::SimulationConfig;
use crate::engine;
use crate::error::Error;
use crate::model::Trajectories;
use anyhow::{Context, Result};
use glob::glob;
use rmp_serde::{decode, encode};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Manages the runs of a simulation directory.
///
/// The directory holds a `config.toml` and one `run-NNNN` subdirectory per run.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: SimulationConfig,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg = SimulationConfig::from_file(sim_dir.join("config.toml"))
            .context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Perform a new run and save its trajectories.
    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let trajectories = engine::run(&self.cfg);

        let file = self.trajectories_file(run_idx);
        save_trajectories(&trajectories, &file)
            .with_context(|| format!("failed to save {file:?}"))?;
        log::info!("saved {file:?}");

        Ok(())
    }

    /// Analyze every run and save the results next to its trajectories.
    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let file = self.trajectories_file(run_idx);
            let trajectories =
                load_trajectories(&file).with_context(|| format!("failed to load {file:?}"))?;

            let analyzer = match Analyzer::new(&trajectories) {
                Ok(analyzer) => analyzer,
                Err(Error::EmptyPopulation) => {
                    log::warn!("skipped run {run_idx}: empty population");
                    continue;
                }
                Err(error) => return Err(error).context("failed to analyze trajectories"),
            };

            let metrics = analyzer.metrics();
            log::info!(
                "run {run_idx}: mean difference {:.6}, positive ratios {:.3} / {:.3}",
                metrics.mean_difference(),
                metrics.theory_aware.positive_ratio,
                metrics.control.positive_ratio
            );

            analyzer
                .save_results(self.results_file(run_idx))
                .context("failed to save results")?;
        }

        Ok(())
    }

    /// Remove every run directory.
    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs()? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }
        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let run_dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_dir())
            .collect();
        Ok(run_dirs)
    }

    fn count_run_dirs(&self) -> Result<usize> {
        Ok(self.run_dirs()?.len())
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn trajectories_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("trajectories.msgpack")
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.json")
    }
}

fn save_trajectories(trajectories: &Trajectories, file: &Path) -> Result<()> {
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write(&mut writer, trajectories).context("failed to serialize trajectories")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

fn load_trajectories(file: &Path) -> Result<Trajectories> {
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut reader = BufReader::new(file);
    let trajectories = decode::from_read(&mut reader).context("failed to deserialize trajectories")?;
    Ok(trajectories)
}
