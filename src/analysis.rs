use crate::error::Result;
use crate::model::{Group, Trajectories};
use crate::stats::{Accumulator, Histogram, Metrics, compute_metrics};
use anyhow::Context;
use serde_json::{Map, Value, json};
use std::{fs::File, io::BufWriter, path::Path};

/// Number of bins of the final value histograms.
pub const N_HIST_BINS: usize = 20;

/// Observable computed from a group's trajectory, one timestep row at a time.
pub trait Obs {
    fn update(&mut self, row: &[f64]);
    fn report(&self) -> Value;
}

/// Mean cumulative value at every timestep.
#[derive(Default)]
pub struct MeanTrajectory {
    means: Vec<f64>,
}

impl MeanTrajectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Obs for MeanTrajectory {
    fn update(&mut self, row: &[f64]) {
        let mut acc = Accumulator::new();
        row.iter().for_each(|&val| acc.add(val));
        if let Some(report) = acc.report() {
            self.means.push(report.mean);
        }
    }

    fn report(&self) -> Value {
        json!({ "mean_trajectory": self.means })
    }
}

/// Distribution of the values at the last timestep.
pub struct FinalHistogram {
    min: f64,
    max: f64,
    final_row: Vec<f64>,
}

impl FinalHistogram {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            final_row: Vec::new(),
        }
    }
}

impl Obs for FinalHistogram {
    fn update(&mut self, row: &[f64]) {
        self.final_row.clear();
        self.final_row.extend_from_slice(row);
    }

    fn report(&self) -> Value {
        let mut hist = Histogram::new(self.min, self.max, N_HIST_BINS);
        self.final_row.iter().for_each(|&val| hist.add(val));
        json!({ "final_histogram": hist })
    }
}

/// Computes metrics and observables of a completed run.
pub struct Analyzer {
    seed: u64,
    metrics: Metrics,
    obs_ptr_vecs: Vec<(Group, Vec<Box<dyn Obs>>)>,
}

impl Analyzer {
    /// Analyze both groups of `trajectories`.
    ///
    /// Histograms of both groups share the range spanned by all final values.
    ///
    /// # Errors
    /// Returns [`crate::Error::EmptyPopulation`] if either group is empty.
    pub fn new(trajectories: &Trajectories) -> Result<Self> {
        let metrics = compute_metrics(trajectories)?;

        let (min, max) = Group::ALL
            .iter()
            .filter_map(|&group| trajectories.group(group).final_row())
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &val| {
                (min.min(val), max.max(val))
            });

        let mut obs_ptr_vecs = Vec::with_capacity(Group::ALL.len());
        for group in Group::ALL {
            let mut obs_ptr_vec: Vec<Box<dyn Obs>> = Vec::new();
            obs_ptr_vec.push(Box::new(MeanTrajectory::new()));
            obs_ptr_vec.push(Box::new(FinalHistogram::new(min, max)));

            for row in trajectories.group(group).rows() {
                for obs in &mut obs_ptr_vec {
                    obs.update(row);
                }
            }
            obs_ptr_vecs.push((group, obs_ptr_vec));
        }

        Ok(Self {
            seed: trajectories.seed,
            metrics,
            obs_ptr_vecs,
        })
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn report(&self) -> Value {
        let mut report = Map::new();
        report.insert("seed".into(), json!(self.seed));
        report.insert("metrics".into(), json!(self.metrics));
        report.insert(
            "mean_difference".into(),
            json!(self.metrics.mean_difference()),
        );

        for (group, obs_ptr_vec) in &self.obs_ptr_vecs {
            let mut group_report = Map::new();
            for obs in obs_ptr_vec {
                if let Value::Object(fields) = obs.report() {
                    group_report.extend(fields);
                }
            }
            report.insert(group.to_string(), Value::Object(group_report));
        }

        Value::Object(report)
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> anyhow::Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, &self.report())
            .context("failed to serialize results")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::model::TrajectoryMatrix;

    fn trajectories(aware: Vec<Vec<f64>>, control: Vec<Vec<f64>>) -> Trajectories {
        Trajectories {
            seed: 0,
            theory_aware: TrajectoryMatrix::from_rows(aware).unwrap(),
            control: TrajectoryMatrix::from_rows(control).unwrap(),
        }
    }

    #[test]
    fn report_contains_both_groups() {
        let traj = trajectories(
            vec![vec![1.0, 3.0], vec![2.0, 4.0]],
            vec![vec![0.0, 0.0], vec![-1.0, 1.0]],
        );
        let report = Analyzer::new(&traj).unwrap().report();

        assert_eq!(report["mean_difference"], json!(3.0));
        assert_eq!(
            report["theory_aware"]["mean_trajectory"],
            json!([2.0, 3.0])
        );
        assert_eq!(report["control"]["mean_trajectory"], json!([0.0, 0.0]));

        let counts = report["control"]["final_histogram"]["counts"]
            .as_array()
            .unwrap();
        assert_eq!(counts.len(), N_HIST_BINS);
        assert_eq!(report["control"]["final_histogram"]["min"], json!(-1.0));
        assert_eq!(report["theory_aware"]["final_histogram"]["max"], json!(4.0));
    }

    #[test]
    fn empty_group_cannot_be_analyzed() {
        let traj = trajectories(Vec::new(), Vec::new());
        assert!(matches!(Analyzer::new(&traj), Err(Error::EmptyPopulation)));
    }
}
