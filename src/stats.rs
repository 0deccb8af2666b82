use crate::error::{Error, Result};
use crate::model::{Group, Trajectories, TrajectoryMatrix};
use serde::{Deserialize, Serialize};

/// Running mean and variance (Welford's algorithm).
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn n_vals(&self) -> usize {
        self.n_vals
    }

    /// Mean and population standard deviation; `None` before the first value.
    pub fn report(&self) -> Option<AccumulatorReport> {
        if self.n_vals == 0 {
            return None;
        }
        Some(AccumulatorReport {
            mean: self.mean,
            std_dev: (self.diff_2_sum / self.n_vals as f64).max(0.0).sqrt(),
        })
    }
}

/// Summary of a group's final values.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct GroupMetrics {
    pub mean_final: f64,
    /// Population standard deviation of the final values.
    pub std_final: f64,
    /// Fraction of agents whose final value is strictly positive.
    pub positive_ratio: f64,
}

impl GroupMetrics {
    /// Compute the metrics of a set of final values.
    ///
    /// # Errors
    /// Returns [`Error::EmptyPopulation`] if `vals` is empty.
    pub fn from_values(vals: &[f64]) -> Result<Self> {
        let mut acc = Accumulator::new();
        let mut n_positive = 0;
        for &val in vals {
            acc.add(val);
            if val > 0.0 {
                n_positive += 1;
            }
        }
        let report = acc.report().ok_or(Error::EmptyPopulation)?;

        Ok(Self {
            mean_final: report.mean,
            std_final: report.std_dev,
            positive_ratio: n_positive as f64 / acc.n_vals() as f64,
        })
    }

    /// Compute the metrics of the final row of `matrix`.
    pub fn from_matrix(matrix: &TrajectoryMatrix) -> Result<Self> {
        if matrix.is_empty() {
            return Err(Error::EmptyPopulation);
        }
        let final_row = matrix.final_row().ok_or(Error::EmptyPopulation)?;
        Self::from_values(final_row)
    }
}

/// Final-value metrics of both groups.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct Metrics {
    pub theory_aware: GroupMetrics,
    pub control: GroupMetrics,
}

impl Metrics {
    pub fn group(&self, group: Group) -> &GroupMetrics {
        match group {
            Group::TheoryAware => &self.theory_aware,
            Group::Control => &self.control,
        }
    }

    /// Mean final value of the theory-aware group minus that of the control group.
    pub fn mean_difference(&self) -> f64 {
        self.theory_aware.mean_final - self.control.mean_final
    }
}

/// Compute [`GroupMetrics`] for both groups of a completed run.
///
/// # Errors
/// Returns [`Error::EmptyPopulation`] if either matrix has no agents or no timesteps.
pub fn compute_metrics(trajectories: &Trajectories) -> Result<Metrics> {
    Ok(Metrics {
        theory_aware: GroupMetrics::from_matrix(&trajectories.theory_aware)?,
        control: GroupMetrics::from_matrix(&trajectories.control)?,
    })
}

/// Equal-width histogram over a fixed range.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn new(min: f64, max: f64, n_bins: usize) -> Self {
        Self {
            min,
            max,
            counts: vec![0; n_bins],
        }
    }

    pub fn add(&mut self, val: f64) {
        let n_bins = self.counts.len();
        if n_bins == 0 || !(self.min..=self.max).contains(&val) {
            return;
        }
        let width = self.max - self.min;
        let i_bin = if width > 0.0 {
            (((val - self.min) / width * n_bins as f64) as usize).min(n_bins - 1)
        } else {
            0
        };
        self.counts[i_bin] += 1;
    }
}
