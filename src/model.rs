//! Simulation data types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Experimental condition an agent belongs to.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    TheoryAware,
    Control,
}

impl Group {
    pub const ALL: [Group; 2] = [Group::TheoryAware, Group::Control];
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::TheoryAware => write!(f, "theory_aware"),
            Group::Control => write!(f, "control"),
        }
    }
}

/// State of a single agent at a given step.
///
/// Emotional state and perspective are only changed by the engine's update
/// rule and teaching pass, hence the read-only accessors.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct AgentState {
    pub(crate) group: Group,
    pub(crate) value: f64,
    pub(crate) emotion: f64,
    pub(crate) perspective: f64,
    pub(crate) understanding: f64,
    pub(crate) application: f64,
}

impl AgentState {
    /// Create an agent at the start of a run.
    ///
    /// Control agents always start without theory understanding or application.
    pub fn new(group: Group, emotion: f64, understanding: f64, application: f64) -> Self {
        let (understanding, application) = match group {
            Group::TheoryAware => (understanding, application),
            Group::Control => (0.0, 0.0),
        };
        Self {
            group,
            value: 0.0,
            emotion: emotion.clamp(-1.0, 1.0),
            perspective: 0.0,
            understanding,
            application,
        }
    }

    pub fn group(&self) -> Group {
        self.group
    }

    /// Cumulative value of all decisions taken so far.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Emotional state, bounded to `[-1, 1]`.
    pub fn emotion(&self) -> f64 {
        self.emotion
    }

    pub fn perspective(&self) -> f64 {
        self.perspective
    }

    pub fn understanding(&self) -> f64 {
        self.understanding
    }

    pub fn application(&self) -> f64 {
        self.application
    }

    /// Weight of the rational signal in the decision blend, always in `[0, 1]`.
    pub fn theory_weight(&self) -> f64 {
        self.understanding.clamp(0.0, 1.0) * self.application.clamp(0.0, 1.0)
    }
}

/// Cumulative values of one group, indexed by timestep then agent.
///
/// Every row holds exactly `n_agents` values; deserialization rejects ragged rows.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RawTrajectoryMatrix")]
pub struct TrajectoryMatrix {
    n_agents: usize,
    rows: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct RawTrajectoryMatrix {
    n_agents: usize,
    rows: Vec<Vec<f64>>,
}

impl TryFrom<RawTrajectoryMatrix> for TrajectoryMatrix {
    type Error = String;

    fn try_from(raw: RawTrajectoryMatrix) -> Result<Self, Self::Error> {
        let n_agents = raw.n_agents;
        if let Some((i_row, row)) = raw
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != n_agents)
        {
            return Err(format!(
                "row {i_row} must hold {n_agents} values, but holds {}",
                row.len()
            ));
        }
        Ok(Self {
            n_agents,
            rows: raw.rows,
        })
    }
}

impl TrajectoryMatrix {
    pub fn new(n_agents: usize, n_timesteps: usize) -> Self {
        Self {
            n_agents,
            rows: Vec::with_capacity(n_timesteps),
        }
    }

    /// Build a matrix from complete rows; every row must hold the same number of agents.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Option<Self> {
        let n_agents = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != n_agents) {
            return None;
        }
        Some(Self { n_agents, rows })
    }

    pub(crate) fn push_row<I: IntoIterator<Item = f64>>(&mut self, row: I) {
        let row: Vec<f64> = row.into_iter().collect();
        debug_assert_eq!(row.len(), self.n_agents);
        self.rows.push(row);
    }

    pub fn n_agents(&self) -> usize {
        self.n_agents
    }

    pub fn n_timesteps(&self) -> usize {
        self.rows.len()
    }

    /// True if the matrix holds no agents or no timesteps.
    pub fn is_empty(&self) -> bool {
        self.n_agents == 0 || self.rows.is_empty()
    }

    pub fn row(&self, timestep: usize) -> Option<&[f64]> {
        self.rows.get(timestep).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Values of the last recorded timestep.
    pub fn final_row(&self) -> Option<&[f64]> {
        self.rows.last().map(Vec::as_slice)
    }

    /// Trajectory of a single agent across all timesteps.
    pub fn column(&self, agent: usize) -> Option<Vec<f64>> {
        if agent >= self.n_agents {
            return None;
        }
        self.rows.iter().map(|row| row.get(agent).copied()).collect()
    }
}

/// Trajectory matrices of both groups produced by one run.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Trajectories {
    /// Seed the run's random source was initialized with.
    pub seed: u64,
    pub theory_aware: TrajectoryMatrix,
    pub control: TrajectoryMatrix,
}

impl Trajectories {
    pub fn group(&self, group: Group) -> &TrajectoryMatrix {
        match group {
            Group::TheoryAware => &self.theory_aware,
            Group::Control => &self.control,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_accessors_follow_row_layout() {
        let matrix = TrajectoryMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();

        assert_eq!(matrix.row(0), Some(&[1.0, 2.0][..]));
        assert_eq!(matrix.row(2), None);
        assert_eq!(matrix.column(1), Some(vec![2.0, 4.0]));
        assert_eq!(matrix.column(2), None);
        assert_eq!(matrix.final_row(), Some(&[3.0, 4.0][..]));
    }

    #[test]
    fn from_rows_rejects_ragged_rows() {
        assert!(TrajectoryMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).is_none());
    }

    #[test]
    fn deserialization_rejects_ragged_rows() {
        let result: serde_json::Result<TrajectoryMatrix> =
            serde_json::from_str(r#"{"n_agents":3,"rows":[[1.0,2.0,3.0],[1.0]]}"#);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("row 1 must hold 3 values"), "{err}");

        let result: serde_json::Result<TrajectoryMatrix> =
            serde_json::from_str(r#"{"n_agents":2,"rows":[[1.0,2.0],[3.0,4.0]]}"#);
        assert_eq!(result.unwrap().column(1), Some(vec![2.0, 4.0]));
    }

    #[test]
    fn serialized_matrix_reads_back_unchanged() {
        let mut matrix = TrajectoryMatrix::new(2, 1);
        matrix.push_row([0.5, -0.5]);

        let bytes = rmp_serde::to_vec(&matrix).unwrap();
        let read: TrajectoryMatrix = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(read, matrix);
    }
}
