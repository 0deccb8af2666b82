//! Stochastic simulation of a theory-aware population against a control population.
//!
//! Each agent accumulates the value of one decision per timestep. Theory-aware
//! agents blend their noisy decisions with a rational signal, regulate their
//! emotional state faster, build up perspective that damps their noise, and may
//! teach other agents. Control agents follow the raw noise.
//!
//! ```
//! use theory_sim::{compute_metrics, configure, run};
//!
//! let cfg = configure(100, 50, 0.3, 0.3, 0.1, Some(42)).unwrap();
//! let trajectories = run(&cfg);
//! let metrics = compute_metrics(&trajectories).unwrap();
//! assert!((0.0..=1.0).contains(&metrics.control.positive_ratio));
//! ```

pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod manager;
pub mod model;
pub mod stats;

pub use config::{ModelParams, SimulationConfig, TeachingPolicy, configure};
pub use engine::{Engine, advance, run};
pub use error::{Error, Result};
pub use model::{AgentState, Group, Trajectories, TrajectoryMatrix};
pub use stats::{GroupMetrics, Metrics, compute_metrics};
