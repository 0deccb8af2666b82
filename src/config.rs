use crate::error::{Error, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Largest change a single teaching event may apply to any parameter.
pub const MAX_TEACHING_INCREMENT: f64 = 0.05;

/// Who a theory-aware agent teaches when a teaching event fires.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeachingPolicy {
    /// Nudge a random control agent's understanding and application upward.
    CrossGroup,
    /// Boost the perspective of another random theory-aware agent.
    WithinGroup,
}

/// Tunable constants of the agent update rule and the teaching pass.
///
/// The defaults form the conservative parameter set: small noise, small
/// teaching increments, slow perspective growth.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelParams {
    /// Standard deviation of the decision noise for a calm agent without perspective.
    pub noise_std: f64,
    /// How much the absolute emotional state widens the decision noise.
    pub emotional_impact: f64,
    /// How strongly the noise draw perturbs the emotional state.
    pub emotional_sensitivity: f64,
    /// Per-step decay rate of the emotional state toward zero (before the understanding bonus).
    pub emotion_decay: f64,
    /// Standard deviation of the initial emotional state.
    pub initial_emotion_std: f64,
    /// How strongly perspective reduces the noise variance.
    pub perspective_damping: f64,
    /// Perspective gained per step at full theory application.
    pub perspective_gain: f64,
    /// Weight of perspective in the rational signal.
    pub perspective_strength: f64,
    /// Constant part of the rational signal.
    pub rational_drift: f64,
    /// Absolute bound of a single decision value.
    pub decision_bound: f64,

    /// Teaching only succeeds on targets whose absolute emotional state is below this.
    pub receptiveness_threshold: f64,
    /// Understanding transferred per cross-group teaching event.
    pub understanding_increment: f64,
    /// Application transferred per cross-group teaching event.
    pub application_increment: f64,
    /// Perspective transferred per within-group teaching event.
    pub perspective_boost: f64,
    pub teaching_policy: TeachingPolicy,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            noise_std: 0.05,
            emotional_impact: 0.1,
            emotional_sensitivity: 0.1,
            emotion_decay: 0.1,
            initial_emotion_std: 0.2,
            perspective_damping: 1.0,
            perspective_gain: 0.01,
            perspective_strength: 0.01,
            rational_drift: 0.005,
            decision_bound: 1.0,
            receptiveness_threshold: 0.3,
            understanding_increment: 0.05,
            application_increment: 0.03,
            perspective_boost: 0.05,
            teaching_policy: TeachingPolicy::CrossGroup,
        }
    }
}

impl ModelParams {
    fn validate(&self) -> Result<()> {
        check_real("noise_std", self.noise_std, 0.0..)?;
        check_real("emotional_impact", self.emotional_impact, 0.0..)?;
        check_real("emotional_sensitivity", self.emotional_sensitivity, 0.0..)?;
        check_real("emotion_decay", self.emotion_decay, 0.0..=1.0)?;
        check_real("initial_emotion_std", self.initial_emotion_std, 0.0..)?;
        check_real("perspective_damping", self.perspective_damping, 0.0..)?;
        check_real("perspective_gain", self.perspective_gain, 0.0..)?;
        check_real("perspective_strength", self.perspective_strength, 0.0..)?;
        check_real("rational_drift", self.rational_drift, ..)?;
        check_real("decision_bound", self.decision_bound, f64::MIN_POSITIVE..)?;

        check_real("receptiveness_threshold", self.receptiveness_threshold, 0.0..)?;
        let increments = 0.0..=MAX_TEACHING_INCREMENT;
        check_real("understanding_increment", self.understanding_increment, increments.clone())?;
        check_real("application_increment", self.application_increment, increments.clone())?;
        check_real("perspective_boost", self.perspective_boost, increments)?;

        Ok(())
    }
}

/// Immutable configuration of one simulation run.
///
/// Built with [`configure`] or [`SimulationConfig::from_file`]; all values are
/// validated once at construction.
#[derive(Debug, PartialEq, Clone)]
pub struct SimulationConfig {
    n_individuals: usize,
    n_timesteps: usize,
    theory_understanding: f64,
    theory_application: f64,
    teaching_probability: f64,
    seed: Option<u64>,
    model: ModelParams,
}

/// Build a [`SimulationConfig`] with the default (conservative) model parameters.
///
/// Counts are signed so that negative values coming from user input are
/// reported as [`Error::InvalidConfig`]. Understanding, application and
/// teaching probability outside `[0, 1]` are accepted and clamped where they
/// are used; only non-finite values are rejected.
pub fn configure(
    n_individuals: i64,
    n_timesteps: i64,
    theory_understanding: f64,
    theory_application: f64,
    teaching_probability: f64,
    seed: Option<u64>,
) -> Result<SimulationConfig> {
    let n_individuals = check_count("n_individuals", n_individuals)?;
    let n_timesteps = check_count("n_timesteps", n_timesteps)?;
    check_real("theory_understanding", theory_understanding, ..)?;
    check_real("theory_application", theory_application, ..)?;
    check_real("teaching_probability", teaching_probability, ..)?;

    Ok(SimulationConfig {
        n_individuals,
        n_timesteps,
        theory_understanding,
        theory_application,
        teaching_probability,
        seed,
        model: ModelParams::default(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    simulation: SimulationTable,
    #[serde(default)]
    model: ModelParams,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SimulationTable {
    n_individuals: i64,
    n_timesteps: i64,
    theory_understanding: f64,
    theory_application: f64,
    teaching_probability: f64,
    seed: Option<u64>,
}

impl SimulationConfig {
    /// Load a [`SimulationConfig`] from a TOML file.
    ///
    /// The file must contain a `[simulation]` table and may contain a `[model]`
    /// table overriding any of the [`ModelParams`] defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> anyhow::Result<Self> {
        let file = file.as_ref();
        let contents = fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`SimulationConfig`] from TOML text.
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let file: ConfigFile = toml::from_str(contents).context("failed to deserialize config")?;

        let sim = file.simulation;
        let cfg = configure(
            sim.n_individuals,
            sim.n_timesteps,
            sim.theory_understanding,
            sim.theory_application,
            sim.teaching_probability,
            sim.seed,
        )
        .context("failed to validate simulation table")?
        .with_model(file.model)
        .context("failed to validate model table")?;

        Ok(cfg)
    }

    /// Replace the model parameters, validating them first.
    pub fn with_model(mut self, model: ModelParams) -> Result<Self> {
        model.validate()?;
        self.model = model;
        Ok(self)
    }

    /// Number of individuals in each group.
    pub fn n_individuals(&self) -> usize {
        self.n_individuals
    }

    pub fn n_timesteps(&self) -> usize {
        self.n_timesteps
    }

    /// Theory understanding of theory-aware agents, as configured (unclamped).
    pub fn theory_understanding(&self) -> f64 {
        self.theory_understanding
    }

    /// Theory application of theory-aware agents, as configured (unclamped).
    pub fn theory_application(&self) -> f64 {
        self.theory_application
    }

    /// Base teaching probability, as configured (unclamped).
    pub fn teaching_probability(&self) -> f64 {
        self.teaching_probability
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn model(&self) -> &ModelParams {
        &self.model
    }
}

fn check_num<T, R>(name: &str, num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        return Err(Error::InvalidConfig(format!(
            "{name} must be in the range {range:?}, but is {num:?}"
        )));
    }
    Ok(())
}

fn check_real<R>(name: &str, num: f64, range: R) -> Result<()>
where
    R: RangeBounds<f64> + Debug,
{
    if !num.is_finite() {
        return Err(Error::InvalidConfig(format!(
            "{name} must be finite, but is {num:?}"
        )));
    }
    check_num(name, num, range)
}

fn check_count(name: &str, num: i64) -> Result<usize> {
    check_num(name, num, 0..)?;
    usize::try_from(num)
        .map_err(|_| Error::InvalidConfig(format!("{name} does not fit in memory: {num}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_accepts_zero_counts() {
        let cfg = configure(0, 0, 0.3, 0.3, 0.1, None).unwrap();
        assert_eq!(cfg.n_individuals(), 0);
        assert_eq!(cfg.n_timesteps(), 0);
    }

    #[test]
    fn configure_rejects_negative_counts() {
        let err = configure(-1, 10, 0.3, 0.3, 0.1, None).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("n_individuals")));

        let err = configure(10, -5, 0.3, 0.3, 0.1, None).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("n_timesteps")));
    }

    #[test]
    fn configure_keeps_out_of_range_levels() {
        let cfg = configure(10, 10, 1.7, -0.4, 3.0, Some(1)).unwrap();
        assert_eq!(cfg.theory_understanding(), 1.7);
        assert_eq!(cfg.theory_application(), -0.4);
        assert_eq!(cfg.teaching_probability(), 3.0);
    }

    #[test]
    fn configure_rejects_non_finite_levels() {
        assert!(configure(10, 10, f64::NAN, 0.3, 0.1, None).is_err());
        assert!(configure(10, 10, 0.3, f64::INFINITY, 0.1, None).is_err());
    }

    #[test]
    fn model_rejects_large_teaching_increments() {
        let model = ModelParams {
            understanding_increment: 0.2,
            ..ModelParams::default()
        };
        let err = configure(10, 10, 0.3, 0.3, 0.1, None)
            .unwrap()
            .with_model(model)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("understanding_increment")));
    }

    #[test]
    fn from_toml_reads_both_tables() {
        let cfg = SimulationConfig::from_toml(
            r#"
[simulation]
n_individuals = 100
n_timesteps = 50
theory_understanding = 0.3
theory_application = 0.3
teaching_probability = 0.1
seed = 42

[model]
noise_std = 0.5
teaching_policy = "within_group"
"#,
        )
        .unwrap();

        assert_eq!(cfg.n_individuals(), 100);
        assert_eq!(cfg.seed(), Some(42));
        assert_eq!(cfg.model().noise_std, 0.5);
        assert_eq!(cfg.model().teaching_policy, TeachingPolicy::WithinGroup);
        assert_eq!(cfg.model().emotion_decay, ModelParams::default().emotion_decay);
    }

    #[test]
    fn from_toml_rejects_fractional_counts() {
        let result = SimulationConfig::from_toml(
            r#"
[simulation]
n_individuals = 10.5
n_timesteps = 50
theory_understanding = 0.3
theory_application = 0.3
teaching_probability = 0.1
"#,
        );
        assert!(result.is_err());
    }
}
