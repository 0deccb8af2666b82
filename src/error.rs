use thiserror::Error;

/// Errors reported by the simulation core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A configuration value was rejected at construction time.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Metrics were requested on a trajectory matrix without agents or timesteps.
    #[error("cannot compute metrics of an empty population")]
    EmptyPopulation,
}

pub type Result<T> = std::result::Result<T, Error>;
