pub mod distribution;
pub mod variates;

pub use distribution::Distribution;
pub use variates::{ExpectedVariates, RandomVariates, VariateMode, VariateSource};

/// Errors raised while drawing variates
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SamplingError {
    #[error("invalid {family} parameters: {reason}")]
    InvalidParameters { family: &'static str, reason: String },

    #[error("cannot choose from an empty set of weights")]
    EmptyWeights,
}
