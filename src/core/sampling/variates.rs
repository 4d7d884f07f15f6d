use super::{Distribution, SamplingError};
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Bernoulli, Distribution as _, Exp, Normal};
use serde::{Deserialize, Serialize};

/// Source of random variates.
///
/// The simulation core only asks for "a draw from this distribution"; how
/// the draw is produced is up to the implementation.
pub trait VariateSource: std::fmt::Debug {
    /// Draw one value from `distribution`
    fn sample(&mut self, distribution: &Distribution) -> Result<f64, SamplingError>;

    /// Draw an index with probability proportional to `weights`
    fn sample_index(&mut self, weights: &[f64]) -> Result<usize, SamplingError>;

    /// Draw a Bernoulli outcome
    fn chance(&mut self, p: f64) -> Result<bool, SamplingError> {
        Ok(self.sample(&Distribution::bernoulli(p))? >= 0.5)
    }
}

/// How variates are produced for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariateMode {
    /// Seeded pseudo-random draws
    #[default]
    Random,
    /// Every draw returns its expected value; useful for deterministic runs
    Expected,
}

impl VariateMode {
    /// Build the variate source for one replication
    pub fn source(&self, seed: u64) -> Box<dyn VariateSource + Send> {
        match self {
            VariateMode::Random => Box::new(RandomVariates::seed_from_u64(seed)),
            VariateMode::Expected => Box::new(ExpectedVariates),
        }
    }
}

/// Pseudo-random variates backed by a seeded [`StdRng`]
#[derive(Debug, Clone)]
pub struct RandomVariates {
    rng: StdRng,
}

impl RandomVariates {
    pub fn seed_from_u64(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl VariateSource for RandomVariates {
    fn sample(&mut self, distribution: &Distribution) -> Result<f64, SamplingError> {
        let invalid = |reason: String| SamplingError::InvalidParameters {
            family: distribution.family(),
            reason,
        };

        let value = match *distribution {
            Distribution::Constant { value } => value,
            Distribution::Uniform { low, high } => {
                if high > low {
                    self.rng.gen_range(low..high)
                } else {
                    low
                }
            }
            Distribution::Exponential { location, scale } => {
                if scale == 0.0 {
                    location
                } else {
                    let exp = Exp::new(1.0 / scale).map_err(|e| invalid(e.to_string()))?;
                    location + exp.sample(&mut self.rng)
                }
            }
            Distribution::Normal { mean, std_dev } => Normal::new(mean, std_dev)
                .map_err(|e| invalid(e.to_string()))?
                .sample(&mut self.rng),
            Distribution::Bernoulli { p } => {
                let bernoulli = Bernoulli::new(p).map_err(|e| invalid(e.to_string()))?;
                if bernoulli.sample(&mut self.rng) {
                    1.0
                } else {
                    0.0
                }
            }
        };
        Ok(value)
    }

    fn sample_index(&mut self, weights: &[f64]) -> Result<usize, SamplingError> {
        if weights.is_empty() {
            return Err(SamplingError::EmptyWeights);
        }
        let index = WeightedIndex::new(weights)
            .map_err(|e| SamplingError::InvalidParameters {
                family: "categorical",
                reason: e.to_string(),
            })?
            .sample(&mut self.rng);
        Ok(index)
    }
}

/// Returns expected values instead of random draws.
///
/// Bernoulli draws resolve to their most likely outcome (`p >= 0.5`) and
/// categorical draws to the heaviest weight.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpectedVariates;

impl VariateSource for ExpectedVariates {
    fn sample(&mut self, distribution: &Distribution) -> Result<f64, SamplingError> {
        distribution.validate()?;
        Ok(match *distribution {
            Distribution::Bernoulli { p } => {
                if p >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            _ => distribution.mean(),
        })
    }

    fn sample_index(&mut self, weights: &[f64]) -> Result<usize, SamplingError> {
        weights
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, &w)| match best {
                Some((_, best_w)) if best_w >= w => best,
                _ => Some((i, w)),
            })
            .map(|(i, _)| i)
            .ok_or(SamplingError::EmptyWeights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_draws() {
        let mut a = RandomVariates::seed_from_u64(7);
        let mut b = RandomVariates::seed_from_u64(7);
        let dist = Distribution::exponential(9.0, 1.0);
        for _ in 0..20 {
            assert_eq!(a.sample(&dist).unwrap(), b.sample(&dist).unwrap());
        }
    }

    #[test]
    fn test_shifted_exponential_respects_location() {
        let mut source = RandomVariates::seed_from_u64(1);
        let dist = Distribution::exponential(5.0, 1.0);
        let draws: Vec<f64> = (0..2000).map(|_| source.sample(&dist).unwrap()).collect();
        assert!(draws.iter().all(|&x| x >= 5.0));
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        assert!((mean - 6.0).abs() < 0.1, "mean was {}", mean);
    }

    #[test]
    fn test_uniform_stays_in_bounds() {
        let mut source = RandomVariates::seed_from_u64(3);
        let dist = Distribution::uniform(0.4, 0.6);
        for _ in 0..500 {
            let x = source.sample(&dist).unwrap();
            assert!((0.4..0.6).contains(&x));
        }
    }

    #[test]
    fn test_weighted_index_follows_weights() {
        let mut source = RandomVariates::seed_from_u64(11);
        let mut counts = [0usize; 3];
        for _ in 0..10_000 {
            counts[source.sample_index(&[0.2, 0.3, 0.5]).unwrap()] += 1;
        }
        assert!((counts[2] as f64 / 10_000.0 - 0.5).abs() < 0.03);
        assert!((counts[0] as f64 / 10_000.0 - 0.2).abs() < 0.03);
    }

    #[test]
    fn test_invalid_normal_is_reported() {
        let mut source = RandomVariates::seed_from_u64(0);
        assert!(source.sample(&Distribution::normal(0.0, -1.0)).is_err());
        assert!(source.sample_index(&[]).is_err());
    }

    #[test]
    fn test_expected_variates() {
        let mut source = ExpectedVariates;
        assert_eq!(source.sample(&Distribution::uniform(1.0, 3.0)).unwrap(), 2.0);
        assert!(source.chance(0.5).unwrap());
        assert!(!source.chance(0.03).unwrap());
        assert_eq!(source.sample_index(&[0.2, 0.5, 0.3]).unwrap(), 1);
        assert_eq!(source.sample_index(&[0.6, 0.4]).unwrap(), 0);
    }
}
