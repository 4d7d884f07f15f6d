use super::SamplingError;
use serde::{Deserialize, Serialize};

/// A distribution family together with its parameters.
///
/// The core never draws from these itself; it hands them to a
/// [`super::VariateSource`] and only relies on [`Distribution::mean`] for
/// expected values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Distribution {
    /// Always the same value
    Constant { value: f64 },
    /// Uniform on `[low, high)`
    Uniform { low: f64, high: f64 },
    /// Exponential with the given scale, shifted right by `location`
    Exponential { location: f64, scale: f64 },
    /// Gaussian
    Normal { mean: f64, std_dev: f64 },
    /// 1.0 with probability `p`, 0.0 otherwise
    Bernoulli { p: f64 },
}

impl Distribution {
    pub fn constant(value: f64) -> Self {
        Distribution::Constant { value }
    }

    pub fn uniform(low: f64, high: f64) -> Self {
        Distribution::Uniform { low, high }
    }

    pub fn exponential(location: f64, scale: f64) -> Self {
        Distribution::Exponential { location, scale }
    }

    pub fn normal(mean: f64, std_dev: f64) -> Self {
        Distribution::Normal { mean, std_dev }
    }

    pub fn bernoulli(p: f64) -> Self {
        Distribution::Bernoulli { p }
    }

    /// Family name used in error messages and logs
    pub fn family(&self) -> &'static str {
        match self {
            Distribution::Constant { .. } => "constant",
            Distribution::Uniform { .. } => "uniform",
            Distribution::Exponential { .. } => "exponential",
            Distribution::Normal { .. } => "normal",
            Distribution::Bernoulli { .. } => "bernoulli",
        }
    }

    /// Expected value of a draw
    pub fn mean(&self) -> f64 {
        match *self {
            Distribution::Constant { value } => value,
            Distribution::Uniform { low, high } => low + (high - low) / 2.0,
            Distribution::Exponential { location, scale } => location + scale,
            Distribution::Normal { mean, .. } => mean,
            Distribution::Bernoulli { p } => p,
        }
    }

    /// Whether every draw is greater than zero
    pub fn is_positive(&self) -> bool {
        match *self {
            Distribution::Constant { value } => value > 0.0,
            Distribution::Uniform { low, .. } => low > 0.0,
            Distribution::Exponential { location, scale } => {
                location > 0.0 || (location == 0.0 && scale > 0.0)
            }
            Distribution::Normal { mean, std_dev } => std_dev == 0.0 && mean > 0.0,
            Distribution::Bernoulli { p } => p == 1.0,
        }
    }

    /// Check the parameters describe a proper distribution
    pub fn validate(&self) -> Result<(), SamplingError> {
        let invalid = |reason: &str| SamplingError::InvalidParameters {
            family: self.family(),
            reason: reason.to_string(),
        };

        match *self {
            Distribution::Constant { value } if !value.is_finite() => {
                Err(invalid("value must be finite"))
            }
            Distribution::Uniform { low, high } if !(low.is_finite() && high.is_finite()) => {
                Err(invalid("bounds must be finite"))
            }
            Distribution::Uniform { low, high } if high < low => {
                Err(invalid("high must not be below low"))
            }
            Distribution::Exponential { location, scale }
                if !(location.is_finite() && scale.is_finite()) || scale < 0.0 =>
            {
                Err(invalid("location must be finite and scale non-negative"))
            }
            Distribution::Normal { mean, std_dev }
                if !(mean.is_finite() && std_dev.is_finite()) || std_dev < 0.0 =>
            {
                Err(invalid("mean must be finite and std_dev non-negative"))
            }
            Distribution::Bernoulli { p } if !(0.0..=1.0).contains(&p) => {
                Err(invalid("p must lie in [0, 1]"))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_means() {
        assert_eq!(Distribution::constant(2.5).mean(), 2.5);
        assert_eq!(Distribution::uniform(0.4, 0.6).mean(), 0.5);
        assert_eq!(Distribution::exponential(9.0, 1.0).mean(), 10.0);
        assert_eq!(Distribution::normal(11.0, 1.2).mean(), 11.0);
        assert_eq!(Distribution::bernoulli(0.3).mean(), 0.3);
    }

    #[test]
    fn test_validation() {
        assert!(Distribution::uniform(1.0, 0.5).validate().is_err());
        assert!(Distribution::normal(1.0, -0.1).validate().is_err());
        assert!(Distribution::bernoulli(1.5).validate().is_err());
        assert!(Distribution::exponential(0.0, f64::NAN).validate().is_err());
        assert!(Distribution::uniform(0.5, 0.5).validate().is_ok());
    }

    #[test]
    fn test_positive_support() {
        assert!(Distribution::uniform(0.4, 0.6).is_positive());
        assert!(Distribution::exponential(0.0, 2.0).is_positive());
        assert!(Distribution::normal(3.0, 0.0).is_positive());
        assert!(!Distribution::uniform(0.0, 0.6).is_positive());
        assert!(!Distribution::constant(0.0).is_positive());
        assert!(!Distribution::normal(0.5, 0.3).is_positive());
        assert!(!Distribution::bernoulli(0.9).is_positive());
    }

    #[test]
    fn test_deserialize_tagged_family() {
        let parsed: Distribution =
            toml::from_str("family = \"exponential\"\nlocation = 5.0\nscale = 1.0").unwrap();
        assert_eq!(parsed, Distribution::exponential(5.0, 1.0));
    }
}
