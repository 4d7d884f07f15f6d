use crate::core::sampling::Distribution;
use serde::{Deserialize, Serialize};

/// Parameters of one product type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductProfile {
    #[serde(default)]
    pub name: String,
    /// Processing time per unit of quantity
    pub unit_process_time: Distribution,
    /// Profit earned per unit of quantity
    pub unit_profit: f64,
    /// Order quantity distribution, indexed by customer type
    pub quantity_by_customer: Vec<Distribution>,
}

impl ProductProfile {
    pub fn new(unit_process_time: Distribution, unit_profit: f64) -> Self {
        Self {
            name: String::new(),
            unit_process_time,
            unit_profit,
            quantity_by_customer: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append the quantity distribution for the next customer type
    pub fn with_quantity(mut self, quantity: Distribution) -> Self {
        self.quantity_by_customer.push(quantity);
        self
    }

    /// Expected processing time of a single unit
    pub fn expected_unit_process_time(&self) -> f64 {
        self.unit_process_time.mean()
    }
}

/// Parameters of one customer type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    #[serde(default)]
    pub name: String,
    /// Probability that an order is kept; `1 - reliability` is the withdrawal chance
    pub reliability: f64,
    /// How fast acceptance drops with quoted lead time
    pub rejection_sensitivity: f64,
    /// Multiplier applied to the economic weight of each order
    pub weight_factor: Distribution,
    /// Delay between arrival and a spontaneous withdrawal
    pub cancellation_delay: Distribution,
}

impl CustomerProfile {
    pub fn new(
        reliability: f64,
        rejection_sensitivity: f64,
        weight_factor: Distribution,
        cancellation_delay: Distribution,
    ) -> Self {
        Self {
            name: String::new(),
            reliability,
            rejection_sensitivity,
            weight_factor,
            cancellation_delay,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Probability that an order of this customer is withdrawn before service
    pub fn withdrawal_probability(&self) -> f64 {
        (1.0 - self.reliability).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_withdrawal_probability() {
        let customer = CustomerProfile::new(
            0.97,
            0.0,
            Distribution::constant(1.0),
            Distribution::constant(1.0),
        );
        assert!((customer.withdrawal_probability() - 0.03).abs() < 1e-12);
    }
}
