//! Configuration for duequote simulation runs
//!
//! This module provides the typed run configuration: the order stream, the
//! product and customer tables, the scheduling and quoting policies, and the
//! settings that control how replications are executed.

use crate::core::due_date::DueDatePolicyConfig;
use crate::core::entities::{CustomerProfile, ProductProfile};
use crate::core::sampling::{Distribution, VariateMode};
use crate::core::scheduling::{DispatchingRule, OptimizationConfig};
use crate::core::types::SimTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors raised while loading or validating a configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Enumeration of supported concurrency modes for replications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    /// Replications run one after another on the calling thread
    Sequential,
    /// Replications run in parallel on a Rayon pool
    #[default]
    Rayon,
}

/// Configuration of a simulation study
///
/// Every field has a default, so a TOML file only needs to name what it
/// changes. Product and customer types are identified by their position in
/// `products` and `customers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of orders generated per run
    pub order_count: Option<usize>,
    /// No order arrives after this instant
    pub horizon: Option<SimTime>,
    /// Time between consecutive arrivals
    pub interarrival: Distribution,
    /// Relative frequency of each product type
    pub product_mix: Vec<f64>,
    /// Relative frequency of each customer type
    pub customer_mix: Vec<f64>,
    pub products: Vec<ProductProfile>,
    pub customers: Vec<CustomerProfile>,
    pub dispatching_rule: DispatchingRule,
    pub due_date_policy: DueDatePolicyConfig,
    /// Required by the optimization dispatching rule
    pub optimization: Option<OptimizationConfig>,
    /// Share of the run trimmed from each end before computing statistics
    pub warmup_fraction: f64,
    pub replications: usize,
    /// Seed of the first replication; replication `i` uses `seed + i`
    pub seed: u64,
    pub variate_mode: VariateMode,
    pub concurrency_mode: ConcurrencyMode,
    /// Size of a dedicated thread pool, only used in Rayon mode
    pub thread_pool_size: Option<usize>,
}

impl SimulationConfig {
    /// Create a configuration with the reference parameterization
    pub fn new() -> Self {
        let products = vec![
            ProductProfile::new(Distribution::uniform(0.4, 0.6), 3.0)
                .with_name("P1")
                .with_quantity(Distribution::normal(33.0, 1.4))
                .with_quantity(Distribution::normal(36.0, 1.9)),
            ProductProfile::new(Distribution::uniform(0.3, 0.4), 2.5)
                .with_name("P2")
                .with_quantity(Distribution::normal(20.0, 2.8))
                .with_quantity(Distribution::normal(21.0, 2.2)),
            ProductProfile::new(Distribution::uniform(0.7, 1.1), 1.8)
                .with_name("P3")
                .with_quantity(Distribution::normal(9.0, 4.5))
                .with_quantity(Distribution::normal(12.0, 0.9)),
        ];
        let customers = vec![
            CustomerProfile::new(
                0.97,
                0.001,
                Distribution::normal(11.0, 1.2),
                Distribution::exponential(5.0, 1.0),
            )
            .with_name("C1"),
            CustomerProfile::new(
                0.9,
                0.002,
                Distribution::normal(20.0, 3.3),
                Distribution::exponential(7.0, 1.0),
            )
            .with_name("C2"),
        ];

        Self {
            order_count: Some(1000),
            horizon: None,
            interarrival: Distribution::exponential(9.0, 1.0),
            product_mix: vec![0.2, 0.3, 0.5],
            customer_mix: vec![0.6, 0.4],
            products,
            customers,
            dispatching_rule: DispatchingRule::default(),
            due_date_policy: DueDatePolicyConfig::default(),
            optimization: None,
            warmup_fraction: 0.1,
            replications: 1,
            seed: 0,
            variate_mode: VariateMode::default(),
            concurrency_mode: ConcurrencyMode::default(),
            thread_pool_size: None,
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn with_order_count(mut self, count: usize) -> Self {
        self.order_count = Some(count);
        self
    }

    /// Stop generating arrivals at `horizon`
    pub fn with_horizon(mut self, horizon: SimTime) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn with_interarrival(mut self, interarrival: Distribution) -> Self {
        self.interarrival = interarrival;
        self
    }

    /// Replace the product table and its mix
    ///
    /// # Arguments
    /// * `products` - One profile per product type
    /// * `mix` - Relative frequency of each product type
    pub fn with_products(mut self, products: Vec<ProductProfile>, mix: Vec<f64>) -> Self {
        self.products = products;
        self.product_mix = mix;
        self
    }

    /// Replace the customer table and its mix
    ///
    /// # Arguments
    /// * `customers` - One profile per customer type
    /// * `mix` - Relative frequency of each customer type
    ///
    /// # Note
    /// Every product needs one quantity distribution per customer type.
    pub fn with_customers(mut self, customers: Vec<CustomerProfile>, mix: Vec<f64>) -> Self {
        self.customers = customers;
        self.customer_mix = mix;
        self
    }

    pub fn with_dispatching_rule(mut self, rule: DispatchingRule) -> Self {
        self.dispatching_rule = rule;
        self
    }

    pub fn with_due_date_policy(mut self, policy: DueDatePolicyConfig) -> Self {
        self.due_date_policy = policy;
        self
    }

    pub fn with_optimization(mut self, optimization: OptimizationConfig) -> Self {
        self.optimization = Some(optimization);
        self
    }

    pub fn with_warmup_fraction(mut self, fraction: f64) -> Self {
        self.warmup_fraction = fraction;
        self
    }

    pub fn with_replications(mut self, replications: usize) -> Self {
        self.replications = replications;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_variate_mode(mut self, mode: VariateMode) -> Self {
        self.variate_mode = mode;
        self
    }

    /// Set the concurrency mode used for replications
    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency_mode = mode;
        self
    }

    /// Set the thread pool size for parallel replications
    ///
    /// # Note
    /// This setting only affects execution when concurrency_mode is Rayon
    pub fn with_thread_pool_size(mut self, size: usize) -> Self {
        self.thread_pool_size = Some(size);
        self
    }

    /// Reject parameter sets that cannot describe a run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.order_count.is_none() && self.horizon.is_none() {
            return Err(ConfigError::invalid(
                "order_count",
                "either an order count or a horizon is required",
            ));
        }
        if let Some(horizon) = self.horizon {
            if !(horizon.is_finite() && horizon >= 0.0) {
                return Err(ConfigError::invalid("horizon", "must be finite and non-negative"));
            }
        }
        check_distribution("interarrival", &self.interarrival)?;
        if self.interarrival.mean() <= 0.0 && self.order_count.is_none() {
            return Err(ConfigError::invalid(
                "interarrival",
                "a horizon-bounded run needs a positive mean interarrival time",
            ));
        }

        check_mix("product_mix", &self.product_mix, self.products.len())?;
        check_mix("customer_mix", &self.customer_mix, self.customers.len())?;

        for (p, product) in self.products.iter().enumerate() {
            let field = format!("products[{}]", p);
            let unit_process_time = format!("{}.unit_process_time", field);
            check_distribution(&unit_process_time, &product.unit_process_time)?;
            if !product.unit_process_time.is_positive() {
                return Err(ConfigError::invalid(
                    unit_process_time,
                    "every draw must be positive",
                ));
            }
            if !(product.unit_profit.is_finite() && product.unit_profit >= 0.0) {
                return Err(ConfigError::invalid(
                    format!("{}.unit_profit", field),
                    "must be finite and non-negative",
                ));
            }
            if product.quantity_by_customer.len() != self.customers.len() {
                return Err(ConfigError::invalid(
                    format!("{}.quantity_by_customer", field),
                    format!(
                        "has {} entries for {} customer types",
                        product.quantity_by_customer.len(),
                        self.customers.len()
                    ),
                ));
            }
            for (c, quantity) in product.quantity_by_customer.iter().enumerate() {
                check_distribution(&format!("{}.quantity_by_customer[{}]", field, c), quantity)?;
            }
        }

        for (c, customer) in self.customers.iter().enumerate() {
            let field = format!("customers[{}]", c);
            if !(0.0..=1.0).contains(&customer.reliability) {
                return Err(ConfigError::invalid(
                    format!("{}.reliability", field),
                    "must lie in [0, 1]",
                ));
            }
            let sensitivity = customer.rejection_sensitivity;
            if !(sensitivity.is_finite() && sensitivity >= 0.0) {
                return Err(ConfigError::invalid(
                    format!("{}.rejection_sensitivity", field),
                    "must be finite and non-negative",
                ));
            }
            check_non_negative(&format!("{}.weight_factor", field), &customer.weight_factor)?;
            check_distribution(
                &format!("{}.cancellation_delay", field),
                &customer.cancellation_delay,
            )?;
        }

        match self.due_date_policy {
            DueDatePolicyConfig::Constant { offset } if !offset.is_finite() => {
                return Err(ConfigError::invalid("due_date_policy.offset", "must be finite"));
            }
            DueDatePolicyConfig::Slack { slack } if !slack.is_finite() => {
                return Err(ConfigError::invalid("due_date_policy.slack", "must be finite"));
            }
            DueDatePolicyConfig::TotalWorkContent { window: 0 } => {
                return Err(ConfigError::invalid("due_date_policy.window", "must be positive"));
            }
            _ => {}
        }

        if self.dispatching_rule.uses_oracle() {
            match &self.optimization {
                None => {
                    return Err(ConfigError::invalid(
                        "optimization.due_date_cost_coefficient",
                        format!("required by the {} dispatching rule", self.dispatching_rule),
                    ));
                }
                Some(opt) if !(opt.due_date_cost_coefficient.is_finite()
                    && opt.due_date_cost_coefficient >= 0.0) =>
                {
                    return Err(ConfigError::invalid(
                        "optimization.due_date_cost_coefficient",
                        "must be finite and non-negative",
                    ));
                }
                Some(_) => {}
            }
        }

        if !(0.0..0.5).contains(&self.warmup_fraction) {
            return Err(ConfigError::invalid("warmup_fraction", "must lie in [0, 0.5)"));
        }
        if self.replications == 0 {
            return Err(ConfigError::invalid("replications", "must be at least 1"));
        }
        if self.thread_pool_size == Some(0) {
            return Err(ConfigError::invalid("thread_pool_size", "must be positive"));
        }
        Ok(())
    }

    /// Expected machine utilization: mean expected process time of an order
    /// over the mean interarrival time.
    pub fn offered_load(&self) -> f64 {
        let product_total: f64 = self.product_mix.iter().sum();
        let customer_total: f64 = self.customer_mix.iter().sum();
        if product_total <= 0.0 || customer_total <= 0.0 {
            return 0.0;
        }

        let mut expected_work = 0.0;
        for (product, &p_share) in self.products.iter().zip(&self.product_mix) {
            let unit = product.expected_unit_process_time();
            let quantities = product.quantity_by_customer.iter();
            for (quantity, &c_share) in quantities.zip(&self.customer_mix) {
                expected_work += (p_share / product_total)
                    * (c_share / customer_total)
                    * quantity.mean().max(1.0)
                    * unit;
            }
        }

        let interarrival = self.interarrival.mean();
        if interarrival > 0.0 {
            expected_work / interarrival
        } else {
            f64::INFINITY
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn check_distribution(field: &str, distribution: &Distribution) -> Result<(), ConfigError> {
    distribution
        .validate()
        .map_err(|e| ConfigError::invalid(field, e.to_string()))
}

/// Weight factors are clamped at zero when drawn, so only the mean has to
/// be non-negative
fn check_non_negative(field: &str, distribution: &Distribution) -> Result<(), ConfigError> {
    check_distribution(field, distribution)?;
    if distribution.mean() < 0.0 {
        return Err(ConfigError::invalid(field, "must have a non-negative mean"));
    }
    Ok(())
}

fn check_mix(field: &str, mix: &[f64], types: usize) -> Result<(), ConfigError> {
    if types == 0 {
        return Err(ConfigError::invalid(field, "at least one type is required"));
    }
    if mix.len() != types {
        return Err(ConfigError::invalid(
            field,
            format!("has {} weights for {} types", mix.len(), types),
        ));
    }
    if mix.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
        return Err(ConfigError::invalid(field, "weights must be finite and non-negative"));
    }
    if mix.iter().sum::<f64>() <= 0.0 {
        return Err(ConfigError::invalid(field, "weights must not all be zero"));
    }
    Ok(())
}
