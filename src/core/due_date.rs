//! Due-date quoting rules.
//!
//! A policy maps the state of the shop at an order's arrival to the due
//! date offered to its customer:
//!
//! - **CON**: a constant offset from now
//! - **SLK**: a constant slack on top of the projected completion time
//! - **TWK**: total work content, the expected process time scaled by the
//!   recent average flow factor

use crate::core::types::SimTime;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Due-date policy selection as it appears in configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum DueDatePolicyConfig {
    #[serde(alias = "CON")]
    Constant { offset: f64 },
    #[serde(alias = "SLK")]
    Slack { slack: f64 },
    #[serde(alias = "TWK")]
    TotalWorkContent { window: usize },
}

impl Default for DueDatePolicyConfig {
    fn default() -> Self {
        DueDatePolicyConfig::Constant { offset: 200.0 }
    }
}

impl std::fmt::Display for DueDatePolicyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DueDatePolicyConfig::Constant { offset } => write!(f, "CON({})", offset),
            DueDatePolicyConfig::Slack { slack } => write!(f, "SLK({})", slack),
            DueDatePolicyConfig::TotalWorkContent { window } => write!(f, "TWK({})", window),
        }
    }
}

/// What a policy may look at when quoting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteRequest {
    pub now: SimTime,
    pub expected_process_time: f64,
    pub projected_completion: SimTime,
}

/// Rolling window of the most recent flow factors, oldest evicted first
#[derive(Debug, Clone, PartialEq)]
pub struct FlowFactorHistory {
    window: usize,
    values: VecDeque<f64>,
}

impl FlowFactorHistory {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window),
        }
    }

    fn push(&mut self, flow_factor: f64) {
        if self.window == 0 {
            return;
        }
        if self.values.len() == self.window {
            self.values.pop_front();
        }
        self.values.push_back(flow_factor);
    }

    /// Mean of the retained values, 1.0 while empty
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            1.0
        } else {
            self.values.iter().sum::<f64>() / self.values.len() as f64
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

/// A live due-date policy for one run
#[derive(Debug, Clone, PartialEq)]
pub enum DueDatePolicy {
    Constant { offset: f64 },
    Slack { slack: f64 },
    TotalWorkContent(FlowFactorHistory),
}

impl DueDatePolicy {
    pub fn from_config(config: &DueDatePolicyConfig) -> Self {
        match *config {
            DueDatePolicyConfig::Constant { offset } => DueDatePolicy::Constant { offset },
            DueDatePolicyConfig::Slack { slack } => DueDatePolicy::Slack { slack },
            DueDatePolicyConfig::TotalWorkContent { window } => {
                DueDatePolicy::TotalWorkContent(FlowFactorHistory::new(window))
            }
        }
    }

    /// Due date to offer for the order described by `request`
    pub fn quote(&self, request: &QuoteRequest) -> SimTime {
        match self {
            DueDatePolicy::Constant { offset } => request.now + offset,
            DueDatePolicy::Slack { slack } => request.projected_completion + slack,
            DueDatePolicy::TotalWorkContent(history) => {
                request.now + request.expected_process_time * history.mean()
            }
        }
    }

    /// Whether the policy learns from completed orders
    pub fn is_stateful(&self) -> bool {
        matches!(self, DueDatePolicy::TotalWorkContent(_))
    }

    /// Feed the flow factor of a completed order. Stateless policies ignore it.
    pub fn record_completion(&mut self, flow_factor: f64) {
        if let DueDatePolicy::TotalWorkContent(history) = self {
            history.push(flow_factor);
        }
    }

    /// Current TWK multiplier, `None` for the other policies
    pub fn flow_factor_estimate(&self) -> Option<f64> {
        match self {
            DueDatePolicy::TotalWorkContent(history) => Some(history.mean()),
            _ => None,
        }
    }
}
