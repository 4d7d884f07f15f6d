use crate::core::entities::Order;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Rule used to sequence the waiting orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchingRule {
    /// First in, first out
    #[default]
    #[serde(alias = "FIFO")]
    Fifo,
    /// Shortest expected process time first
    #[serde(alias = "SPT")]
    ShortestExpectedTime,
    /// Biggest economic weight first
    #[serde(alias = "BWF")]
    WeightPriority,
    /// Sequence chosen by a sequencing oracle
    #[serde(alias = "OPT")]
    Optimization,
}

impl DispatchingRule {
    /// Service order of two waiting orders: `Less` means `a` is served first.
    ///
    /// Every rule falls back to arrival time and then order id, so the
    /// result is a total order. [`DispatchingRule::Optimization`] has no
    /// comparator of its own and only uses the fallback.
    pub fn compare(&self, a: &Order, b: &Order) -> Ordering {
        let primary = match self {
            DispatchingRule::Fifo | DispatchingRule::Optimization => Ordering::Equal,
            DispatchingRule::ShortestExpectedTime => a
                .expected_process_time()
                .total_cmp(&b.expected_process_time()),
            DispatchingRule::WeightPriority => b.weight().total_cmp(&a.weight()),
        };
        primary
            .then_with(|| a.arrival_time().total_cmp(&b.arrival_time()))
            .then_with(|| a.id().cmp(&b.id()))
    }

    /// Whether the rule needs a sequencing oracle
    pub fn uses_oracle(&self) -> bool {
        matches!(self, DispatchingRule::Optimization)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DispatchingRule::Fifo => "FIFO",
            DispatchingRule::ShortestExpectedTime => "SPT",
            DispatchingRule::WeightPriority => "BWF",
            DispatchingRule::Optimization => "OPT",
        }
    }
}

impl std::fmt::Display for DispatchingRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
