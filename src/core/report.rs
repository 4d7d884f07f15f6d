//! Per-run output: one record per order plus statistics over the orders
//! that lie inside the warmup window.

use crate::core::entities::{Order, OrderState};
use crate::core::types::{CustomerType, OrderId, ProductType, SimTime};
use serde::Serialize;
use uuid::Uuid;

/// Snapshot of one order at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub customer: CustomerType,
    pub product: ProductType,
    pub quantity: f64,
    pub weight: f64,
    pub expected_process_time: f64,
    pub arrival: SimTime,
    pub due_date: Option<SimTime>,
    pub start: Option<SimTime>,
    /// When a withdrawal took effect
    pub cancellation: Option<SimTime>,
    pub finish: Option<SimTime>,
    pub state: OrderState,
}

impl OrderRecord {
    pub fn from_order(order: &Order) -> Self {
        Self {
            id: order.id(),
            customer: order.customer(),
            product: order.product(),
            quantity: order.quantity(),
            weight: order.weight(),
            expected_process_time: order.expected_process_time(),
            arrival: order.arrival_time(),
            due_date: order.due_date(),
            start: order.start_time(),
            cancellation: order.canceled_at(),
            finish: order.finish_time(),
            state: order.state(),
        }
    }

    /// Time past the due date, 0 when on time or not completed
    pub fn tardiness(&self) -> f64 {
        match (self.finish, self.due_date) {
            (Some(finish), Some(due)) => (finish - due).max(0.0),
            _ => 0.0,
        }
    }

    pub fn is_tardy(&self) -> bool {
        self.tardiness() > 0.0
    }

    pub fn flow_factor(&self) -> Option<f64> {
        let finish = self.finish?;
        (self.expected_process_time > 0.0)
            .then(|| (finish - self.arrival) / self.expected_process_time)
    }

    /// Whether the arrival and every recorded event time fall in `[start, end]`
    pub fn within(&self, start: SimTime, end: SimTime) -> bool {
        [Some(self.arrival), self.start, self.cancellation, self.finish]
            .into_iter()
            .flatten()
            .all(|t| t >= start && t <= end)
    }
}

/// Post-warmup statistics of one run.
///
/// Rejection shares are taken over every counted order, cancellation shares
/// over the accepted ones and tardiness figures over the completed ones.
/// Weighted variants replace counts by sums of economic weight.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RunStatistics {
    pub window_start: SimTime,
    pub window_end: SimTime,
    pub orders: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub canceled: usize,
    pub completed: usize,
    pub tardy: usize,
    pub rejection_proportion: f64,
    pub weighted_rejection_proportion: f64,
    pub cancellation_proportion: f64,
    pub tardiness_proportion: f64,
    pub weighted_tardiness_proportion: f64,
    /// Mean of tardiness over expected process time
    pub normalized_tardiness: f64,
    pub weighted_normalized_tardiness: f64,
    pub mean_flow_factor: Option<f64>,
    /// Busy share of the whole run, warmup included
    pub utilization: f64,
}

impl RunStatistics {
    /// Compute statistics for a run that ended at `end_time`
    pub fn compute(records: &[OrderRecord], end_time: SimTime, warmup_fraction: f64) -> Self {
        let window_start = warmup_fraction * end_time;
        let window_end = (1.0 - warmup_fraction) * end_time;
        let counted: Vec<&OrderRecord> = records
            .iter()
            .filter(|r| r.within(window_start, window_end))
            .collect();

        let mut stats = RunStatistics {
            window_start,
            window_end,
            orders: counted.len(),
            ..Default::default()
        };

        let mut total_weight = 0.0;
        let mut rejected_weight = 0.0;
        let mut completed_weight = 0.0;
        let mut tardy_weight = 0.0;
        let mut normalized_sum = 0.0;
        let mut weighted_normalized_sum = 0.0;
        let mut flow_factors = Vec::new();

        for record in &counted {
            total_weight += record.weight;
            match record.state {
                OrderState::Rejected => {
                    stats.rejected += 1;
                    rejected_weight += record.weight;
                }
                OrderState::Canceled => stats.canceled += 1,
                OrderState::Completed => {
                    stats.completed += 1;
                    completed_weight += record.weight;
                    if record.is_tardy() {
                        stats.tardy += 1;
                        tardy_weight += record.weight;
                    }
                    if record.expected_process_time > 0.0 {
                        let normalized = record.tardiness() / record.expected_process_time;
                        normalized_sum += normalized;
                        weighted_normalized_sum += record.weight * normalized;
                    }
                    flow_factors.extend(record.flow_factor());
                }
                _ => {}
            }
            if record.due_date.is_some() {
                stats.accepted += 1;
            }
        }

        stats.rejection_proportion = ratio(stats.rejected as f64, stats.orders as f64);
        stats.weighted_rejection_proportion = ratio(rejected_weight, total_weight);
        stats.cancellation_proportion = ratio(stats.canceled as f64, stats.accepted as f64);
        stats.tardiness_proportion = ratio(stats.tardy as f64, stats.completed as f64);
        stats.weighted_tardiness_proportion = ratio(tardy_weight, completed_weight);
        stats.normalized_tardiness = ratio(normalized_sum, stats.completed as f64);
        stats.weighted_normalized_tardiness = ratio(weighted_normalized_sum, completed_weight);
        stats.mean_flow_factor = (!flow_factors.is_empty())
            .then(|| flow_factors.iter().sum::<f64>() / flow_factors.len() as f64);

        let busy: f64 = records
            .iter()
            .filter_map(|r| Some(r.finish? - r.start?))
            .sum();
        stats.utilization = ratio(busy, end_time);
        stats
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Everything one replication produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub seed: u64,
    pub replication: usize,
    pub end_time: SimTime,
    pub records: Vec<OrderRecord>,
    pub statistics: RunStatistics,
}

impl RunReport {
    pub fn new(
        seed: u64,
        replication: usize,
        end_time: SimTime,
        orders: &[Order],
        warmup_fraction: f64,
    ) -> Self {
        let records: Vec<OrderRecord> = orders.iter().map(OrderRecord::from_order).collect();
        let statistics = RunStatistics::compute(&records, end_time, warmup_fraction);
        Self {
            run_id: Uuid::new_v4(),
            seed,
            replication,
            end_time,
            records,
            statistics,
        }
    }

    /// Whether two reports describe the same outcome, ignoring the run id
    pub fn same_outcome(&self, other: &RunReport) -> bool {
        self.seed == other.seed
            && self.replication == other.replication
            && self.end_time == other.end_time
            && self.records == other.records
            && self.statistics == other.statistics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: usize, arrival: SimTime, state: OrderState) -> OrderRecord {
        OrderRecord {
            id: OrderId::new(id),
            customer: 0,
            product: 0,
            quantity: 1.0,
            weight: 1.0,
            expected_process_time: 2.0,
            arrival,
            due_date: None,
            start: None,
            cancellation: None,
            finish: None,
            state,
        }
    }

    fn completed(
        id: usize,
        arrival: SimTime,
        due: SimTime,
        start: SimTime,
        finish: SimTime,
    ) -> OrderRecord {
        OrderRecord {
            due_date: Some(due),
            start: Some(start),
            finish: Some(finish),
            ..record(id, arrival, OrderState::Completed)
        }
    }

    #[test]
    fn test_window_excludes_boundary_orders() {
        let early = record(0, 5.0, OrderState::Rejected);
        let inside = completed(1, 20.0, 30.0, 20.0, 22.0);
        // arrives inside but finishes after the window closes
        let late = completed(2, 85.0, 95.0, 88.0, 95.0);

        let stats = RunStatistics::compute(&[early, inside, late], 100.0, 0.1);
        assert_eq!(stats.window_start, 10.0);
        assert_eq!(stats.window_end, 90.0);
        assert_eq!(stats.orders, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.rejected, 0);
    }

    #[test]
    fn test_proportions() {
        let mut heavy = record(0, 10.0, OrderState::Rejected);
        heavy.weight = 3.0;
        let on_time = completed(1, 10.0, 20.0, 10.0, 12.0);
        let mut tardy = completed(2, 11.0, 12.0, 12.0, 16.0);
        tardy.weight = 2.0;
        let canceled = OrderRecord {
            due_date: Some(40.0),
            cancellation: Some(15.0),
            ..record(3, 12.0, OrderState::Canceled)
        };

        let stats = RunStatistics::compute(&[heavy, on_time, tardy, canceled], 40.0, 0.0);
        assert_eq!(stats.orders, 4);
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.rejection_proportion, 0.25);
        assert_eq!(stats.weighted_rejection_proportion, 3.0 / 7.0);
        assert_eq!(stats.cancellation_proportion, 1.0 / 3.0);
        assert_eq!(stats.tardiness_proportion, 0.5);
        assert_eq!(stats.weighted_tardiness_proportion, 2.0 / 3.0);
        // tardy order is 4 late on an expected time of 2
        assert_eq!(stats.normalized_tardiness, 1.0);
        assert_eq!(stats.weighted_normalized_tardiness, 4.0 / 3.0);
        // (12-10)/2 and (16-11)/2
        assert_eq!(stats.mean_flow_factor, Some(1.75));
        assert_eq!(stats.utilization, 6.0 / 40.0);
    }

    #[test]
    fn test_empty_run_has_zero_statistics() {
        let stats = RunStatistics::compute(&[], 0.0, 0.1);
        assert_eq!(stats.orders, 0);
        assert_eq!(stats.rejection_proportion, 0.0);
        assert_eq!(stats.mean_flow_factor, None);
        assert_eq!(stats.utilization, 0.0);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let stats = RunStatistics::compute(&[completed(0, 1.0, 5.0, 1.0, 3.0)], 4.0, 0.0);
        let report = RunReport {
            run_id: Uuid::new_v4(),
            seed: 3,
            replication: 1,
            end_time: 4.0,
            records: vec![completed(0, 1.0, 5.0, 1.0, 3.0)],
            statistics: stats,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["seed"], 3);
        assert_eq!(json["records"][0]["state"], "completed");
        assert_eq!(json["records"][0]["id"], 0);
        assert!(json["records"][0]["cancellation"].is_null());
    }
}
