//! Sequencing oracle used by the optimization dispatching rule.
//!
//! The oracle sees every waiting order and picks a single-machine,
//! non-preemptive sequence minimising
//!
//! ```text
//! coef * (C_new - now) + sum_i w_i * max(0, C_i - d_i)
//! ```
//!
//! where `C_new` is the completion of the order that has no due date yet
//! (the newest arrival) and the sum runs over orders holding a due date.

use crate::core::types::{OrderId, SimTime};
use serde::{Deserialize, Serialize};

/// One waiting order as seen by the oracle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OracleJob {
    pub order: OrderId,
    pub weight: f64,
    pub expected_time: f64,
    /// `None` for the newest arrival, which is still being quoted
    pub due_date: Option<SimTime>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    /// No valid sequence exists for the given input
    #[error("infeasible sequencing problem: {reason}")]
    Infeasible { reason: String },

    /// The oracle answered with something other than a permutation
    #[error("oracle returned an invalid permutation for {expected} jobs")]
    NotAPermutation { expected: usize },

    #[error("dispatching rule requires a sequencing oracle but none is installed")]
    Unavailable,
}

/// Produces a service order for the waiting jobs
pub trait SequencingOracle: std::fmt::Debug {
    /// Return a permutation of `0..jobs.len()`, head first.
    ///
    /// `jobs` arrive in the currently confirmed order with the newest
    /// arrival (if any) last. `remaining_machine_time` is the expected time
    /// left on the job currently being processed.
    fn sequence(
        &mut self,
        jobs: &[OracleJob],
        remaining_machine_time: f64,
        now: SimTime,
    ) -> Result<Vec<usize>, OracleError>;
}

/// Settings of the built-in oracle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Weight of the quoting cost of the newest arrival's completion time
    pub due_date_cost_coefficient: f64,
    /// Pools up to this size are solved exactly
    #[serde(default = "default_exact_limit")]
    pub exact_limit: usize,
}

fn default_exact_limit() -> usize {
    12
}

impl OptimizationConfig {
    pub fn new(due_date_cost_coefficient: f64) -> Self {
        Self {
            due_date_cost_coefficient,
            exact_limit: default_exact_limit(),
        }
    }
}

/// Built-in oracle: exact dynamic programming over subsets for small pools,
/// cheapest insertion followed by adjacent interchanges for larger ones.
#[derive(Debug, Clone)]
pub struct WeightedTardinessOracle {
    coefficient: f64,
    exact_limit: usize,
}

impl WeightedTardinessOracle {
    pub fn new(config: &OptimizationConfig) -> Self {
        Self {
            coefficient: config.due_date_cost_coefficient,
            // 2^n states, keep it bounded
            exact_limit: config.exact_limit.min(20),
        }
    }

    fn job_cost(&self, job: &OracleJob, completion: SimTime, now: SimTime) -> f64 {
        match job.due_date {
            Some(due) => job.weight * (completion - due).max(0.0),
            None => self.coefficient * (completion - now),
        }
    }

    fn sequence_cost(
        &self,
        jobs: &[OracleJob],
        order: &[usize],
        start: SimTime,
        now: SimTime,
    ) -> f64 {
        let mut t = start;
        order
            .iter()
            .map(|&j| {
                t += jobs[j].expected_time;
                self.job_cost(&jobs[j], t, now)
            })
            .sum()
    }

    fn solve_exact(&self, jobs: &[OracleJob], start: SimTime, now: SimTime) -> Vec<usize> {
        let n = jobs.len();
        let full = 1usize << n;
        let mut work = vec![0.0; full];
        let mut best = vec![f64::INFINITY; full];
        let mut last = vec![usize::MAX; full];
        best[0] = 0.0;

        for mask in 1..full {
            let low = mask.trailing_zeros() as usize;
            work[mask] = work[mask & (mask - 1)] + jobs[low].expected_time;
            let completion = start + work[mask];
            for j in (0..n).filter(|j| mask & (1 << j) != 0) {
                let cost = best[mask ^ (1 << j)] + self.job_cost(&jobs[j], completion, now);
                // ties keep later jobs at the back, preserving the given order
                if cost <= best[mask] + 1e-9 {
                    best[mask] = cost.min(best[mask]);
                    last[mask] = j;
                }
            }
        }

        let mut order = Vec::with_capacity(n);
        let mut mask = full - 1;
        while mask != 0 {
            let j = last[mask];
            order.push(j);
            mask ^= 1 << j;
        }
        order.reverse();
        order
    }

    fn solve_heuristic(&self, jobs: &[OracleJob], start: SimTime, now: SimTime) -> Vec<usize> {
        let mut order: Vec<usize> = (0..jobs.len())
            .filter(|&j| jobs[j].due_date.is_some())
            .collect();
        if let Some(newest) = (0..jobs.len()).find(|&j| jobs[j].due_date.is_none()) {
            let mut best_position = order.len();
            let mut best_cost = f64::INFINITY;
            for position in 0..=order.len() {
                order.insert(position, newest);
                let cost = self.sequence_cost(jobs, &order, start, now);
                if cost < best_cost - 1e-9 {
                    best_cost = cost;
                    best_position = position;
                }
                order.remove(position);
            }
            order.insert(best_position, newest);
        }

        let mut current = self.sequence_cost(jobs, &order, start, now);
        let mut improved = true;
        let mut passes = 0;
        while improved && passes < jobs.len() {
            improved = false;
            passes += 1;
            for i in 0..order.len().saturating_sub(1) {
                order.swap(i, i + 1);
                let cost = self.sequence_cost(jobs, &order, start, now);
                if cost < current - 1e-9 {
                    current = cost;
                    improved = true;
                } else {
                    order.swap(i, i + 1);
                }
            }
        }
        order
    }
}

impl SequencingOracle for WeightedTardinessOracle {
    fn sequence(
        &mut self,
        jobs: &[OracleJob],
        remaining_machine_time: f64,
        now: SimTime,
    ) -> Result<Vec<usize>, OracleError> {
        validate_input(jobs, remaining_machine_time, now)?;
        if !(self.coefficient.is_finite() && self.coefficient >= 0.0) {
            return Err(OracleError::Infeasible {
                reason: format!("due-date cost coefficient {} is not usable", self.coefficient),
            });
        }

        let start = now + remaining_machine_time;
        if jobs.len() <= self.exact_limit {
            Ok(self.solve_exact(jobs, start, now))
        } else {
            Ok(self.solve_heuristic(jobs, start, now))
        }
    }
}

fn validate_input(jobs: &[OracleJob], remaining: f64, now: SimTime) -> Result<(), OracleError> {
    let infeasible = |reason: String| Err(OracleError::Infeasible { reason });

    if !(now.is_finite() && remaining.is_finite() && remaining >= 0.0) {
        return infeasible(format!("machine outlook now={} remaining={}", now, remaining));
    }
    for job in jobs {
        if !(job.expected_time.is_finite() && job.expected_time >= 0.0) {
            return infeasible(format!("{} has process time {}", job.order, job.expected_time));
        }
        if !(job.weight.is_finite() && job.weight >= 0.0) {
            return infeasible(format!("{} has weight {}", job.order, job.weight));
        }
        if job.due_date.map(|d| !d.is_finite()).unwrap_or(false) {
            return infeasible(format!("{} has a non-finite due date", job.order));
        }
    }
    if jobs.iter().filter(|job| job.due_date.is_none()).count() > 1 {
        return infeasible("more than one job without a due date".to_string());
    }
    Ok(())
}

/// Check that `permutation` is a permutation of `0..len`
pub fn check_permutation(permutation: &[usize], len: usize) -> Result<(), OracleError> {
    let mut seen = vec![false; len];
    if permutation.len() != len {
        return Err(OracleError::NotAPermutation { expected: len });
    }
    for &i in permutation {
        match seen.get_mut(i) {
            Some(slot) if !*slot => *slot = true,
            _ => return Err(OracleError::NotAPermutation { expected: len }),
        }
    }
    Ok(())
}
