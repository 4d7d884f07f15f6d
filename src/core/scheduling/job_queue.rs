use super::dispatching::DispatchingRule;
use super::oracle::{check_permutation, OracleError, OracleJob, SequencingOracle};
use crate::core::entities::Order;
use crate::core::errors::{SimResult, SimulationError};
use crate::core::types::{OrderId, SimTime};
use log::trace;
use std::collections::{BTreeSet, VecDeque};

/// What the machine looks like to the scheduler at the moment of rescheduling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineOutlook {
    pub now: SimTime,
    /// Expected time left on the order being processed, 0 when idle
    pub remaining_time: f64,
}

/// A candidate sequence awaiting [`JobQueue::commit`] or [`JobQueue::discard`].
///
/// The proposal is owned by the caller, so the job queue never observes
/// an uncommitted ordering.
#[derive(Debug)]
#[must_use = "a proposed schedule must be committed or discarded"]
pub struct ProposedSchedule {
    sequence: Vec<OrderId>,
    admitted: Option<OrderId>,
    projected_completion: Option<SimTime>,
}

impl ProposedSchedule {
    /// Proposed service order, head first
    pub fn sequence(&self) -> &[OrderId] {
        &self.sequence
    }

    /// The order that joins the pool if this proposal is committed
    pub fn admitted(&self) -> Option<OrderId> {
        self.admitted
    }

    /// Expected completion of the admitted order under this proposal
    pub fn projected_completion(&self) -> Option<SimTime> {
        self.projected_completion
    }
}

/// Pool of waiting orders and the confirmed sequence they will be served in
#[derive(Debug)]
pub struct JobQueue {
    rule: DispatchingRule,
    oracle: Option<Box<dyn SequencingOracle + Send>>,
    waiting: BTreeSet<OrderId>,
    confirmed: VecDeque<OrderId>,
}

impl JobQueue {
    pub fn new(rule: DispatchingRule) -> Self {
        Self {
            rule,
            oracle: None,
            waiting: BTreeSet::new(),
            confirmed: VecDeque::new(),
        }
    }

    /// Install the oracle consulted by [`DispatchingRule::Optimization`]
    pub fn with_oracle(mut self, oracle: Box<dyn SequencingOracle + Send>) -> Self {
        self.set_oracle(oracle);
        self
    }

    pub fn set_oracle(&mut self, oracle: Box<dyn SequencingOracle + Send>) {
        self.oracle = Some(oracle);
    }

    pub fn rule(&self) -> DispatchingRule {
        self.rule
    }

    /// Propose a new sequence for the waiting pool plus `candidate`.
    ///
    /// Nothing changes until the proposal is committed. When a candidate is
    /// given, the proposal reports its projected completion: now, plus the
    /// remaining machine time, plus the expected times of every order served
    /// up to and including the candidate.
    pub fn propose(
        &mut self,
        candidate: Option<OrderId>,
        orders: &[Order],
        outlook: MachineOutlook,
    ) -> SimResult<ProposedSchedule> {
        let mut pool: Vec<OrderId> = self.confirmed.iter().copied().collect();
        // members that never made it into the confirmed sequence keep id order
        pool.extend(self.waiting.iter().filter(|id| !self.confirmed.contains(id)));
        if let Some(candidate) = candidate {
            if !self.waiting.contains(&candidate) {
                pool.push(candidate);
            }
        }

        let sequence = if self.rule.uses_oracle() {
            self.oracle_sequence(&pool, orders, outlook)?
        } else {
            let mut waiting = pool
                .iter()
                .map(|&id| lookup(orders, id))
                .collect::<SimResult<Vec<&Order>>>()?;
            waiting.sort_by(|a, b| self.rule.compare(a, b));
            waiting.into_iter().map(|order| order.id()).collect()
        };

        let projected_completion = match candidate {
            Some(candidate) => {
                let mut t = outlook.now + outlook.remaining_time;
                for &id in &sequence {
                    t += lookup(orders, id)?.expected_process_time();
                    if id == candidate {
                        break;
                    }
                }
                Some(t)
            }
            None => None,
        };

        trace!(
            "proposed {:?} (candidate {:?}, completion {:?})",
            sequence,
            candidate,
            projected_completion
        );
        Ok(ProposedSchedule {
            sequence,
            admitted: candidate,
            projected_completion,
        })
    }

    /// Make the proposal authoritative, admitting its candidate to the pool
    pub fn commit(&mut self, proposal: ProposedSchedule) {
        if let Some(id) = proposal.admitted {
            self.waiting.insert(id);
        }
        self.confirmed = proposal.sequence.into();
    }

    /// Drop the proposal; pool and confirmed sequence stay as they were
    pub fn discard(&mut self, proposal: ProposedSchedule) {
        trace!("discarded proposal admitting {:?}", proposal.admitted);
    }

    /// Take an order out of the pool. Returns whether it was waiting.
    pub fn remove(&mut self, id: OrderId) -> bool {
        self.confirmed.retain(|&other| other != id);
        self.waiting.remove(&id)
    }

    /// Pop the head of the confirmed sequence
    pub fn pop_next(&mut self) -> Option<OrderId> {
        let id = self.confirmed.pop_front()?;
        self.waiting.remove(&id);
        Some(id)
    }

    /// Next order to be served
    pub fn peek_next(&self) -> Option<OrderId> {
        self.confirmed.front().copied()
    }

    /// Confirmed sequence, head first
    pub fn confirmed(&self) -> impl Iterator<Item = OrderId> + '_ {
        self.confirmed.iter().copied()
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.waiting.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    fn oracle_sequence(
        &mut self,
        pool: &[OrderId],
        orders: &[Order],
        outlook: MachineOutlook,
    ) -> SimResult<Vec<OrderId>> {
        let oracle = self.oracle.as_mut().ok_or(OracleError::Unavailable)?;
        let jobs = pool
            .iter()
            .map(|&id| {
                let order = lookup(orders, id)?;
                Ok(OracleJob {
                    order: id,
                    weight: order.weight(),
                    expected_time: order.expected_process_time(),
                    due_date: order.due_date(),
                })
            })
            .collect::<SimResult<Vec<_>>>()?;

        let permutation = oracle.sequence(&jobs, outlook.remaining_time, outlook.now)?;
        check_permutation(&permutation, jobs.len())?;
        Ok(permutation.into_iter().map(|i| jobs[i].order).collect())
    }
}

fn lookup(orders: &[Order], id: OrderId) -> SimResult<&Order> {
    orders.get(id.index()).ok_or(SimulationError::UnknownOrder(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entities::{CustomerProfile, OrderSpec, ProductProfile};
    use crate::core::events::EventQueue;
    use crate::core::sampling::{Distribution, ExpectedVariates};
    use crate::core::scheduling::oracle::{OptimizationConfig, WeightedTardinessOracle};

    /// Orders with (arrival, quantity, weight factor); unit time and profit are 1.
    fn make_orders(specs: &[(f64, f64, f64)]) -> Vec<Order> {
        let mut queue = EventQueue::new();
        let product = ProductProfile::new(Distribution::constant(1.0), 1.0);
        specs
            .iter()
            .enumerate()
            .map(|(i, &(arrival_time, quantity, factor))| {
                let customer = CustomerProfile::new(
                    1.0,
                    0.0,
                    Distribution::constant(factor),
                    Distribution::constant(1.0),
                );
                Order::generate(
                    OrderId::new(i),
                    &OrderSpec {
                        arrival_time,
                        product: 0,
                        customer: 0,
                        quantity,
                    },
                    &product,
                    &customer,
                    &mut ExpectedVariates,
                    &mut queue,
                )
                .unwrap()
            })
            .collect()
    }

    fn outlook(now: SimTime, remaining_time: f64) -> MachineOutlook {
        MachineOutlook { now, remaining_time }
    }

    fn admit_all(queue: &mut JobQueue, orders: &[Order]) {
        for order in orders {
            let proposal = queue.propose(Some(order.id()), orders, outlook(0.0, 0.0)).unwrap();
            queue.commit(proposal);
        }
    }

    fn ids(queue: &JobQueue) -> Vec<usize> {
        queue.confirmed().map(|id| id.index()).collect()
    }

    #[test]
    fn test_fifo_serves_earliest_arrival_first() {
        let orders = make_orders(&[(2.0, 1.0, 1.0), (0.0, 5.0, 1.0), (1.0, 3.0, 1.0)]);
        let mut queue = JobQueue::new(DispatchingRule::Fifo);
        admit_all(&mut queue, &orders);
        assert_eq!(ids(&queue), vec![1, 2, 0]);
    }

    #[test]
    fn test_spt_serves_shortest_first() {
        let orders = make_orders(&[(0.0, 4.0, 1.0), (1.0, 1.0, 1.0), (2.0, 2.0, 1.0)]);
        let mut queue = JobQueue::new(DispatchingRule::ShortestExpectedTime);
        admit_all(&mut queue, &orders);
        assert_eq!(ids(&queue), vec![1, 2, 0]);
    }

    #[test]
    fn test_weight_priority_serves_heaviest_first() {
        let orders = make_orders(&[(0.0, 1.0, 1.0), (1.0, 1.0, 9.0), (2.0, 1.0, 4.0)]);
        let mut queue = JobQueue::new(DispatchingRule::WeightPriority);
        admit_all(&mut queue, &orders);
        assert_eq!(ids(&queue), vec![1, 2, 0]);
    }

    #[test]
    fn test_projection_counts_orders_ahead_and_remaining_time() {
        let orders = make_orders(&[(0.0, 2.0, 1.0), (1.0, 3.0, 1.0), (2.0, 1.0, 1.0)]);
        let mut queue = JobQueue::new(DispatchingRule::ShortestExpectedTime);
        let first = queue
            .propose(Some(OrderId::new(0)), &orders, outlook(0.0, 0.0))
            .unwrap();
        queue.commit(first);
        let second = queue
            .propose(Some(OrderId::new(1)), &orders, outlook(1.0, 0.0))
            .unwrap();
        queue.commit(second);

        // SPT puts the 1-unit order first: 2.0 now + 1.5 remaining + 1.0 own
        let proposal = queue
            .propose(Some(OrderId::new(2)), &orders, outlook(2.0, 1.5))
            .unwrap();
        assert_eq!(proposal.projected_completion(), Some(4.5));
        assert_eq!(proposal.sequence()[0], OrderId::new(2));
        queue.discard(proposal);
    }

    #[test]
    fn test_discard_leaves_pool_untouched() {
        let orders = make_orders(&[(0.0, 2.0, 1.0), (1.0, 1.0, 1.0)]);
        let mut queue = JobQueue::new(DispatchingRule::ShortestExpectedTime);
        let proposal = queue
            .propose(Some(OrderId::new(0)), &orders, outlook(0.0, 0.0))
            .unwrap();
        queue.commit(proposal);

        let proposal = queue
            .propose(Some(OrderId::new(1)), &orders, outlook(1.0, 0.0))
            .unwrap();
        assert_eq!(proposal.sequence().len(), 2);
        queue.discard(proposal);

        assert_eq!(ids(&queue), vec![0]);
        assert!(!queue.contains(OrderId::new(1)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_pop_and_remove() {
        let orders = make_orders(&[(0.0, 1.0, 1.0), (1.0, 1.0, 1.0), (2.0, 1.0, 1.0)]);
        let mut queue = JobQueue::new(DispatchingRule::Fifo);
        admit_all(&mut queue, &orders);

        assert!(queue.remove(OrderId::new(1)));
        assert!(!queue.remove(OrderId::new(1)));
        assert_eq!(queue.pop_next(), Some(OrderId::new(0)));
        assert_eq!(queue.peek_next(), Some(OrderId::new(2)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_optimization_without_oracle_fails() {
        let orders = make_orders(&[(0.0, 1.0, 1.0)]);
        let mut queue = JobQueue::new(DispatchingRule::Optimization);
        let err = queue
            .propose(Some(OrderId::new(0)), &orders, outlook(0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, SimulationError::Oracle(OracleError::Unavailable)));
    }

    #[test]
    fn test_optimization_refuses_two_unquoted_orders() {
        let orders = make_orders(&[(0.0, 2.0, 1.0), (1.0, 2.0, 1.0)]);
        let oracle = WeightedTardinessOracle::new(&OptimizationConfig::new(0.8));
        let mut queue = JobQueue::new(DispatchingRule::Optimization).with_oracle(Box::new(oracle));
        let proposal = queue
            .propose(Some(OrderId::new(0)), &orders, outlook(0.0, 0.0))
            .unwrap();
        queue.commit(proposal);

        // order 0 has no due date in this fixture either, so the oracle sees
        // two undated jobs and must refuse
        let err = queue
            .propose(Some(OrderId::new(1)), &orders, outlook(1.0, 1.0))
            .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Oracle(OracleError::Infeasible { .. })
        ));
    }
}
