use super::config::{ConfigError, SimulationConfig};
use super::observer::{MachineState, SimulationObserver};
use crate::core::due_date::{DueDatePolicy, QuoteRequest};
use crate::core::entities::{Order, OrderSpec};
use crate::core::errors::{SimResult, SimulationError};
use crate::core::events::{Event, EventKind, EventQueue};
use crate::core::report::RunReport;
use crate::core::sampling::VariateSource;
use crate::core::scheduling::{JobQueue, MachineOutlook, SequencingOracle, WeightedTardinessOracle};
use crate::core::types::{OrderId, SimTime};
use log::{debug, info};

/// One simulated machine with its order stream.
///
/// The environment owns the event queue, the orders, the job queue, the
/// due-date policy and the machine state. Events are drained in time order
/// and each one runs to completion before the next is popped.
pub struct Environment {
    config: SimulationConfig,
    seed: u64,
    replication: usize,
    now: SimTime,
    events: EventQueue,
    orders: Vec<Order>,
    job_queue: JobQueue,
    policy: DueDatePolicy,
    machine: MachineState,
    variates: Box<dyn VariateSource + Send>,
    observers: Vec<Box<dyn SimulationObserver>>,
    events_processed: u64,
}

impl Environment {
    /// Create the environment of the first replication
    pub fn new(config: &SimulationConfig) -> SimResult<Self> {
        Self::for_replication(config, 0)
    }

    /// Create the environment of replication `replication`, seeded with
    /// `config.seed + replication`
    pub fn for_replication(config: &SimulationConfig, replication: usize) -> SimResult<Self> {
        config.validate()?;
        let seed = config.seed.wrapping_add(replication as u64);

        let mut job_queue = JobQueue::new(config.dispatching_rule);
        if config.dispatching_rule.uses_oracle() {
            if let Some(optimization) = &config.optimization {
                job_queue.set_oracle(Box::new(WeightedTardinessOracle::new(optimization)));
            }
        }

        Ok(Self {
            config: config.clone(),
            seed,
            replication,
            now: 0.0,
            events: EventQueue::new(),
            orders: Vec::new(),
            job_queue,
            policy: DueDatePolicy::from_config(&config.due_date_policy),
            machine: MachineState::Idle,
            variates: config.variate_mode.source(seed),
            observers: Vec::new(),
            events_processed: 0,
        })
    }

    /// Replace the variate source
    pub fn with_variates(mut self, variates: Box<dyn VariateSource + Send>) -> Self {
        self.variates = variates;
        self
    }

    /// Replace the sequencing oracle used by the optimization rule
    pub fn with_oracle(mut self, oracle: Box<dyn SequencingOracle + Send>) -> Self {
        self.job_queue.set_oracle(oracle);
        self
    }

    /// Add an observer to the simulation
    pub fn add_observer(&mut self, observer: Box<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    /// Create an order and schedule its arrival
    pub fn add_order(&mut self, spec: OrderSpec) -> SimResult<OrderId> {
        if !(spec.arrival_time.is_finite() && spec.arrival_time >= self.now) {
            return Err(invalid_spec("arrival_time", "must be finite and not in the past"));
        }
        if !(spec.quantity.is_finite() && spec.quantity > 0.0) {
            return Err(invalid_spec("quantity", "must be finite and positive"));
        }
        let product = self
            .config
            .products
            .get(spec.product)
            .ok_or_else(|| invalid_spec("product", "unknown product type"))?;
        let customer = self
            .config
            .customers
            .get(spec.customer)
            .ok_or_else(|| invalid_spec("customer", "unknown customer type"))?;

        let id = OrderId::new(self.orders.len());
        let order = Order::generate(
            id,
            &spec,
            product,
            customer,
            self.variates.as_mut(),
            &mut self.events,
        )?;
        self.orders.push(order);
        Ok(id)
    }

    /// Draw the order stream from the configuration. Arrivals stop at the
    /// order count or the horizon, whichever comes first. Sampled quantities
    /// are floored at one unit.
    pub fn generate_orders(&mut self) -> SimResult<usize> {
        let mut t = self.now;
        let mut generated = 0;
        loop {
            if self.config.order_count.is_some_and(|count| generated >= count) {
                break;
            }
            t += self.variates.sample(&self.config.interarrival)?.max(0.0);
            if self.config.horizon.is_some_and(|horizon| t > horizon) {
                break;
            }

            let product = self.variates.sample_index(&self.config.product_mix)?;
            let customer = self.variates.sample_index(&self.config.customer_mix)?;
            let quantity_distribution = self
                .config
                .products
                .get(product)
                .and_then(|p| p.quantity_by_customer.get(customer))
                .ok_or_else(|| invalid_spec("quantity_by_customer", "missing distribution"))?;
            let quantity = self.variates.sample(quantity_distribution)?.max(1.0);

            self.add_order(OrderSpec {
                arrival_time: t,
                product,
                customer,
                quantity,
            })?;
            generated += 1;
        }
        debug!("generated {} orders up to t={:.3}", generated, t);
        Ok(generated)
    }

    /// Drain the event queue and report on the run
    pub fn run(&mut self) -> SimResult<RunReport> {
        info!(
            "replication {} (seed {}): {} orders, {} dispatching, {} due dates, offered load {:.3}",
            self.replication,
            self.seed,
            self.orders.len(),
            self.config.dispatching_rule,
            self.config.due_date_policy,
            self.config.offered_load()
        );

        while self.step()? {}

        let report = self.report();
        info!(
            "replication {} finished at t={:.3} after {} events: rejected {:.3}, tardy {:.3}, canceled {:.3}",
            self.replication,
            self.now,
            self.events_processed,
            report.statistics.rejection_proportion,
            report.statistics.tardiness_proportion,
            report.statistics.cancellation_proportion
        );
        Ok(report)
    }

    /// Process the next event, returns true if one was processed
    pub fn step(&mut self) -> SimResult<bool> {
        let Some((event, time)) = self.events.pop_min() else {
            return Ok(false);
        };

        debug_assert!(time >= self.now, "event at {} before now {}", time, self.now);
        if time > self.now {
            let old_time = self.now;
            self.now = time;
            for observer in &mut self.observers {
                observer.on_time_advance(old_time, time);
            }
        }

        debug!("t={:.3} {} {}", self.now, event.kind, event.order);
        match event.kind {
            EventKind::Arrival => self.on_arrival(event.order)?,
            EventKind::Cancellation => self.on_cancellation(event.order)?,
            EventKind::Start => self.on_start(event.order)?,
            EventKind::Finish => self.on_finish(event.order)?,
        }
        self.events_processed += 1;

        self.notify_event_processed(&event);
        Ok(true)
    }

    fn notify_event_processed(&mut self, event: &Event) {
        for observer in &mut self.observers {
            observer.on_event_processed(self.now, event, self.machine);
        }
    }

    /// Quote a due date and, if the customer accepts, schedule the order
    fn on_arrival(&mut self, id: OrderId) -> SimResult<()> {
        let now = self.now;
        let expected = self.order(id)?.expected_process_time();

        match self.machine {
            MachineState::Idle => {
                let due_date = self.policy.quote(&QuoteRequest {
                    now,
                    expected_process_time: expected,
                    projected_completion: now + expected,
                });
                if !self.offer(id, due_date)? {
                    return Ok(());
                }
                let outlook = MachineOutlook {
                    now,
                    remaining_time: 0.0,
                };
                let proposal = self.job_queue.propose(Some(id), &self.orders, outlook)?;
                self.job_queue.commit(proposal);
                self.refresh_event_times()?;
                // reserved until its start event fires at `now`
                self.machine = MachineState::Busy(id);
            }
            MachineState::Busy(current) => {
                let outlook = MachineOutlook {
                    now,
                    remaining_time: self.remaining_time(current)?,
                };
                let proposal = self.job_queue.propose(Some(id), &self.orders, outlook)?;
                let completion = proposal
                    .projected_completion()
                    .unwrap_or(now + outlook.remaining_time + expected);
                let due_date = self.policy.quote(&QuoteRequest {
                    now,
                    expected_process_time: expected,
                    projected_completion: completion,
                });
                if self.offer(id, due_date)? {
                    self.job_queue.commit(proposal);
                    self.refresh_event_times()?;
                } else {
                    self.job_queue.discard(proposal);
                }
            }
        }
        Ok(())
    }

    fn offer(&mut self, id: OrderId, due_date: SimTime) -> SimResult<bool> {
        let now = self.now;
        let order = order_mut(&mut self.orders, id)?;
        let accepted =
            order.due_date_accepted(due_date, now, self.variates.as_mut(), &mut self.events)?;
        debug!(
            "{} quoted {:.3} at t={:.3}: {}",
            id,
            due_date,
            now,
            if accepted { "accepted" } else { "rejected" }
        );
        Ok(accepted)
    }

    /// Withdraw a waiting order and close the gap it leaves
    fn on_cancellation(&mut self, id: OrderId) -> SimResult<()> {
        let now = self.now;
        order_mut(&mut self.orders, id)?.withdraw(now, &mut self.events)?;
        if !self.job_queue.remove(id) {
            return Err(SimulationError::NotQueued(id));
        }

        let outlook = MachineOutlook {
            now,
            remaining_time: match self.machine.in_process() {
                Some(current) => self.remaining_time(current)?,
                None => 0.0,
            },
        };
        let proposal = self.job_queue.propose(None, &self.orders, outlook)?;
        self.job_queue.commit(proposal);
        self.refresh_event_times()
    }

    fn on_start(&mut self, id: OrderId) -> SimResult<()> {
        if let MachineState::Busy(busy_with) = self.machine {
            if busy_with != id {
                return Err(SimulationError::MachineOccupied {
                    busy_with,
                    requested: id,
                });
            }
        }
        let head = self.job_queue.pop_next();
        if head != Some(id) {
            return Err(SimulationError::SequenceDesync {
                started: id,
                expected: head,
            });
        }

        let now = self.now;
        order_mut(&mut self.orders, id)?.dispatch(now, &mut self.events)?;
        self.machine = MachineState::Busy(id);
        Ok(())
    }

    fn on_finish(&mut self, id: OrderId) -> SimResult<()> {
        if self.machine != MachineState::Busy(id) {
            return Err(SimulationError::NotInProcess {
                order: id,
                in_process: self.machine.in_process(),
            });
        }

        let now = self.now;
        let flow_factor = order_mut(&mut self.orders, id)?.complete(now)?;
        self.machine = MachineState::Idle;
        if self.policy.is_stateful() {
            self.policy.record_completion(flow_factor);
        }
        Ok(())
    }

    /// Re-time the confirmed sequence back to back, starting when the
    /// machine is next available
    fn refresh_event_times(&mut self) -> SimResult<()> {
        let mut t = match self.machine.in_process() {
            Some(current) => self
                .order(current)?
                .scheduled_finish(&self.events)
                .map_or(self.now, |finish| finish.max(self.now)),
            None => self.now,
        };
        let sequence: Vec<OrderId> = self.job_queue.confirmed().collect();
        for id in sequence {
            t = order_mut(&mut self.orders, id)?.update_event_times(t, &mut self.events)?;
        }
        Ok(())
    }

    /// Expected time left on the order being processed
    fn remaining_time(&self, current: OrderId) -> SimResult<f64> {
        let order = self.order(current)?;
        let start = order
            .start_time()
            .or_else(|| order.scheduled_start(&self.events))
            .unwrap_or(self.now);
        Ok((start + order.expected_process_time() - self.now).max(0.0))
    }

    /// Report on the run so far
    pub fn report(&self) -> RunReport {
        RunReport::new(
            self.seed,
            self.replication,
            self.now,
            &self.orders,
            self.config.warmup_fraction,
        )
    }

    pub fn order(&self, id: OrderId) -> SimResult<&Order> {
        self.orders
            .get(id.index())
            .ok_or(SimulationError::UnknownOrder(id))
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn machine(&self) -> MachineState {
        self.machine
    }

    pub fn job_queue(&self) -> &JobQueue {
        &self.job_queue
    }

    pub fn event_queue(&self) -> &EventQueue {
        &self.events
    }

    #[cfg(test)]
    pub(crate) fn job_queue_mut(&mut self) -> &mut JobQueue {
        &mut self.job_queue
    }

    #[cfg(test)]
    pub(crate) fn event_queue_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    pub fn policy(&self) -> &DueDatePolicy {
        &self.policy
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

fn order_mut(orders: &mut [Order], id: OrderId) -> SimResult<&mut Order> {
    orders
        .get_mut(id.index())
        .ok_or(SimulationError::UnknownOrder(id))
}

fn invalid_spec(field: &str, reason: &str) -> SimulationError {
    SimulationError::Config(ConfigError::Invalid {
        field: format!("order.{}", field),
        reason: reason.to_string(),
    })
}
