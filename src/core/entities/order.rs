use super::profiles::{CustomerProfile, ProductProfile};
use crate::core::errors::{SimResult, SimulationError};
use crate::core::events::{Event, EventKind, EventQueue};
use crate::core::sampling::{SamplingError, VariateSource};
use crate::core::types::{CustomerType, OrderId, ProductType, SimTime};
use log::trace;
use serde::{Deserialize, Serialize};

/// Where an order is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Generated, arrival not processed yet
    Created,
    /// Due date accepted, waiting for the machine
    Waiting,
    /// On the machine
    Dispatched,
    Completed,
    /// Customer turned the quoted due date down
    Rejected,
    /// Customer withdrew while waiting
    Canceled,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderState::Completed | OrderState::Rejected | OrderState::Canceled
        )
    }
}

/// The raw attributes an order is generated from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub arrival_time: SimTime,
    pub product: ProductType,
    pub customer: CustomerType,
    pub quantity: f64,
}

/// Events owned by an order. Start and finish only exist once a due date
/// has been accepted; the cancellation handle is dropped once it is moot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderEvents {
    pub arrival: Event,
    pub cancellation: Option<Event>,
    pub start: Option<Event>,
    pub finish: Option<Event>,
}

#[derive(Debug, Clone)]
pub struct Order {
    id: OrderId,
    arrival_time: SimTime,
    product: ProductType,
    customer: CustomerType,
    quantity: f64,
    process_time: f64,
    expected_process_time: f64,
    weight: f64,
    rejection_sensitivity: f64,
    due_date: Option<SimTime>,
    start_time: Option<SimTime>,
    finish_time: Option<SimTime>,
    cancellation_deadline: Option<SimTime>,
    canceled_at: Option<SimTime>,
    state: OrderState,
    events: OrderEvents,
}

impl Order {
    /// Generate an order: draw its stochastic attributes and schedule its
    /// fixed arrival (and, if the customer will withdraw, cancellation) event.
    pub fn generate(
        id: OrderId,
        spec: &OrderSpec,
        product: &ProductProfile,
        customer: &CustomerProfile,
        variates: &mut dyn VariateSource,
        queue: &mut EventQueue,
    ) -> SimResult<Self> {
        let unit_time = variates.sample(&product.unit_process_time)?;
        if !(unit_time > 0.0 && unit_time.is_finite()) {
            return Err(SamplingError::InvalidParameters {
                family: product.unit_process_time.family(),
                reason: format!("drew unit process time {}, must be positive", unit_time),
            }
            .into());
        }
        // normal tails may dip below zero
        let weight_factor = variates.sample(&customer.weight_factor)?.max(0.0);
        let process_time = spec.quantity * unit_time;
        let expected_process_time = spec.quantity * product.expected_unit_process_time();
        let weight = spec.quantity * product.unit_profit * customer.reliability * weight_factor;

        let arrival = queue.insert(EventKind::Arrival, id, Some(spec.arrival_time));

        let (cancellation_deadline, cancellation) =
            if variates.chance(customer.withdrawal_probability())? {
                let delay = variates.sample(&customer.cancellation_delay)?.max(0.0);
                let deadline = spec.arrival_time + delay;
                let event = queue.insert(EventKind::Cancellation, id, Some(deadline));
                (Some(deadline), Some(event))
            } else {
                (None, None)
            };

        Ok(Self {
            id,
            arrival_time: spec.arrival_time,
            product: spec.product,
            customer: spec.customer,
            quantity: spec.quantity,
            process_time,
            expected_process_time,
            weight,
            rejection_sensitivity: customer.rejection_sensitivity,
            due_date: None,
            start_time: None,
            finish_time: None,
            cancellation_deadline,
            canceled_at: None,
            state: OrderState::Created,
            events: OrderEvents {
                arrival,
                cancellation,
                start: None,
                finish: None,
            },
        })
    }

    /// Offer `candidate` as due date at time `now`.
    ///
    /// Returns `false` if the customer rejects it; the order is then
    /// terminal and its pending cancellation is dropped. On acceptance the
    /// due date is fixed for good and start/finish events are created with
    /// no time yet.
    pub fn due_date_accepted(
        &mut self,
        candidate: SimTime,
        now: SimTime,
        variates: &mut dyn VariateSource,
        queue: &mut EventQueue,
    ) -> SimResult<bool> {
        if let Some(due_date) = self.due_date {
            return Err(SimulationError::DueDateAlreadySet {
                order: self.id,
                due_date,
            });
        }
        self.expect_state(OrderState::Created, "be quoted")?;

        if variates.chance(self.rejection_probability(candidate - now))? {
            self.suppress_cancellation(queue)?;
            self.state = OrderState::Rejected;
            trace!("{} rejected due date {:.3}", self.id, candidate);
            return Ok(false);
        }

        self.due_date = Some(candidate);
        self.events.start = Some(queue.insert(EventKind::Start, self.id, None));
        self.events.finish = Some(queue.insert(EventKind::Finish, self.id, None));
        self.state = OrderState::Waiting;
        trace!("{} accepted due date {:.3}", self.id, candidate);
        Ok(true)
    }

    /// Probability that the customer turns down a due date `lead_time` ahead
    pub fn rejection_probability(&self, lead_time: f64) -> f64 {
        1.0 - (-self.rejection_sensitivity * lead_time.max(0.0)).exp()
    }

    /// Move the start event to `t` and the finish event to `t` plus the
    /// realized process time. Returns the finish instant so consecutive
    /// orders can be chained.
    pub fn update_event_times(&mut self, t: SimTime, queue: &mut EventQueue) -> SimResult<SimTime> {
        let (Some(start), Some(finish)) = (self.events.start, self.events.finish) else {
            return Err(SimulationError::InvalidTransition {
                order: self.id,
                state: self.state,
                action: "be timed",
            });
        };
        let finish_time = t + self.process_time;
        queue.update_time(start.id, t)?;
        queue.update_time(finish.id, finish_time)?;
        Ok(finish_time)
    }

    /// Drop the start and finish events. Safe to call repeatedly.
    pub fn cancel(&mut self, queue: &mut EventQueue) -> SimResult<()> {
        if let Some(start) = self.events.start {
            queue.remove(start.id)?;
        }
        if let Some(finish) = self.events.finish {
            queue.remove(finish.id)?;
        }
        Ok(())
    }

    /// The customer's cancellation event fired while the order was waiting
    pub fn withdraw(&mut self, now: SimTime, queue: &mut EventQueue) -> SimResult<()> {
        self.expect_state(OrderState::Waiting, "be withdrawn")?;
        // the cancellation event has just been popped
        self.events.cancellation = None;
        self.cancel(queue)?;
        self.canceled_at = Some(now);
        self.state = OrderState::Canceled;
        Ok(())
    }

    /// The start event fired. Once on the machine the order can no longer
    /// be withdrawn, so a pending cancellation is dropped.
    pub fn dispatch(&mut self, now: SimTime, queue: &mut EventQueue) -> SimResult<()> {
        self.expect_state(OrderState::Waiting, "start")?;
        self.suppress_cancellation(queue)?;
        self.start_time = Some(now);
        self.state = OrderState::Dispatched;
        Ok(())
    }

    /// The finish event fired. Returns the realized flow factor.
    pub fn complete(&mut self, now: SimTime) -> SimResult<f64> {
        self.expect_state(OrderState::Dispatched, "finish")?;
        self.finish_time = Some(now);
        self.state = OrderState::Completed;
        Ok(self.flow_factor().unwrap_or(1.0))
    }

    /// Sojourn time over expected process time, once completed
    pub fn flow_factor(&self) -> Option<f64> {
        let finish = self.finish_time?;
        if self.expected_process_time > 0.0 {
            Some((finish - self.arrival_time) / self.expected_process_time)
        } else {
            None
        }
    }

    /// Scheduled start time, if the start event is queued
    pub fn scheduled_start(&self, queue: &EventQueue) -> Option<SimTime> {
        self.events.start.and_then(|e| queue.time_of(e.id))
    }

    /// Scheduled finish time, if the finish event is queued
    pub fn scheduled_finish(&self, queue: &EventQueue) -> Option<SimTime> {
        self.events.finish.and_then(|e| queue.time_of(e.id))
    }

    fn suppress_cancellation(&mut self, queue: &mut EventQueue) -> SimResult<()> {
        if let Some(event) = self.events.cancellation.take() {
            queue.remove(event.id)?;
        }
        Ok(())
    }

    fn expect_state(&self, expected: OrderState, action: &'static str) -> SimResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SimulationError::InvalidTransition {
                order: self.id,
                state: self.state,
                action,
            })
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn arrival_time(&self) -> SimTime {
        self.arrival_time
    }

    pub fn product(&self) -> ProductType {
        self.product
    }

    pub fn customer(&self) -> CustomerType {
        self.customer
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// Realized processing time; only used for the actual finish instant
    pub fn process_time(&self) -> f64 {
        self.process_time
    }

    /// Processing time estimate used for sequencing and quoting
    pub fn expected_process_time(&self) -> f64 {
        self.expected_process_time
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn due_date(&self) -> Option<SimTime> {
        self.due_date
    }

    pub fn start_time(&self) -> Option<SimTime> {
        self.start_time
    }

    pub fn finish_time(&self) -> Option<SimTime> {
        self.finish_time
    }

    pub fn cancellation_deadline(&self) -> Option<SimTime> {
        self.cancellation_deadline
    }

    pub fn canceled_at(&self) -> Option<SimTime> {
        self.canceled_at
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn events(&self) -> &OrderEvents {
        &self.events
    }
}
