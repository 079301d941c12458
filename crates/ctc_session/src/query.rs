#![forbid(unsafe_code)]

use ctc_contracts::aggregate::AggregateImpactResult;
use ctc_contracts::household::{AggregateImpactRequest, HouseholdImpactRequest};
use ctc_contracts::impact::HouseholdImpactResult;
use ctc_contracts::{CalculationError, MonotonicTimeNs};
use ctc_engines::client::CalcClient;

use crate::tracker::{
    DisplayState, QueryTracker, ResolveAction, SubmitAction, TrackerConfig,
};

/// One remote calculation per call; retry and caching live in the session,
/// not the engine.
pub trait QueryEngine<I, T> {
    fn compute(&self, input: &I) -> Result<T, CalculationError>;
}

impl QueryEngine<HouseholdImpactRequest, HouseholdImpactResult> for CalcClient {
    fn compute(&self, input: &HouseholdImpactRequest) -> Result<HouseholdImpactResult, CalculationError> {
        self.compute_household_impact(input)
    }
}

impl QueryEngine<AggregateImpactRequest, AggregateImpactResult> for CalcClient {
    fn compute(&self, input: &AggregateImpactRequest) -> Result<AggregateImpactResult, CalculationError> {
        self.compute_aggregate_impact(input)
    }
}

/// Tracker plus engine for one logical query. `run_submission` drives a
/// whole submission to its settled state: cache check, dispatch, the
/// automatic retry budget, and resolution. Household and aggregate sessions
/// are independent values that never block one another.
#[derive(Debug, Clone)]
pub struct QuerySession<I, T, E> {
    tracker: QueryTracker<I, T>,
    engine: E,
}

impl<I, T, E> QuerySession<I, T, E>
where
    I: Clone + PartialEq,
    T: Clone,
    E: QueryEngine<I, T>,
{
    pub fn new(config: TrackerConfig, engine: E) -> Self {
        Self {
            tracker: QueryTracker::new(config),
            engine,
        }
    }

    /// Submit and settle. Returns the outcome now owned by the cache, or
    /// `None` if the submission was superseded before it settled (only
    /// possible when the tracker is driven concurrently elsewhere).
    pub fn run_submission(
        &mut self,
        input: &I,
        now: MonotonicTimeNs,
    ) -> Option<&Result<T, CalculationError>> {
        match self.tracker.submit(input.clone(), now) {
            SubmitAction::ServeCached => {}
            SubmitAction::Dispatch(mut ticket) => loop {
                let outcome = self.engine.compute(input);
                match self.tracker.resolve(ticket, outcome, now) {
                    ResolveAction::AutoRetry(next) => ticket = next,
                    ResolveAction::Settled | ResolveAction::Superseded => break,
                }
            },
        }
        self.tracker.settled_outcome()
    }

    pub fn recalculate_enabled(&self, live_input: &I) -> bool {
        self.tracker.recalculate_enabled(live_input)
    }

    pub fn display(&self) -> DisplayState<'_, T> {
        self.tracker.display()
    }

    pub fn expected_wait_ms(&self) -> u32 {
        self.tracker.config().expected_latency_hint_ms
    }
}

pub type HouseholdSession<E> = QuerySession<HouseholdImpactRequest, HouseholdImpactResult, E>;
pub type AggregateSession<E> = QuerySession<AggregateImpactRequest, AggregateImpactResult, E>;
