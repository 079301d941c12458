#![forbid(unsafe_code)]

use ctc_contracts::{CalculationError, MonotonicTimeNs};

/// Per-query cache and staleness policy. Time is injected by the caller as
/// `MonotonicTimeNs`; the tracker never reads a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// How long a settled result answers an identical resubmission without a
    /// new remote call.
    pub freshness_window_ns: u64,
    /// Automatic retries of a failed dispatch before the error settles.
    pub max_auto_retries: u8,
    /// Expected remote latency, carried in the loading state so the UI can
    /// message it.
    pub expected_latency_hint_ms: u32,
}

impl TrackerConfig {
    pub fn household_v1() -> Self {
        Self {
            freshness_window_ns: 300 * 1_000_000_000,
            max_auto_retries: 1,
            expected_latency_hint_ms: 5_000,
        }
    }

    /// The aggregate query runs a full microdata simulation; ~90 seconds of
    /// loading is normal and the hint says so.
    pub fn aggregate_v1() -> Self {
        Self {
            freshness_window_ns: 300 * 1_000_000_000,
            max_auto_retries: 1,
            expected_latency_hint_ms: 90_000,
        }
    }
}

/// Identifies one dispatched attempt. A resolve carrying a superseded ticket
/// is ignored: last-submitted-wins, not last-resolved-wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionTicket {
    seq: u64,
}

impl SubmissionTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitAction {
    /// The settled outcome for this exact input is still fresh; no call.
    ServeCached,
    /// Dispatch one remote call and resolve with this ticket.
    Dispatch(SubmissionTicket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveAction {
    Settled,
    /// The failure is eligible for one more automatic attempt; dispatch
    /// again with the new ticket before surfacing anything.
    AutoRetry(SubmissionTicket),
    /// A newer submission superseded this ticket; the outcome was discarded.
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
struct SettledRecord<I, T> {
    input: I,
    outcome: Result<T, CalculationError>,
    settled_at: MonotonicTimeNs,
}

#[derive(Debug, Clone, PartialEq)]
enum Phase<I, T> {
    Idle,
    Pending {
        input: I,
        seq: u64,
        retries_used: u8,
        last: Option<SettledRecord<I, T>>,
    },
    Settled(SettledRecord<I, T>),
}

/// What the UI renders right now. While a request is in flight the previous
/// settled outcome stays displayable to avoid flicker.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayState<'a, T> {
    NoData,
    Loading {
        stale: Option<&'a Result<T, CalculationError>>,
        expected_wait_ms: u32,
    },
    Ready(&'a Result<T, CalculationError>),
}

/// State machine for one logical query: `idle` -> `pending` ->
/// `settled(success|error)` -> `pending` on resubmission. Duplicate
/// detection is structural deep equality on the typed input, never a
/// serialize-and-compare fingerprint.
#[derive(Debug, Clone)]
pub struct QueryTracker<I, T> {
    config: TrackerConfig,
    next_seq: u64,
    phase: Phase<I, T>,
}

impl<I, T> QueryTracker<I, T>
where
    I: Clone + PartialEq,
    T: Clone,
{
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            next_seq: 1,
            phase: Phase::Idle,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn submit(&mut self, input: I, now: MonotonicTimeNs) -> SubmitAction {
        match &self.phase {
            Phase::Settled(record)
                if record.input == input && self.is_fresh(record.settled_at, now) =>
            {
                // Identical input, still fresh: serve from cache. This also
                // holds for settled errors, so an identical failing request
                // is not re-issued inside the window.
                SubmitAction::ServeCached
            }
            _ => {
                let last = match std::mem::replace(&mut self.phase, Phase::Idle) {
                    Phase::Settled(record) => Some(record),
                    Phase::Pending { last, .. } => last,
                    Phase::Idle => None,
                };
                let seq = self.take_seq();
                self.phase = Phase::Pending {
                    input,
                    seq,
                    retries_used: 0,
                    last,
                };
                SubmitAction::Dispatch(SubmissionTicket { seq })
            }
        }
    }

    pub fn resolve(
        &mut self,
        ticket: SubmissionTicket,
        outcome: Result<T, CalculationError>,
        now: MonotonicTimeNs,
    ) -> ResolveAction {
        let Phase::Pending {
            seq, retries_used, ..
        } = &mut self.phase
        else {
            return ResolveAction::Superseded;
        };
        if *seq != ticket.seq {
            return ResolveAction::Superseded;
        }

        if outcome.is_err() && *retries_used < self.config.max_auto_retries {
            *retries_used += 1;
            let next = self.take_seq();
            if let Phase::Pending { seq, .. } = &mut self.phase {
                *seq = next;
            }
            return ResolveAction::AutoRetry(SubmissionTicket { seq: next });
        }

        let Phase::Pending { input, .. } = std::mem::replace(&mut self.phase, Phase::Idle) else {
            return ResolveAction::Superseded;
        };
        self.phase = Phase::Settled(SettledRecord {
            input,
            outcome,
            settled_at: now,
        });
        ResolveAction::Settled
    }

    /// Whether the recalculate control is live: enabled when nothing has
    /// been submitted yet, or when the form input has diverged from the last
    /// submitted snapshot. Disabled while a request is in flight.
    pub fn recalculate_enabled(&self, live_input: &I) -> bool {
        match &self.phase {
            Phase::Idle => true,
            Phase::Pending { .. } => false,
            Phase::Settled(record) => record.input != *live_input,
        }
    }

    pub fn display(&self) -> DisplayState<'_, T> {
        match &self.phase {
            Phase::Idle => DisplayState::NoData,
            Phase::Pending { last, .. } => DisplayState::Loading {
                stale: last.as_ref().map(|record| &record.outcome),
                expected_wait_ms: self.config.expected_latency_hint_ms,
            },
            Phase::Settled(record) => DisplayState::Ready(&record.outcome),
        }
    }

    pub fn settled_outcome(&self) -> Option<&Result<T, CalculationError>> {
        match &self.phase {
            Phase::Settled(record) => Some(&record.outcome),
            _ => None,
        }
    }

    pub fn submitted_input(&self) -> Option<&I> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Pending { input, .. } => Some(input),
            Phase::Settled(record) => Some(&record.input),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::Pending { .. })
    }

    fn is_fresh(&self, settled_at: MonotonicTimeNs, now: MonotonicTimeNs) -> bool {
        now.0.saturating_sub(settled_at.0) <= self.config.freshness_window_ns
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> QueryTracker<&'static str, u32> {
        QueryTracker::new(TrackerConfig {
            freshness_window_ns: 1_000,
            max_auto_retries: 1,
            expected_latency_hint_ms: 90_000,
        })
    }

    fn at(ns: u64) -> MonotonicTimeNs {
        MonotonicTimeNs(ns)
    }

    fn dispatch(action: SubmitAction) -> SubmissionTicket {
        match action {
            SubmitAction::Dispatch(ticket) => ticket,
            SubmitAction::ServeCached => panic!("expected dispatch"),
        }
    }

    #[test]
    fn at_tracker_01_identical_resubmission_within_window_serves_cache() {
        let mut t = tracker();
        let ticket = dispatch(t.submit("a", at(0)));
        assert_eq!(t.resolve(ticket, Ok(7), at(10)), ResolveAction::Settled);

        assert_eq!(t.submit("a", at(500)), SubmitAction::ServeCached);
        assert_eq!(t.settled_outcome(), Some(&Ok(7)));
    }

    #[test]
    fn at_tracker_02_different_input_dispatches_again() {
        let mut t = tracker();
        let ticket = dispatch(t.submit("a", at(0)));
        t.resolve(ticket, Ok(7), at(10));

        assert!(matches!(t.submit("b", at(20)), SubmitAction::Dispatch(_)));
    }

    #[test]
    fn at_tracker_03_settled_error_is_served_without_hammering_the_remote() {
        let mut t = tracker();
        let ticket = dispatch(t.submit("a", at(0)));
        let retry = match t.resolve(
            ticket,
            Err(CalculationError::Transport { kind: "timeout" }),
            at(10),
        ) {
            ResolveAction::AutoRetry(ticket) => ticket,
            other => panic!("expected auto retry, got {other:?}"),
        };
        // Second failure exhausts the retry budget and settles.
        assert_eq!(
            t.resolve(
                retry,
                Err(CalculationError::Transport { kind: "timeout" }),
                at(20),
            ),
            ResolveAction::Settled
        );

        // Same failing input within the window: cached error, no dispatch.
        assert_eq!(t.submit("a", at(100)), SubmitAction::ServeCached);
        assert!(matches!(t.settled_outcome(), Some(&Err(_))));
    }

    #[test]
    fn at_tracker_04_expired_result_triggers_exactly_one_new_dispatch() {
        let mut t = tracker();
        let ticket = dispatch(t.submit("a", at(0)));
        t.resolve(ticket, Ok(7), at(10));

        // Past the freshness window the identical input dispatches again,
        // and the stale result remains displayable while pending.
        let action = t.submit("a", at(5_000));
        assert!(matches!(action, SubmitAction::Dispatch(_)));
        match t.display() {
            DisplayState::Loading {
                stale: Some(&Ok(7)),
                expected_wait_ms: 90_000,
            } => {}
            other => panic!("expected loading with stale result, got {other:?}"),
        }
    }

    #[test]
    fn at_tracker_05_superseded_resolve_is_discarded() {
        let mut t = tracker();
        let first = dispatch(t.submit("a", at(0)));
        let second = dispatch(t.submit("b", at(5)));

        // The slow first response must not overwrite the newer submission.
        assert_eq!(t.resolve(first, Ok(1), at(30)), ResolveAction::Superseded);
        assert_eq!(t.resolve(second, Ok(2), at(40)), ResolveAction::Settled);
        assert_eq!(t.settled_outcome(), Some(&Ok(2)));
        assert_eq!(t.submitted_input(), Some(&"b"));
    }

    #[test]
    fn at_tracker_06_recalculate_control_follows_submission_phase() {
        let mut t = tracker();
        assert!(t.recalculate_enabled(&"a"));

        let ticket = dispatch(t.submit("a", at(0)));
        assert!(!t.recalculate_enabled(&"a"));

        t.resolve(ticket, Ok(7), at(10));
        assert!(!t.recalculate_enabled(&"a"));
        assert!(t.recalculate_enabled(&"b"));
    }

    #[test]
    fn at_tracker_07_display_progression_never_loses_last_known_state() {
        let mut t = tracker();
        assert_eq!(t.display(), DisplayState::NoData);

        let ticket = dispatch(t.submit("a", at(0)));
        assert!(matches!(
            t.display(),
            DisplayState::Loading { stale: None, .. }
        ));

        t.resolve(ticket, Ok(7), at(10));
        assert_eq!(t.display(), DisplayState::Ready(&Ok(7)));
    }

    #[test]
    fn at_tracker_08_late_resolve_after_settle_is_superseded() {
        let mut t = tracker();
        let first = dispatch(t.submit("a", at(0)));
        t.resolve(first, Ok(1), at(10));
        assert_eq!(t.resolve(first, Ok(9), at(20)), ResolveAction::Superseded);
        assert_eq!(t.settled_outcome(), Some(&Ok(1)));
    }
}
