#![forbid(unsafe_code)]

use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use ctc_contracts::aggregate::{AggregateImpactResult, DatasetSummary, HealthReport};
use ctc_contracts::household::{AggregateImpactRequest, HouseholdImpactRequest};
use ctc_contracts::impact::{BenefitAtIncome, HouseholdImpactResult};
use ctc_contracts::{CalculationError, MonotonicTimeNs, Validate};
use ctc_engines::client::{CalcClient, CalcClientConfig};
use ctc_engines::derived;
use ctc_session::query::{AggregateSession, HouseholdSession};
use ctc_session::tracker::TrackerConfig;

/// Envelope returned by every calculation route. `reason` is the
/// human-readable message; `technical_detail` carries the raw upstream
/// information for an expandable details panel and is never required
/// reading.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CalcAdapterResponse<T> {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub technical_detail: Option<String>,
    pub integrity_warning: Option<String>,
    pub result: Option<T>,
}

impl<T> CalcAdapterResponse<T> {
    fn ok(result: T, integrity_warning: Option<String>) -> Self {
        Self {
            status: "ok".to_string(),
            outcome: "OK".to_string(),
            reason: None,
            technical_detail: None,
            integrity_warning,
            result: Some(result),
        }
    }

    fn rejected(reason: String, technical_detail: Option<String>) -> Self {
        Self {
            status: "error".to_string(),
            outcome: "REJECTED".to_string(),
            reason: Some(reason),
            technical_detail,
            integrity_warning: None,
            result: None,
        }
    }

    pub fn internal(reason: String) -> Self {
        Self {
            status: "error".to_string(),
            outcome: "INTERNAL_ERROR".to_string(),
            reason: Some(reason),
            technical_detail: None,
            integrity_warning: None,
            result: None,
        }
    }

    fn calculation_failed(err: &CalculationError) -> Self {
        Self {
            status: "error".to_string(),
            outcome: match err {
                CalculationError::Transport { .. } => "TRANSPORT_ERROR".to_string(),
                CalculationError::Remote { .. } => "UPSTREAM_REJECTED".to_string(),
            },
            reason: Some(err.user_message()),
            technical_detail: Some(technical_detail_for(err)),
            integrity_warning: None,
            result: None,
        }
    }

    pub fn is_upstream_failure(&self) -> bool {
        matches!(self.outcome.as_str(), "TRANSPORT_ERROR" | "UPSTREAM_REJECTED")
    }

    /// One log line for a failed calculation, safe to print: the upstream
    /// detail is already normalized, never a raw body dump.
    pub fn failure_log_line(&self, query: &str) -> Option<String> {
        if !self.is_upstream_failure() {
            return None;
        }
        let detail = self.technical_detail.as_deref().unwrap_or("unknown");
        Some(format!(
            "ctc_adapter_http calculation failed query={query} {detail}"
        ))
    }
}

fn technical_detail_for(err: &CalculationError) -> String {
    match err {
        CalculationError::Transport { kind } => format!("transport_kind={kind}"),
        CalculationError::Remote {
            status,
            detail: Some(detail),
        } => format!("http_status={status} detail={detail}"),
        CalculationError::Remote {
            status,
            detail: None,
        } => format!("http_status={status} detail=<unparseable>"),
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct HouseholdImpactPayload {
    pub result: HouseholdImpactResult,
    pub refundability: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PovertyDeltaWire {
    pub baseline_rate: f64,
    pub reform_rate: f64,
    pub change_pp: f64,
    pub percent_change: f64,
}

impl From<derived::PovertyDelta> for PovertyDeltaWire {
    fn from(delta: derived::PovertyDelta) -> Self {
        Self {
            baseline_rate: delta.baseline_rate,
            reform_rate: delta.reform_rate,
            change_pp: delta.change_pp,
            percent_change: delta.percent_change,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BracketBarWire {
    pub label: String,
    pub avg_benefit: f64,
}

/// Aggregate result plus the display figures: poverty deltas recomputed
/// with the zero-baseline guard and the signed bracket chart series.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AggregateImpactPayload {
    pub result: AggregateImpactResult,
    pub poverty: PovertyDeltaWire,
    pub child_poverty: PovertyDeltaWire,
    pub deep_poverty: PovertyDeltaWire,
    pub deep_child_poverty: PovertyDeltaWire,
    pub bracket_chart: Vec<BracketBarWire>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct RecalculateCheckRequest {
    pub household: HouseholdImpactRequest,
    pub aggregate: AggregateImpactRequest,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RecalculateCheckResponse {
    pub household_enabled: bool,
    pub aggregate_enabled: bool,
    pub household_expected_wait_ms: u32,
    pub aggregate_expected_wait_ms: u32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub upstream: Option<HealthReport>,
}

/// Form-facing runtime: the two query sessions (independent locks so the
/// ~90s aggregate call never blocks household traffic) plus a bare client
/// for the passthrough routes.
pub struct AdapterRuntime {
    household: Mutex<HouseholdSession<CalcClient>>,
    aggregate: Mutex<AggregateSession<CalcClient>>,
    client: CalcClient,
}

impl AdapterRuntime {
    pub fn new(config: CalcClientConfig) -> Self {
        let client = CalcClient::new(config);
        Self {
            household: Mutex::new(HouseholdSession::new(
                TrackerConfig::household_v1(),
                client.clone(),
            )),
            aggregate: Mutex::new(AggregateSession::new(
                TrackerConfig::aggregate_v1(),
                client.clone(),
            )),
            client,
        }
    }

    pub fn default_from_env() -> Self {
        Self::new(CalcClientConfig::from_env())
    }

    pub fn run_household_impact(
        &self,
        req: HouseholdImpactRequest,
    ) -> CalcAdapterResponse<HouseholdImpactPayload> {
        if let Err(violation) = req.validate() {
            return CalcAdapterResponse::rejected(
                "request failed contract validation".to_string(),
                Some(format!("{violation:?}")),
            );
        }
        let refundability = req.reform_params.refundability().as_str().to_string();
        let mut session = match self.household.lock() {
            Ok(session) => session,
            Err(_) => {
                return CalcAdapterResponse::internal("household session lock poisoned".to_string())
            }
        };
        match session.run_submission(&req, now()) {
            Some(Ok(result)) => {
                let figures = derived::household_figures(result);
                CalcAdapterResponse::ok(
                    HouseholdImpactPayload {
                        result: result.clone(),
                        refundability,
                    },
                    figures.integrity.map(|warning| warning.message()),
                )
            }
            Some(Err(err)) => CalcAdapterResponse::calculation_failed(err),
            None => CalcAdapterResponse::internal("submission did not settle".to_string()),
        }
    }

    /// Single-point benefit without the sweep; uncached because the remote
    /// call is cheap and the form uses it for immediate feedback.
    pub fn run_benefit_quick(
        &self,
        req: HouseholdImpactRequest,
    ) -> CalcAdapterResponse<BenefitAtIncome> {
        if let Err(violation) = req.validate() {
            return CalcAdapterResponse::rejected(
                "request failed contract validation".to_string(),
                Some(format!("{violation:?}")),
            );
        }
        match self.client.compute_benefit_quick(&req) {
            Ok(benefit) => {
                let integrity = derived::check_breakdown(&benefit)
                    .err()
                    .map(|warning| warning.message());
                CalcAdapterResponse::ok(benefit, integrity)
            }
            Err(err) => CalcAdapterResponse::calculation_failed(&err),
        }
    }

    pub fn run_aggregate_impact(
        &self,
        req: AggregateImpactRequest,
    ) -> CalcAdapterResponse<AggregateImpactPayload> {
        if let Err(violation) = req.validate() {
            return CalcAdapterResponse::rejected(
                "request failed contract validation".to_string(),
                Some(format!("{violation:?}")),
            );
        }
        let mut session = match self.aggregate.lock() {
            Ok(session) => session,
            Err(_) => {
                return CalcAdapterResponse::internal("aggregate session lock poisoned".to_string())
            }
        };
        match session.run_submission(&req, now()) {
            Some(Ok(result)) => {
                let figures = derived::statewide_figures(result);
                CalcAdapterResponse::ok(
                    AggregateImpactPayload {
                        result: result.clone(),
                        poverty: figures.poverty.into(),
                        child_poverty: figures.child_poverty.into(),
                        deep_poverty: figures.deep_poverty.into(),
                        deep_child_poverty: figures.deep_child_poverty.into(),
                        bracket_chart: figures
                            .bracket_chart
                            .into_iter()
                            .map(|(label, avg_benefit)| BracketBarWire { label, avg_benefit })
                            .collect(),
                    },
                    figures.integrity.map(|warning| warning.message()),
                )
            }
            Some(Err(err)) => CalcAdapterResponse::calculation_failed(err),
            None => CalcAdapterResponse::internal("submission did not settle".to_string()),
        }
    }

    /// Tells the form whether its live input has diverged from the last
    /// submitted snapshot of each query, and how long a dispatch is expected
    /// to take (the aggregate hint is what the loading message shows).
    pub fn run_recalculate_check(
        &self,
        req: RecalculateCheckRequest,
    ) -> Result<RecalculateCheckResponse, String> {
        let household = self
            .household
            .lock()
            .map_err(|_| "household session lock poisoned".to_string())?;
        let aggregate = self
            .aggregate
            .lock()
            .map_err(|_| "aggregate session lock poisoned".to_string())?;
        Ok(RecalculateCheckResponse {
            household_enabled: household.recalculate_enabled(&req.household),
            aggregate_enabled: aggregate.recalculate_enabled(&req.aggregate),
            household_expected_wait_ms: household.expected_wait_ms(),
            aggregate_expected_wait_ms: aggregate.expected_wait_ms(),
        })
    }

    pub fn health_report(&self) -> AdapterHealthResponse {
        match self.client.health() {
            Ok(upstream) => AdapterHealthResponse {
                status: "ok".to_string(),
                outcome: if upstream.dataset_loaded {
                    "HEALTHY".to_string()
                } else {
                    "DEGRADED".to_string()
                },
                reason: None,
                upstream: Some(upstream),
            },
            Err(err) => AdapterHealthResponse {
                status: "error".to_string(),
                outcome: "UNREACHABLE".to_string(),
                reason: Some(err.user_message()),
                upstream: None,
            },
        }
    }

    pub fn dataset_summary(&self) -> CalcAdapterResponse<DatasetSummary> {
        match self.client.dataset_summary() {
            Ok(summary) => CalcAdapterResponse::ok(summary, None),
            Err(err) => CalcAdapterResponse::calculation_failed(&err),
        }
    }
}

fn now() -> MonotonicTimeNs {
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    MonotonicTimeNs(start.elapsed().as_nanos() as u64)
}
