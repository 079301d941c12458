#![forbid(unsafe_code)]

use std::env;
use std::time::Duration;

use ctc_contracts::aggregate::{AggregateImpactResult, DatasetSummary, HealthReport};
use ctc_contracts::household::{AggregateImpactRequest, HouseholdImpactRequest};
use ctc_contracts::impact::{BenefitAtIncome, HouseholdImpactResult};
use ctc_contracts::CalculationError;
use serde_json::Value;

/// Calculation client configuration.
///
/// The aggregate operation runs a full microdata simulation on the backend
/// and routinely takes ~90 seconds; its timeout must stay above that with
/// margin. A request still pending at 90s is normal, not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalcClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub household_timeout_ms: u32,
    pub quick_timeout_ms: u32,
    pub aggregate_timeout_ms: u32,
    pub health_timeout_ms: u32,
    pub household_fixture_json: Option<String>,
    pub quick_fixture_json: Option<String>,
    pub aggregate_fixture_json: Option<String>,
    pub health_fixture_json: Option<String>,
    pub dataset_summary_fixture_json: Option<String>,
}

impl CalcClientConfig {
    pub fn mvp_v1(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_agent: "ctc-calc/1.0".to_string(),
            household_timeout_ms: 120_000,
            quick_timeout_ms: 60_000,
            aggregate_timeout_ms: 120_000,
            health_timeout_ms: 5_000,
            household_fixture_json: None,
            quick_fixture_json: None,
            aggregate_fixture_json: None,
            health_fixture_json: None,
            dataset_summary_fixture_json: None,
        }
    }

    pub fn from_env() -> Self {
        let base_url =
            env::var("CTC_API_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
        let mut config = Self::mvp_v1(base_url);
        if let Ok(agent) = env::var("CTC_HTTP_USER_AGENT") {
            if !agent.trim().is_empty() {
                config.user_agent = agent;
            }
        }
        config.household_timeout_ms =
            timeout_ms_from_env("CTC_HOUSEHOLD_TIMEOUT_MS", config.household_timeout_ms);
        config.quick_timeout_ms = timeout_ms_from_env("CTC_QUICK_TIMEOUT_MS", config.quick_timeout_ms);
        config.aggregate_timeout_ms =
            timeout_ms_from_env("CTC_AGGREGATE_TIMEOUT_MS", config.aggregate_timeout_ms);
        config.health_timeout_ms =
            timeout_ms_from_env("CTC_HEALTH_TIMEOUT_MS", config.health_timeout_ms);
        config
    }
}

fn timeout_ms_from_env(var: &str, default_ms: u32) -> u32 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| (1_000..=600_000).contains(v))
        .unwrap_or(default_ms)
}

/// Client for the external calculation backend. One outbound call per
/// invocation; retry policy lives in the session layer, never here.
#[derive(Debug, Clone)]
pub struct CalcClient {
    config: CalcClientConfig,
}

impl CalcClient {
    pub fn new(config: CalcClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CalcClientConfig {
        &self.config
    }

    pub fn compute_household_impact(
        &self,
        req: &HouseholdImpactRequest,
    ) -> Result<HouseholdImpactResult, CalculationError> {
        self.post(
            "household-impact",
            req,
            self.config.household_timeout_ms,
            self.config.household_fixture_json.as_deref(),
        )
    }

    /// Single-point benefit breakdown without the income sweep. Much faster
    /// than the full calculation; used for immediate feedback.
    pub fn compute_benefit_quick(
        &self,
        req: &HouseholdImpactRequest,
    ) -> Result<BenefitAtIncome, CalculationError> {
        self.post(
            "household-benefit-quick",
            req,
            self.config.quick_timeout_ms,
            self.config.quick_fixture_json.as_deref(),
        )
    }

    pub fn compute_aggregate_impact(
        &self,
        req: &AggregateImpactRequest,
    ) -> Result<AggregateImpactResult, CalculationError> {
        self.post(
            "aggregate-impact",
            req,
            self.config.aggregate_timeout_ms,
            self.config.aggregate_fixture_json.as_deref(),
        )
    }

    pub fn health(&self) -> Result<HealthReport, CalculationError> {
        self.get(
            "health",
            self.config.health_timeout_ms,
            self.config.health_fixture_json.as_deref(),
        )
    }

    pub fn dataset_summary(&self) -> Result<DatasetSummary, CalculationError> {
        self.get(
            "dataset-summary",
            self.config.health_timeout_ms,
            self.config.dataset_summary_fixture_json.as_deref(),
        )
    }

    fn post<B, T>(
        &self,
        operation: &str,
        body: &B,
        timeout_ms: u32,
        fixture_json: Option<&str>,
    ) -> Result<T, CalculationError>
    where
        B: serde::Serialize,
        T: serde::de::DeserializeOwned,
    {
        if let Some(fixture) = fixture_json {
            return decode_body(fixture);
        }
        let agent = build_http_agent(timeout_ms, &self.config.user_agent);
        let response = agent
            .post(&self.operation_url(operation))
            .set("Accept", "application/json")
            .send_json(body)
            .map_err(error_from_ureq)?;
        response
            .into_json::<T>()
            .map_err(|_| CalculationError::Transport { kind: "json_parse" })
    }

    fn get<T>(
        &self,
        operation: &str,
        timeout_ms: u32,
        fixture_json: Option<&str>,
    ) -> Result<T, CalculationError>
    where
        T: serde::de::DeserializeOwned,
    {
        if let Some(fixture) = fixture_json {
            return decode_body(fixture);
        }
        let agent = build_http_agent(timeout_ms, &self.config.user_agent);
        let response = agent
            .get(&self.operation_url(operation))
            .set("Accept", "application/json")
            .call()
            .map_err(error_from_ureq)?;
        response
            .into_json::<T>()
            .map_err(|_| CalculationError::Transport { kind: "json_parse" })
    }

    fn operation_url(&self, operation: &str) -> String {
        format!(
            "{}/api/{operation}",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

fn decode_body<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, CalculationError> {
    serde_json::from_str(raw).map_err(|_| CalculationError::Transport { kind: "json_parse" })
}

fn build_http_agent(timeout_ms: u32, user_agent: &str) -> ureq::Agent {
    let timeout = Duration::from_millis(u64::from(timeout_ms).max(100));
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_millis(u64::from(timeout_ms).clamp(100, 10_000)))
        .timeout_read(timeout)
        .timeout_write(timeout)
        .user_agent(user_agent)
        .build()
}

fn error_from_ureq(err: ureq::Error) -> CalculationError {
    match err {
        ureq::Error::Status(status, response) => {
            let detail = response
                .into_string()
                .ok()
                .and_then(|body| extract_remote_detail(&body));
            CalculationError::Remote { status, detail }
        }
        ureq::Error::Transport(transport) => {
            let combined = format!("{:?} {}", transport.kind(), transport);
            CalculationError::Transport {
                kind: classify_transport_error_kind(&combined),
            }
        }
    }
}

/// Backend error payloads carry `{"detail": "..."}`. Anything else (HTML
/// gateway pages, truncated bodies) yields `None` and the caller falls back
/// to a generic status message instead of surfacing a parse failure.
fn extract_remote_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}
