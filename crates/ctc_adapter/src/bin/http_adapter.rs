#![forbid(unsafe_code)]

use std::{env, net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use ctc_adapter::{
    AdapterHealthResponse, AdapterRuntime, AggregateImpactPayload, CalcAdapterResponse,
    HouseholdImpactPayload, RecalculateCheckRequest, RecalculateCheckResponse,
};
use ctc_contracts::aggregate::DatasetSummary;
use ctc_contracts::household::{AggregateImpactRequest, HouseholdImpactRequest};
use ctc_contracts::impact::BenefitAtIncome;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind = env::var("CTC_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8090".to_string());
    let addr: SocketAddr = bind.parse()?;

    let runtime = Arc::new(AdapterRuntime::default_from_env());
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/household-impact", post(household_impact))
        .route("/v1/benefit-quick", post(benefit_quick))
        .route("/v1/aggregate-impact", post(aggregate_impact))
        .route("/v1/recalculate-check", post(recalculate_check))
        .route("/v1/dataset-summary", get(dataset_summary))
        .with_state(runtime);

    println!("ctc_adapter_http listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn status_for<T>(response: &CalcAdapterResponse<T>) -> StatusCode {
    match response.outcome.as_str() {
        "OK" => StatusCode::OK,
        "REJECTED" => StatusCode::BAD_REQUEST,
        "INTERNAL_ERROR" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn task_failed<T>() -> CalcAdapterResponse<T> {
    CalcAdapterResponse::internal("calculation task failed".to_string())
}

async fn healthz(
    State(runtime): State<Arc<AdapterRuntime>>,
) -> (StatusCode, Json<AdapterHealthResponse>) {
    let report = tokio::task::spawn_blocking(move || runtime.health_report())
        .await
        .unwrap_or_else(|_| AdapterHealthResponse {
            status: "error".to_string(),
            outcome: "UNREACHABLE".to_string(),
            reason: Some("health probe task failed".to_string()),
            upstream: None,
        });
    let status = if report.status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(report))
}

async fn household_impact(
    State(runtime): State<Arc<AdapterRuntime>>,
    Json(request): Json<HouseholdImpactRequest>,
) -> (StatusCode, Json<CalcAdapterResponse<HouseholdImpactPayload>>) {
    let response = tokio::task::spawn_blocking(move || runtime.run_household_impact(request))
        .await
        .unwrap_or_else(|_| task_failed());
    if let Some(line) = response.failure_log_line("household") {
        eprintln!("{line}");
    }
    (status_for(&response), Json(response))
}

async fn benefit_quick(
    State(runtime): State<Arc<AdapterRuntime>>,
    Json(request): Json<HouseholdImpactRequest>,
) -> (StatusCode, Json<CalcAdapterResponse<BenefitAtIncome>>) {
    let response = tokio::task::spawn_blocking(move || runtime.run_benefit_quick(request))
        .await
        .unwrap_or_else(|_| task_failed());
    if let Some(line) = response.failure_log_line("benefit-quick") {
        eprintln!("{line}");
    }
    (status_for(&response), Json(response))
}

async fn aggregate_impact(
    State(runtime): State<Arc<AdapterRuntime>>,
    Json(request): Json<AggregateImpactRequest>,
) -> (StatusCode, Json<CalcAdapterResponse<AggregateImpactPayload>>) {
    let response = tokio::task::spawn_blocking(move || runtime.run_aggregate_impact(request))
        .await
        .unwrap_or_else(|_| task_failed());
    if let Some(line) = response.failure_log_line("aggregate") {
        eprintln!("{line}");
    }
    (status_for(&response), Json(response))
}

async fn recalculate_check(
    State(runtime): State<Arc<AdapterRuntime>>,
    Json(request): Json<RecalculateCheckRequest>,
) -> Result<Json<RecalculateCheckResponse>, (StatusCode, String)> {
    match runtime.run_recalculate_check(request) {
        Ok(response) => Ok(Json(response)),
        Err(reason) => Err((StatusCode::INTERNAL_SERVER_ERROR, reason)),
    }
}

async fn dataset_summary(
    State(runtime): State<Arc<AdapterRuntime>>,
) -> (StatusCode, Json<CalcAdapterResponse<DatasetSummary>>) {
    let response = tokio::task::spawn_blocking(move || runtime.dataset_summary())
        .await
        .unwrap_or_else(|_| task_failed());
    (status_for(&response), Json(response))
}
