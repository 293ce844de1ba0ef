// Credit Ledger Gateway - HTTP binding for the ledger core
// Routes transaction and statement requests to the per-account actors

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use ledger_core::{Ledger, TransactionRequest};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod metrics;
pub mod models;
pub mod server;

use error::GatewayError;
use metrics::Metrics;
use models::{HealthResponse, StatementResponse, TransactionBody, TransactionResponse};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>) -> anyhow::Result<Self> {
        Ok(Self {
            ledger,
            metrics: Arc::new(Metrics::new()?),
        })
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/clientes/:id/transacoes", post(create_transaction))
        .route("/clientes/:id/extrato", get(get_statement))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn_with_state(state.clone(), track_http))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_account_id(raw: &str) -> Option<i64> {
    raw.parse().ok()
}

// POST /clientes/:id/transacoes
async fn create_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<TransactionResponse>, GatewayError> {
    let body: TransactionBody = serde_json::from_slice(&body)?;
    let request = TransactionRequest::from(body);

    let Some(raw_id) = parse_account_id(&id) else {
        // Input errors still take precedence over the unknown account
        request.validate()?;
        return Err(GatewayError::UnknownPath(id));
    };

    let result = state.ledger.apply(raw_id, request).await;
    state.metrics.track_transaction(&result);

    Ok(Json(result?.into()))
}

// GET /clientes/:id/extrato
async fn get_statement(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatementResponse>, GatewayError> {
    let raw_id = parse_account_id(&id).ok_or(GatewayError::UnknownPath(id))?;

    let result = state.ledger.statement(raw_id).await;
    state.metrics.track_statement(&result);

    Ok(Json(result?.into()))
}

// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: state.ledger.config().service_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        accounts: state.ledger.account_ids().len(),
    })
}

// Prometheus metrics endpoint
async fn metrics_handler(State(state): State<AppState>) -> Result<String, GatewayError> {
    state
        .metrics
        .export()
        .map_err(|e| GatewayError::InternalError(format!("Failed to export metrics: {}", e)))
}

async fn track_http(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start = std::time::Instant::now();
    state.metrics.http_requests_total.inc();
    let _in_flight = state.metrics.in_flight();

    let response = next.run(request).await;

    state
        .metrics
        .http_request_duration_seconds
        .observe(start.elapsed().as_secs_f64());
    response
}
