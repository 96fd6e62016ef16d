// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api`. Webhook ingestion and every `GET` read
// surface are unauthenticated (the charting platform calling the webhook
// never carries a bearer token); mutating control endpoints are gated by
// `AuthBearer`.
//
// CORS is configured permissively, matching spec's "CORS permits all
// origins".
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::error::EngineError;
use crate::ingress;
use crate::journal::LogLevel;
use crate::types::Environment;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/webhook/tradingview", post(webhook_tradingview))
        .route("/api/webhook/re-execute", post(webhook_re_execute))
        .route("/api/status", get(status))
        .route("/api/logs", get(get_logs))
        .route("/api/logs", delete(clear_logs))
        .route("/api/webhooks", get(get_webhooks))
        .route("/api/responses", get(get_responses))
        .route("/api/strategies", get(list_strategies))
        .route("/api/strategies/ids", get(list_strategy_ids))
        .route("/api/strategies/:id", get(get_strategy))
        .route("/api/strategies/:id/toggle", post(toggle_strategy))
        .route("/api/environment", get(get_environment))
        .route("/api/environment", post(set_environment))
        .route("/api/restart", post(restart))
        .route("/api/reset-uptime-stats", post(reset_uptime_stats))
        .route("/api/orders/history", get(orders_history))
        .route("/api/orders/open", get(orders_open))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Webhooks
// =============================================================================

async fn webhook_tradingview(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<ingress::IngressResponse>, EngineError> {
    let response = ingress::handle_signal(&state, payload).await?;
    Ok(Json(response))
}

#[derive(Deserialize)]
struct ReExecuteRequest {
    dispatch_id: Uuid,
}

async fn webhook_re_execute(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReExecuteRequest>,
) -> Result<Json<ingress::IngressResponse>, EngineError> {
    let webhooks = state.journal.recent_webhooks(10_000, None).await?;
    let original = webhooks
        .into_iter()
        .find(|entry| entry.dispatch_id == Some(req.dispatch_id))
        .ok_or_else(|| EngineError::InvalidSignal(format!("no webhook journaled with dispatch_id {}", req.dispatch_id)))?;

    let payload = match original.kind {
        crate::journal::JournalKind::WebhookReceived { payload, .. } => payload,
        _ => return Err(EngineError::InvalidSignal("journal entry is not a webhook record".to_string())),
    };

    let response = ingress::handle_signal(&state, payload).await?;
    Ok(Json(response))
}

// =============================================================================
// Status
// =============================================================================

#[derive(Serialize, Default)]
struct Statistics {
    total_webhooks: u64,
    successful_forwards: u64,
    failed_forwards: u64,
    success_rate: f64,
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    environment: String,
    uptime: u64,
    balance: Option<String>,
    wallet_address: Option<String>,
    hyperliquid_connected: bool,
    statistics: Statistics,
    uptime_monitoring: crate::uptime::UptimeSnapshot,
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let wallet_address = match state.account().resolve().await {
        Ok(addr) => Some(addr),
        Err(e) => {
            warn!(error = %e, "status: account resolution failed");
            None
        }
    };

    let balance = if wallet_address.is_some() {
        match state.balance_cache().get().await {
            Ok(equity) => Some(equity.to_string()),
            Err(e) => {
                warn!(error = %e, "status: balance fetch failed");
                None
            }
        }
    } else {
        None
    };

    let mut statistics = Statistics::default();
    for strategy in state.strategies.list().values() {
        statistics.total_webhooks += strategy.stats.total_webhooks;
        statistics.successful_forwards += strategy.stats.successful_forwards;
        statistics.failed_forwards += strategy.stats.failed_forwards;
    }
    statistics.success_rate = if statistics.total_webhooks == 0 {
        100.0
    } else {
        (statistics.successful_forwards as f64 / statistics.total_webhooks as f64) * 100.0
    };

    let response = StatusResponse {
        status: "ok",
        environment: state.environment().to_string(),
        uptime: state.uptime_seconds(),
        balance,
        hyperliquid_connected: wallet_address.is_some(),
        wallet_address,
        statistics,
        uptime_monitoring: state.uptime.snapshot(),
    };

    Json(response)
}

// =============================================================================
// Logs
// =============================================================================

#[derive(Deserialize)]
struct LogsQuery {
    #[serde(default = "default_limit")]
    limit: usize,
    level: Option<String>,
}

fn default_limit() -> usize {
    100
}

async fn get_logs(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LogsQuery>,
) -> Result<impl IntoResponse, EngineError> {
    let level = q
        .level
        .map(|s| match s.to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(EngineError::InvalidSignal(format!("unknown log level '{other}'"))),
        })
        .transpose()?;

    let logs = state.journal.recent_logs(q.limit, level).await?;
    Ok(Json(logs))
}

async fn clear_logs(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, EngineError> {
    let deleted_count = state.journal.clear_logs().await?;
    Ok(Json(serde_json::json!({ "deleted_count": deleted_count })))
}

// =============================================================================
// Webhooks / responses (journal reads)
// =============================================================================

#[derive(Deserialize)]
struct JournalQuery {
    #[serde(default = "default_limit")]
    limit: usize,
    strategy_ids: Option<String>,
}

fn parse_strategy_ids(raw: Option<String>) -> Option<Vec<String>> {
    raw.map(|csv| csv.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
}

async fn get_webhooks(
    State(state): State<Arc<AppState>>,
    Query(q): Query<JournalQuery>,
) -> Result<impl IntoResponse, EngineError> {
    let entries = state.journal.recent_webhooks(q.limit, parse_strategy_ids(q.strategy_ids)).await?;
    Ok(Json(serde_json::json!({ "webhooks": entries })))
}

async fn get_responses(
    State(state): State<Arc<AppState>>,
    Query(q): Query<JournalQuery>,
) -> Result<impl IntoResponse, EngineError> {
    let entries = state.journal.recent_responses(q.limit, parse_strategy_ids(q.strategy_ids)).await?;
    Ok(Json(serde_json::json!({ "responses": entries })))
}

// =============================================================================
// Strategies
// =============================================================================

async fn list_strategies(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.strategies.list())
}

async fn list_strategy_ids(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.strategies.list_ids())
}

async fn get_strategy(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    match state.strategies.get(&id) {
        Some(strategy) => Json(strategy).into_response(),
        None => (StatusCode::NOT_FOUND, format!("unknown strategy id '{id}'")).into_response(),
    }
}

async fn toggle_strategy(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, EngineError> {
    let updated = state.strategies.toggle(&id).await?;
    Ok(Json(updated))
}

// =============================================================================
// Environment
// =============================================================================

async fn get_environment(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "environment": state.environment().to_string() }))
}

#[derive(Deserialize)]
struct EnvironmentQuery {
    environment: String,
}

async fn set_environment(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Query(q): Query<EnvironmentQuery>,
) -> Result<impl IntoResponse, EngineError> {
    let environment: Environment = q.environment.parse().map_err(EngineError::Configuration)?;
    state.switch_environment(environment)?;
    state.account().invalidate();
    info!(environment = %environment, "environment switched");
    Ok(Json(serde_json::json!({ "environment": environment.to_string() })))
}

// =============================================================================
// Restart / uptime reset
// =============================================================================

async fn restart(_auth: AuthBearer) -> impl IntoResponse {
    warn!("graceful restart requested via admin API");
    tokio::spawn(async {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        std::process::exit(0);
    });
    Json(serde_json::json!({ "status": "restarting" }))
}

async fn reset_uptime_stats(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.uptime.reset(Utc::now());
    Json(state.uptime.snapshot())
}

// =============================================================================
// Orders (pass-through)
// =============================================================================

async fn orders_history(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, EngineError> {
    let master = state.account().resolve().await?;
    let orders = state
        .venue()
        .order_history(&master)
        .await
        .map_err(|e| EngineError::Connectivity(e.to_string()))?;
    Ok(Json(
        orders
            .into_iter()
            .map(|o| {
                serde_json::json!({
                    "order_id": o.order_id,
                    "symbol": o.symbol,
                    "side": o.side.to_string(),
                    "size": o.size.to_string(),
                    "price": o.price.to_string(),
                    "status": o.status,
                })
            })
            .collect::<Vec<_>>(),
    ))
}

async fn orders_open(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, EngineError> {
    let master = state.account().resolve().await?;
    let orders = state
        .venue()
        .open_orders(&master)
        .await
        .map_err(|e| EngineError::Connectivity(e.to_string()))?;
    Ok(Json(
        orders
            .into_iter()
            .map(|o| {
                serde_json::json!({
                    "order_id": o.order_id,
                    "symbol": o.symbol,
                    "side": o.side.to_string(),
                    "size": o.size.to_string(),
                    "price": o.price.to_string(),
                    "status": o.status,
                })
            })
            .collect::<Vec<_>>(),
    ))
}
