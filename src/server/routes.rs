//! HTTP route handlers.
//!
//! JSON in, JSON out. State is shared via `Arc<ServerState>`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::commands::CommandHandler;
use crate::engine::WagerEngine;
use crate::types::{Account, BetResult, LedgerError, StoreError};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct ServerState {
    pub engine: Arc<WagerEngine>,
    pub commands: CommandHandler,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(engine: Arc<WagerEngine>, commands: CommandHandler) -> Self {
        Self {
            engine,
            commands,
            started_at: Utc::now(),
        }
    }
}

pub type AppState = Arc<ServerState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BetRequest {
    pub user_id: String,
    pub bet_type: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub user_id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub user_id: String,
    pub balance: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub reply: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    pub retryable: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A ledger error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LedgerError::EmptyUserId
            | LedgerError::InvalidBetType(_)
            | LedgerError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            LedgerError::InsufficientFunds { .. } => StatusCode::CONFLICT,
            LedgerError::ConcurrencyExhausted { .. }
            | LedgerError::TimedOut { .. }
            | LedgerError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::Store(StoreError::Backend(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind().to_string(),
            retryable: self.0.is_retryable(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /
pub async fn index() -> &'static str {
    "Bot is running."
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

/// GET /api/balance/:user_id
pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.engine.get_balance(&user_id).await?;
    Ok(Json(BalanceResponse { user_id, balance }))
}

/// GET /api/accounts/:user_id
pub async fn get_account(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    Ok(match state.engine.account(&user_id).await? {
        Some(account) => Json::<Account>(account).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    })
}

/// POST /api/bet
pub async fn place_bet(
    State(state): State<AppState>,
    Json(req): Json<BetRequest>,
) -> Result<Json<BetResult>, ApiError> {
    let result = state
        .engine
        .place_bet(&req.user_id, &req.bet_type, req.amount)
        .await?;
    Ok(Json(result))
}

/// POST /api/command
pub async fn command(State(state): State<AppState>, Json(req): Json<CommandRequest>) -> Response {
    match state
        .commands
        .handle(&req.user_id, req.channel_id.as_deref(), &req.content)
        .await
    {
        Some(reply) => Json(CommandResponse { reply }).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Memory-backed state with a scripted wheel, shared by the server tests.
#[cfg(test)]
pub(crate) fn test_state(script: &[u8]) -> AppState {
    use crate::engine::{EngineConfig, ScriptedWheel};
    use crate::store::MemoryStore;

    let engine = Arc::new(WagerEngine::new(
        Arc::new(MemoryStore::new(1000)),
        Arc::new(ScriptedWheel::new(script.iter().copied()).unwrap()),
        EngineConfig::default(),
    ));
    let commands = CommandHandler::new(engine.clone(), "!g", None);
    Arc::new(ServerState::new(engine, commands))
}
