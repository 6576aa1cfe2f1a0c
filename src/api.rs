use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::engine::InvestigationEngine;
use crate::error::EngineError;
use crate::state::{AgentState, UploadedData};

pub struct AppState {
    pub engine: InvestigationEngine,
    pub config: AppConfig,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/query", post(submit_query))
        .route("/sessions/{id}/resume", post(resume_session))
        .with_state(state)
}

pub async fn run_server(state: Arc<AppState>) -> std::io::Result<()> {
    let bind_addr = state.config.server.bind_addr.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("API Server listening on {}", bind_addr);
    axum::serve(listener, app).await
}

#[derive(Deserialize)]
struct QueryBody {
    query: String,
    #[serde(default)]
    uploaded_data: Vec<UploadedData>,
}

#[derive(Deserialize)]
struct ResumeBody {
    input: String,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tiers: Vec<_> = state
        .config
        .tiers
        .iter()
        .map(|t| json!({"name": t.name, "kind": format!("{:?}", t.kind).to_lowercase()}))
        .collect();
    Json(json!({"status": "ok", "tiers": tiers}))
}

async fn create_session() -> impl IntoResponse {
    let session_id = uuid::Uuid::new_v4().to_string();
    info!("🆕 [API] Session {} created", session_id);
    (StatusCode::CREATED, Json(json!({"session_id": session_id})))
}

async fn submit_query(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<QueryBody>,
) -> impl IntoResponse {
    match state.engine.run(&id, &body.query, body.uploaded_data).await {
        Ok(agent_state) => session_view(&agent_state).into_response(),
        Err(e) => engine_error(e).into_response(),
    }
}

async fn resume_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ResumeBody>,
) -> impl IntoResponse {
    match state.engine.resume(&id, &body.input).await {
        Ok(agent_state) => session_view(&agent_state).into_response(),
        Err(e) => engine_error(e).into_response(),
    }
}

async fn get_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    match state.engine.get_state(&id).await {
        Ok(Some(agent_state)) => session_view(&agent_state).into_response(),
        Ok(None) => engine_error(EngineError::SessionNotFound(id)).into_response(),
        Err(e) => engine_error(e).into_response(),
    }
}

/// The reply a client shows the user, plus the full state for inspection.
fn session_view(state: &AgentState) -> Json<serde_json::Value> {
    Json(json!({
        "session_id": state.session_id,
        "phase": state.current_phase,
        "response": state.investigation_context.last_response,
        "waiting_for_input": state.is_waiting_for_input(),
        "confidence": state.confidence_score,
        "pending_confirmation": state.investigation_context.pending_confirmation,
        "state": state,
    }))
}

fn engine_error(e: EngineError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &e {
        EngineError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        EngineError::Store(_) => {
            error!("❌ [API] {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({"error": e.to_string()})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn test_error_status_mapping() {
        let (status, _) = engine_error(EngineError::SessionNotFound("x".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = engine_error(EngineError::InvalidInput("empty".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = engine_error(EngineError::Store(StoreError::Backend("down".into())));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_session_view_shape() {
        let state = AgentState::new("s-1", "disk is full");
        let Json(view) = session_view(&state);
        assert_eq!(view["session_id"], "s-1");
        assert_eq!(view["phase"], "triage");
        assert_eq!(view["waiting_for_input"], false);
        assert_eq!(view["state"]["user_query"], "disk is full");
    }
}
