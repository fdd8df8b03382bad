//! REST surface for the onboarding engine.
//!
//! Consumed by the presentation layer: create a session, post turns,
//! inspect safe state, and fetch the final record once complete.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::engine::node::NodeId;
use crate::engine::{Engine, TurnOutcome};
use crate::error::{Error, SessionError};
use crate::normalize::{QuickReply, StepResult};
use crate::session::model::Session;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

/// Build the Axum router.
pub fn routes(engine: Arc<Engine>) -> Router {
    let state = AppState { engine };

    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}/turns", post(post_turn))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/result", get(get_result))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub message: String,
}

/// One turn's worth of output: every StepResult the chain produced, plus
/// the effective options after inheritance.
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub session_id: Uuid,
    pub node: NodeId,
    pub steps: Vec<StepResult>,
    pub options: Vec<QuickReply>,
    pub completed: bool,
    pub state: SessionView,
}

/// JSON-safe session view (transcript omitted).
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub current_node: NodeId,
    pub turn_counter: u64,
    pub business_name: String,
    pub abn: String,
    pub business_verified: bool,
    pub licence_classes: Vec<String>,
    pub services: Vec<crate::normalize::ServiceSelection>,
    pub services_confirmed: bool,
    pub coverage: Option<crate::geo::CoverageArea>,
    pub coverage_confirmed: bool,
    pub plan: Option<crate::normalize::PlanChoice>,
    pub completed: bool,
}

impl SessionView {
    fn from_session(session: &Session) -> Self {
        let facts = &session.facts;
        let identity = facts.confirmed_identity();
        Self {
            session_id: session.id,
            current_node: session.current_node,
            turn_counter: session.turn_counter,
            business_name: identity.map(|i| i.business_name.clone()).unwrap_or_default(),
            abn: identity.map(|i| i.abn.clone()).unwrap_or_default(),
            business_verified: facts.identity.as_ref().is_some_and(|i| i.verified),
            licence_classes: facts
                .enrichment
                .as_ref()
                .map(|e| e.licence_classes())
                .unwrap_or_default(),
            services: facts
                .services
                .as_ref()
                .map(|s| s.services.clone())
                .unwrap_or_default(),
            services_confirmed: facts.services.as_ref().is_some_and(|s| s.confirmed),
            coverage: facts.coverage.as_ref().and_then(|c| c.area.clone()),
            coverage_confirmed: facts.coverage.as_ref().is_some_and(|c| c.confirmed),
            plan: facts.plan.as_ref().map(|p| p.choice.clone()),
            completed: session.completed,
        }
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "sessions": state.engine.store().count().await,
    }))
}

async fn create_session(State(state): State<AppState>) -> Result<Json<TurnResponse>, ApiError> {
    let outcome = state.engine.create_session().await?;
    turn_response(&state, outcome).await
}

async fn post_turn(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let outcome = state.engine.post_turn(id, &request.message).await?;
    turn_response(&state, outcome).await
}

async fn turn_response(
    state: &AppState,
    outcome: TurnOutcome,
) -> Result<Json<TurnResponse>, ApiError> {
    let session = state.engine.session_snapshot(outcome.session_id).await?;
    Ok(Json(TurnResponse {
        session_id: outcome.session_id,
        node: outcome.node,
        steps: outcome.results,
        options: outcome.options,
        completed: outcome.completed,
        state: SessionView::from_session(&session),
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state.engine.session_snapshot(id).await?;
    Ok(Json(SessionView::from_session(&session)))
}

async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state.engine.final_output(id).await?;
    Ok(Json(match record {
        Some(record) => serde_json::json!({
            "status": "complete",
            "result": record,
        }),
        None => serde_json::json!({
            "status": "in_progress",
            "result": null,
        }),
    }))
}

/// Error-to-status mapping for the surface.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self.0 {
            Error::Session(SessionError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "Session not found".to_string())
            }
            Error::Geo(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            other => {
                tracing::error!(error = %other, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
