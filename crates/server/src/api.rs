//! JSON API routes for the conversational surface.
//!
//! - `POST /api/chat`     — send a message, creating a session if needed
//! - `POST /api/plan`     — preview the current definition against real state
//! - `POST /api/apply`    — execute the previewed change
//! - `GET  /api/sessions` — list sessions, most recently touched first
//!
//! Generated artifacts (definition files, diagrams) are served read-only
//! under `/generated_files/{session_id}/...`.

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use terraloom_core::{ApplicationError, Session, SessionId, Turn};

use crate::service::{ChatService, ServiceReply};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct TurnView {
    pub role: String,
    pub content: String,
}

impl From<&Turn> for TurnView {
    fn from(turn: &Turn) -> Self {
        Self {
            role: match turn.role {
                terraloom_core::Role::User => "user".to_string(),
                terraloom_core::Role::Assistant => "assistant".to_string(),
            },
            content: turn.content.clone(),
        }
    }
}

/// The full session snapshot every mutating endpoint returns, so clients
/// can redraw the code pane, diagram, and transcript from one response.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub title: String,
    pub response: String,
    pub last_intent: Option<String>,
    pub chat_answer: String,
    pub iac_code: String,
    pub iac_diagram_path: String,
    pub plan_output: String,
    pub apply_output: String,
    pub clarification_questions: Vec<String>,
    pub error_message: String,
    pub history: Vec<TurnView>,
}

impl SessionView {
    fn from_reply(reply: ServiceReply) -> Self {
        Self::from_session(&reply.session, reply.response)
    }

    fn from_session(session: &Session, response: String) -> Self {
        Self {
            session_id: session.id.0.clone(),
            title: session.title.clone(),
            response,
            last_intent: session.last_intent.map(|intent| intent.as_str().to_string()),
            chat_answer: session.chat_answer.clone(),
            iac_code: session.iac_code.clone(),
            iac_diagram_path: session.iac_diagram_path.clone(),
            plan_output: session.plan_output.clone(),
            apply_output: session.apply_output.clone(),
            clarification_questions: session.clarification_questions.clone(),
            error_message: session.error_message.clone(),
            history: session.history.iter().map(TurnView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionListEntry {
    pub session_id: String,
    pub title: String,
    pub last_modified: String,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

pub struct ApiError(ApplicationError);

impl From<ApplicationError> for ApiError {
    fn from(err: ApplicationError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ApplicationError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            err if err.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        } else {
            warn!(error = %self.0, "request rejected");
        }
        (status, Json(ApiErrorBody { error: self.0.to_string() })).into_response()
    }
}

pub fn router(service: Arc<ChatService>, generated_dir: &Path) -> Router {
    Router::new()
        .route("/api/chat", post(send_message))
        .route("/api/plan", post(compute_plan))
        .route("/api/apply", post(apply_plan))
        .route("/api/sessions", get(list_sessions))
        .nest_service("/generated_files", ServeDir::new(generated_dir))
        .with_state(service)
}

async fn send_message(
    State(service): State<Arc<ChatService>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let session_id = request.session_id.map(SessionId);
    let reply = service.send_message(session_id, &request.message).await?;
    info!(session_id = %reply.session.id, "chat turn completed");
    Ok(Json(SessionView::from_reply(reply)))
}

async fn compute_plan(
    State(service): State<Arc<ChatService>>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let reply = service.compute_plan(SessionId(request.session_id)).await?;
    info!(session_id = %reply.session.id, "plan completed");
    Ok(Json(SessionView::from_reply(reply)))
}

async fn apply_plan(
    State(service): State<Arc<ChatService>>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let reply = service.apply_plan(SessionId(request.session_id)).await?;
    info!(session_id = %reply.session.id, "apply completed");
    Ok(Json(SessionView::from_reply(reply)))
}

async fn list_sessions(
    State(service): State<Arc<ChatService>>,
) -> Result<Json<Vec<SessionListEntry>>, ApiError> {
    let summaries = service.list_sessions().await?;
    let entries = summaries
        .into_iter()
        .map(|summary| SessionListEntry {
            session_id: summary.id.0,
            title: summary.title,
            last_modified: summary.last_modified.to_rfc3339(),
        })
        .collect();
    Ok(Json(entries))
}
