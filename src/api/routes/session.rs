//! Session control endpoints.
//!
//! User actions are forwarded to the machine's command loop over an mpsc
//! channel; handlers then wait briefly and answer with the refreshed view
//! projection so the front end can redraw from the response alone.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};

use super::super::error::{ApiError, ApiResult};
use chrono::Local;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::audio::LiveFragment;
use crate::backend::{EmailStyle, EmailType};
use crate::session::SessionHandle;
use crate::sidebar::SidebarHandle;
use crate::view::{project, ViewState};

/// Commands forwarded to the session machine.
#[derive(Debug, Clone)]
pub enum ApiCommand {
    ToggleRecording,
    Summarize,
    DraftEmail { email_type: Option<EmailType> },
    RegenerateEmail { style: EmailStyle },
    QuickEditEmail { instruction: String },
    SelectEmailType { email_type: EmailType },
    CopyEmail,
    Chat { question: String },
    LiveCaption(LiveFragment),
    NewSession,
    LoadRecording { id: String },
    DeleteRecording { id: String },
    RenameRecording { id: String, name: String },
    RefreshRecordings,
}

/// Shared state for session routes.
#[derive(Clone)]
pub struct SessionState {
    pub tx: mpsc::Sender<ApiCommand>,
    pub session: SessionHandle,
    pub sidebar: SidebarHandle,
}

impl SessionState {
    /// Send a command to the machine and wait a beat for it to apply, then
    /// return the refreshed projection.
    async fn dispatch(&self, command: ApiCommand) -> ApiResult<Json<ViewState>> {
        match self.tx.send(command).await {
            Ok(_) => {
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                Ok(self.view().await)
            }
            Err(e) => {
                error!("Failed to send command to session machine: {}", e);
                Err(ApiError::internal("session machine is not running"))
            }
        }
    }

    async fn view(&self) -> Json<ViewState> {
        let session = self.session.get().await;
        let recordings = self.sidebar.get().await;
        Json(project(&session, &recordings, Local::now()))
    }
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct DraftRequest {
    pub email_type: Option<EmailType>,
}

#[derive(Debug, serde::Deserialize)]
pub struct RegenerateRequest {
    pub style: EmailStyle,
}

#[derive(Debug, serde::Deserialize)]
pub struct QuickEditRequest {
    pub instruction: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct EmailTypeRequest {
    pub email_type: EmailType,
}

#[derive(Debug, serde::Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

pub fn router(state: SessionState) -> Router {
    Router::new()
        .route("/session/view", get(session_view))
        .route("/session/status", get(session_status))
        .route("/session/record", post(toggle_recording))
        .route("/session/live", post(live_caption))
        .route("/session/summarize", post(summarize))
        .route("/session/email", post(draft_email))
        .route("/session/email/regenerate", post(regenerate_email))
        .route("/session/email/quick-edit", post(quick_edit_email))
        .route("/session/email/type", post(select_email_type))
        .route("/session/email/copy", post(copy_email))
        .route("/session/chat", post(chat))
        .route("/session/new", post(new_session))
        .with_state(state)
}

async fn session_view(State(state): State<SessionState>) -> Json<ViewState> {
    state.view().await
}

async fn session_status(State(state): State<SessionState>) -> Json<Value> {
    let session = state.session.get().await;
    Json(json!({
        "phase": session.phase.as_str(),
        "recording": session.phase == crate::session::SessionPhase::Recording,
        "elapsed_seconds": session.elapsed_seconds(),
        "recording_id": session.recording_id,
    }))
}

async fn toggle_recording(
    State(state): State<SessionState>,
) -> ApiResult<Json<ViewState>> {
    info!("Recording toggle requested via API");
    state.dispatch(ApiCommand::ToggleRecording).await
}

async fn live_caption(
    State(state): State<SessionState>,
    Json(fragment): Json<LiveFragment>,
) -> ApiResult<StatusCode> {
    // High-frequency and advisory: fire-and-forget, no view in response.
    state
        .tx
        .send(ApiCommand::LiveCaption(fragment))
        .await
        .map_err(|_| ApiError::internal("session machine is not running"))?;
    Ok(StatusCode::ACCEPTED)
}

async fn summarize(State(state): State<SessionState>) -> ApiResult<Json<ViewState>> {
    info!("Summarize requested via API");
    state.dispatch(ApiCommand::Summarize).await
}

async fn draft_email(
    State(state): State<SessionState>,
    body: Option<Json<DraftRequest>>,
) -> ApiResult<Json<ViewState>> {
    let email_type = body.and_then(|Json(req)| req.email_type);
    info!("Email draft requested via API ({:?})", email_type);
    state.dispatch(ApiCommand::DraftEmail { email_type }).await
}

async fn regenerate_email(
    State(state): State<SessionState>,
    Json(req): Json<RegenerateRequest>,
) -> ApiResult<Json<ViewState>> {
    info!("Email regeneration requested via API ({})", req.style.as_str());
    state
        .dispatch(ApiCommand::RegenerateEmail { style: req.style })
        .await
}

async fn quick_edit_email(
    State(state): State<SessionState>,
    Json(req): Json<QuickEditRequest>,
) -> ApiResult<Json<ViewState>> {
    state
        .dispatch(ApiCommand::QuickEditEmail {
            instruction: req.instruction,
        })
        .await
}

async fn select_email_type(
    State(state): State<SessionState>,
    Json(req): Json<EmailTypeRequest>,
) -> ApiResult<Json<ViewState>> {
    state
        .dispatch(ApiCommand::SelectEmailType {
            email_type: req.email_type,
        })
        .await
}

async fn copy_email(State(state): State<SessionState>) -> ApiResult<Json<ViewState>> {
    state.dispatch(ApiCommand::CopyEmail).await
}

async fn chat(
    State(state): State<SessionState>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ViewState>> {
    state
        .dispatch(ApiCommand::Chat {
            question: req.question,
        })
        .await
}

async fn new_session(State(state): State<SessionState>) -> ApiResult<Json<ViewState>> {
    info!("New session requested via API");
    state.dispatch(ApiCommand::NewSession).await
}
