//! Meeting backend contract.
//!
//! Every remote operation the session depends on (transcription, the
//! recording store, the AI artifact generators) sits behind the
//! [`MeetingBackend`] trait. The service only cares about the
//! request/response shapes; the backend's internals are opaque.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::AudioClip;

mod http;

pub use http::HttpBackend;

/// Failure of a backend call.
///
/// A response body carrying an `error` field counts as a failure even when
/// the HTTP status is 200; the API reports most errors that way.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend reported an error, or a success field was missing.
    #[error("{0}")]
    Api(String),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Email flavor for draft generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    Customer,
    SalesFollowup,
    Team,
    TeamUpdate,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::SalesFollowup => "sales_followup",
            Self::Team => "team",
            Self::TeamUpdate => "team_update",
        }
    }

    /// Map an analyze `email_default` value; unknown values fall back to
    /// `customer`.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "sales_followup" => Self::SalesFollowup,
            "team" => Self::Team,
            "team_update" => Self::TeamUpdate,
            _ => Self::Customer,
        }
    }
}

impl Default for EmailType {
    fn default() -> Self {
        Self::Customer
    }
}

/// Regeneration style for an existing draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStyle {
    Shorter,
    Longer,
    Retry,
    Casual,
    Professional,
    Urgent,
    TeamUpdate,
}

impl EmailStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shorter => "shorter",
            Self::Longer => "longer",
            Self::Retry => "retry",
            Self::Casual => "casual",
            Self::Professional => "professional",
            Self::Urgent => "urgent",
            Self::TeamUpdate => "team_update",
        }
    }
}

/// One signal badge surfaced by the analyze call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// `urgent`, `positive`, `risk` or `insight`; unknown kinds render as
    /// insights.
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// Result of transcript analysis: meeting type, suggested email flavor,
/// follow-up question pills and alert badges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub meeting_type: String,
    pub email_default: String,
    #[serde(default)]
    pub pills: Vec<String>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

impl Classification {
    pub fn default_email_type(&self) -> EmailType {
        EmailType::from_wire(&self.email_default)
    }
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One chat message, as stored in the session and sent as history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A recording as it appears in the listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub duration: u64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Full persisted fields of one recording.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingDetail {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub email: String,
}

/// The remote collaborator set: transcription, recording store, and the
/// AI artifact generators. All calls are single-shot; retry is always
/// user-initiated.
#[async_trait]
pub trait MeetingBackend: Send + Sync {
    /// Submit finished audio for transcription. Returns the transcript
    /// text, which may be empty when no speech was detected.
    async fn transcribe(&self, clip: AudioClip) -> Result<String, BackendError>;

    /// Persist a new recording; returns its id.
    async fn save_recording(&self, transcript: &str, duration: u64) -> Result<String, BackendError>;

    /// Classify the transcript (meeting type, email default, pills, alerts).
    async fn analyze(&self, transcript: &str) -> Result<Classification, BackendError>;

    /// Best-effort: ask the backend to name a saved recording.
    async fn generate_name(&self, id: &str, transcript: &str) -> Result<String, BackendError>;

    async fn list_recordings(&self) -> Result<Vec<RecordingSummary>, BackendError>;

    async fn get_recording(&self, id: &str) -> Result<RecordingDetail, BackendError>;

    async fn delete_recording(&self, id: &str) -> Result<(), BackendError>;

    async fn rename_recording(&self, id: &str, name: &str) -> Result<(), BackendError>;

    async fn summarize(&self, transcript: &str) -> Result<String, BackendError>;

    async fn draft_email(
        &self,
        transcript: &str,
        summary: &str,
        email_type: EmailType,
    ) -> Result<String, BackendError>;

    async fn regenerate_email(
        &self,
        transcript: &str,
        summary: &str,
        current_email: &str,
        style: EmailStyle,
    ) -> Result<String, BackendError>;

    async fn quick_edit_email(
        &self,
        current_email: &str,
        instruction: &str,
    ) -> Result<String, BackendError>;

    async fn chat(
        &self,
        question: &str,
        transcript: &str,
        history: &[ChatTurn],
        summary: &str,
    ) -> Result<String, BackendError>;
}
