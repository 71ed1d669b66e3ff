//! View projection.
//!
//! One pure function from session state (plus the cached recording list and
//! the wall clock) to a serializable [`ViewState`]. Rendering is strictly
//! one-directional: nothing here mutates the session, and front ends are
//! expected to redraw from this projection alone.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::backend::{Alert, ChatTurn, EmailType, RecordingSummary};
use crate::session::{Session, SessionPhase, TranscriptNotice};
use crate::sidebar::{group_recordings, SidebarGroup};

/// Follow-up question suggestions shown before (or instead of) the
/// classifier's picks.
pub const DEFAULT_PILLS: [&str; 3] = [
    "What are the key next steps?",
    "Any risks to flag?",
    "Who owns what?",
];

const PREVIEW_CHARS: usize = 80;

/// Which controls accept input right now.
#[derive(Debug, Clone, Serialize)]
pub struct Controls {
    pub record_enabled: bool,
    pub record_active: bool,
    pub summarize_enabled: bool,
    pub email_enabled: bool,
    pub chat_enabled: bool,
    pub quick_edit_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptPane {
    pub text: String,
    pub preview: String,
    pub word_count: usize,
    /// True while the text is the advisory live caption feed.
    pub live: bool,
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryPane {
    /// Raw markdown; rendering is the front end's concern.
    pub markdown: String,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailPane {
    pub text: String,
    pub email_type: EmailType,
    pub loading: bool,
    pub error: Option<String>,
    pub tools_visible: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatPane {
    pub thread: Vec<ChatTurn>,
    pub pending_question: Option<String>,
    pub error: Option<String>,
    pub pills: Vec<String>,
}

/// The complete render model served to front ends.
#[derive(Debug, Clone, Serialize)]
pub struct ViewState {
    pub phase: SessionPhase,
    pub timer: String,
    pub active_recording_id: Option<String>,
    pub controls: Controls,
    pub transcript: TranscriptPane,
    pub summary: SummaryPane,
    pub email: EmailPane,
    pub chat: ChatPane,
    pub alerts: Vec<Alert>,
    pub sidebar: Vec<SidebarGroup>,
}

/// `MM:SS` elapsed display.
pub fn format_timer(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn preview_of(text: &str) -> String {
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        preview.push('…');
    }
    preview
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn notice_text(notice: &TranscriptNotice) -> String {
    match notice {
        TranscriptNotice::NoSpeech => "No speech detected".to_string(),
        TranscriptNotice::TranscriptionFailed { message } => {
            format!("Transcription failed: {message}")
        }
    }
}

/// Project the session into its render model.
pub fn project(
    session: &Session,
    recordings: &[RecordingSummary],
    now: DateTime<Local>,
) -> ViewState {
    let has_transcript = !session.transcript.is_empty();
    let recording = session.phase == SessionPhase::Recording;

    let controls = Controls {
        record_enabled: session.phase != SessionPhase::Transcribing,
        record_active: recording,
        summarize_enabled: has_transcript && !session.in_flight.summarize,
        email_enabled: has_transcript && !session.in_flight.email,
        chat_enabled: has_transcript && !session.in_flight.chat,
        quick_edit_enabled: !session.email_draft.is_empty() && !session.in_flight.email,
    };

    let transcript_text = if recording {
        session.live.render()
    } else {
        session.transcript.clone()
    };

    let transcript = TranscriptPane {
        preview: preview_of(&transcript_text),
        word_count: word_count(&transcript_text),
        live: recording,
        notice: session.notice.as_ref().map(notice_text),
        text: transcript_text,
    };

    let summary = SummaryPane {
        markdown: session.summary.clone(),
        loading: session.in_flight.summarize,
        error: session.summary_error.clone(),
    };

    let email = EmailPane {
        text: session.email_draft.clone(),
        email_type: session.email_type,
        loading: session.in_flight.email,
        error: session.email_error.clone(),
        tools_visible: !session.email_draft.is_empty(),
    };

    let pills = if has_transcript {
        session
            .classification
            .as_ref()
            .filter(|c| !c.pills.is_empty())
            .map(|c| c.pills.clone())
            .unwrap_or_else(|| DEFAULT_PILLS.iter().map(|p| p.to_string()).collect())
    } else {
        Vec::new()
    };

    let chat = ChatPane {
        thread: session.chat_history.clone(),
        pending_question: session.pending_question.clone(),
        error: session.chat_error.clone(),
        pills,
    };

    let alerts = session
        .classification
        .as_ref()
        .map(|c| c.alerts.clone())
        .unwrap_or_default();

    ViewState {
        phase: session.phase,
        timer: format_timer(session.elapsed_seconds()),
        active_recording_id: session.recording_id.clone(),
        controls,
        transcript,
        summary,
        email,
        chat,
        alerts,
        sidebar: group_recordings(recordings, session.recording_id.as_deref(), now),
    }
}
