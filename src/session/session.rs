//! The session working set and its transition function.
//!
//! One [`Session`] exists per service instance. Every user action and every
//! collaborator outcome is expressed as a [`SessionEvent`] and funneled
//! through [`Session::apply`]; there is no other mutation path. The
//! [`SessionHandle`] shares the session between the machine, spawned
//! collaborator tasks and API handlers; responses from spawned tasks go
//! through [`SessionHandle::apply_if_current`], which discards anything
//! tagged with a superseded generation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::audio::{LiveFragment, LiveTranscript};
use crate::backend::{ChatTurn, Classification, EmailType, RecordingDetail};

use super::phase::SessionPhase;

/// Outcome notice for the transcript pane, distinct from the phase.
///
/// An empty transcription leaves the session usable but with nothing to act
/// on; a failed one additionally invites an immediate retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptNotice {
    NoSpeech,
    TranscriptionFailed { message: String },
}

/// Per-artifact in-flight request flags. While a flag is set the triggering
/// control is disabled, so requests on one channel are serialized; separate
/// channels may overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InFlight {
    pub summarize: bool,
    pub email: bool,
    pub chat: bool,
}

/// A user action rejected by the transition function.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot {action} while {phase:?}")]
    InvalidPhase {
        action: &'static str,
        phase: SessionPhase,
    },

    #[error("no transcript available")]
    NoTranscript,

    #[error("no email draft to revise")]
    NoDraft,

    #[error("question is empty")]
    EmptyQuestion,

    #[error("a {channel} request is already in flight")]
    RequestInFlight { channel: &'static str },
}

/// Everything that can happen to a session: user intents and collaborator
/// outcomes. Intents are guarded and can be rejected; outcomes are applied
/// tolerantly (an outcome for a request that is no longer pending is a
/// no-op).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    RecordingStarted,
    RecordingStopped { elapsed_seconds: u64 },
    TranscriptReceived { text: String },
    TranscriptEmpty,
    TranscriptFailed { message: String },
    RecordingSaved { id: String },
    Classified { classification: Classification },
    SummarizeRequested,
    SummaryReceived { summary: String },
    SummaryFailed { message: String },
    DraftRequested { email_type: Option<EmailType> },
    RegenerateRequested,
    QuickEditRequested,
    DraftReceived { email: String },
    DraftFailed { message: String },
    ChatSent { question: String },
    ChatAnswered { answer: String },
    ChatFailed { message: String },
    EmailTypeSelected { email_type: EmailType },
    LiveCaption(LiveFragment),
    RecordingLoaded { id: String, detail: RecordingDetail },
    Reset,
}

/// The active working set for one meeting.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Staleness token. Bumped on every start, load and reset; collaborator
    /// responses tagged with an older generation are discarded.
    pub generation: u64,
    pub recording_id: Option<String>,
    pub phase: SessionPhase,
    pub transcript: String,
    pub live: LiveTranscript,
    pub summary: String,
    pub email_draft: String,
    pub email_type: EmailType,
    pub chat_history: Vec<ChatTurn>,
    /// User chat message awaiting its answer. Promoted into `chat_history`
    /// as a pair on success, dropped on failure.
    pub pending_question: Option<String>,
    pub classification: Option<Classification>,
    pub started_at: Option<DateTime<Utc>>,
    recorded_seconds: u64,
    pub in_flight: InFlight,
    pub notice: Option<TranscriptNotice>,
    pub summary_error: Option<String>,
    pub email_error: Option<String>,
    pub chat_error: Option<String>,
}

impl Session {
    /// Seconds recorded so far: live while recording, frozen afterwards.
    pub fn elapsed_seconds(&self) -> u64 {
        if self.phase == SessionPhase::Recording {
            if let Some(started) = self.started_at {
                return (Utc::now() - started).num_seconds().max(0) as u64;
            }
        }
        self.recorded_seconds
    }

    /// Phase once all pending artifact work on this session settles,
    /// derived from the artifacts present. Completion never regresses the
    /// phase: a summary landing next to an existing draft stays `Drafted`.
    fn settled_phase(&self) -> SessionPhase {
        if self.transcript.is_empty() {
            return SessionPhase::Idle;
        }
        if self.in_flight.email {
            return SessionPhase::Drafting;
        }
        if !self.email_draft.is_empty() {
            return SessionPhase::Drafted;
        }
        if self.in_flight.summarize {
            return SessionPhase::Summarizing;
        }
        if !self.summary.is_empty() {
            return SessionPhase::Summarized;
        }
        SessionPhase::TranscriptReady
    }

    /// The authoritative transition function.
    pub fn apply(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        match event {
            SessionEvent::RecordingStarted => {
                if !self.phase.can_start_recording() {
                    return Err(SessionError::InvalidPhase {
                        action: "start recording",
                        phase: self.phase,
                    });
                }
                let generation = self.generation + 1;
                *self = Session {
                    generation,
                    phase: SessionPhase::Recording,
                    started_at: Some(Utc::now()),
                    ..Default::default()
                };
            }

            SessionEvent::RecordingStopped { elapsed_seconds } => {
                if self.phase != SessionPhase::Recording {
                    return Err(SessionError::InvalidPhase {
                        action: "stop recording",
                        phase: self.phase,
                    });
                }
                self.phase = SessionPhase::Transcribing;
                self.recorded_seconds = elapsed_seconds;
                self.started_at = None;
            }

            SessionEvent::TranscriptReceived { text } => {
                if self.phase != SessionPhase::Transcribing {
                    debug!("Transcript arrived outside Transcribing, ignored");
                    return Ok(());
                }
                self.transcript = text;
                self.live.clear();
                self.notice = None;
                self.phase = SessionPhase::TranscriptReady;
            }

            SessionEvent::TranscriptEmpty => {
                if self.phase != SessionPhase::Transcribing {
                    return Ok(());
                }
                self.transcript.clear();
                self.live.clear();
                self.notice = Some(TranscriptNotice::NoSpeech);
                self.phase = SessionPhase::Idle;
            }

            SessionEvent::TranscriptFailed { message } => {
                if self.phase != SessionPhase::Transcribing {
                    return Ok(());
                }
                self.transcript.clear();
                self.live.clear();
                self.notice = Some(TranscriptNotice::TranscriptionFailed { message });
                self.phase = SessionPhase::Idle;
            }

            SessionEvent::RecordingSaved { id } => {
                self.recording_id = Some(id);
            }

            SessionEvent::Classified { classification } => {
                self.email_type = classification.default_email_type();
                self.classification = Some(classification);
            }

            SessionEvent::SummarizeRequested => {
                if self.transcript.is_empty() {
                    return Err(SessionError::NoTranscript);
                }
                if self.in_flight.summarize {
                    return Err(SessionError::RequestInFlight {
                        channel: "summarize",
                    });
                }
                self.in_flight.summarize = true;
                self.summary_error = None;
                self.phase = SessionPhase::Summarizing;
            }

            SessionEvent::SummaryReceived { summary } => {
                if !self.in_flight.summarize {
                    return Ok(());
                }
                self.summary = summary;
                self.in_flight.summarize = false;
                self.phase = self.settled_phase();
            }

            SessionEvent::SummaryFailed { message } => {
                if !self.in_flight.summarize {
                    return Ok(());
                }
                self.in_flight.summarize = false;
                self.summary_error = Some(message);
                self.phase = self.settled_phase();
            }

            SessionEvent::DraftRequested { email_type } => {
                if self.transcript.is_empty() {
                    return Err(SessionError::NoTranscript);
                }
                if self.in_flight.email {
                    return Err(SessionError::RequestInFlight { channel: "email" });
                }
                if let Some(t) = email_type {
                    self.email_type = t;
                }
                self.in_flight.email = true;
                self.email_error = None;
                self.phase = SessionPhase::Drafting;
            }

            SessionEvent::RegenerateRequested | SessionEvent::QuickEditRequested => {
                if self.email_draft.is_empty() {
                    return Err(SessionError::NoDraft);
                }
                if self.in_flight.email {
                    return Err(SessionError::RequestInFlight { channel: "email" });
                }
                self.in_flight.email = true;
                self.email_error = None;
                self.phase = SessionPhase::Drafting;
            }

            SessionEvent::DraftReceived { email } => {
                if !self.in_flight.email {
                    return Ok(());
                }
                self.email_draft = email;
                self.in_flight.email = false;
                self.phase = self.settled_phase();
            }

            SessionEvent::DraftFailed { message } => {
                if !self.in_flight.email {
                    return Ok(());
                }
                self.in_flight.email = false;
                self.email_error = Some(message);
                self.phase = self.settled_phase();
            }

            SessionEvent::ChatSent { question } => {
                if self.transcript.is_empty() {
                    return Err(SessionError::NoTranscript);
                }
                if question.trim().is_empty() {
                    return Err(SessionError::EmptyQuestion);
                }
                if self.in_flight.chat {
                    return Err(SessionError::RequestInFlight { channel: "chat" });
                }
                self.pending_question = Some(question);
                self.chat_error = None;
                self.in_flight.chat = true;
            }

            SessionEvent::ChatAnswered { answer } => {
                if !self.in_flight.chat {
                    return Ok(());
                }
                if let Some(question) = self.pending_question.take() {
                    self.chat_history.push(ChatTurn::user(question));
                    self.chat_history.push(ChatTurn::assistant(answer));
                }
                self.in_flight.chat = false;
            }

            SessionEvent::ChatFailed { message } => {
                if !self.in_flight.chat {
                    return Ok(());
                }
                self.pending_question = None;
                self.chat_error = Some(message);
                self.in_flight.chat = false;
            }

            SessionEvent::EmailTypeSelected { email_type } => {
                self.email_type = email_type;
            }

            SessionEvent::LiveCaption(fragment) => {
                // Advisory only; anything arriving outside Recording is
                // dropped (the feed is effectively unsubscribed).
                if self.phase == SessionPhase::Recording {
                    self.live.push(&fragment);
                }
            }

            SessionEvent::RecordingLoaded { id, detail } => {
                let generation = self.generation + 1;
                *self = Session {
                    generation,
                    recording_id: Some(id),
                    transcript: detail.transcript,
                    summary: detail.summary,
                    email_draft: detail.email,
                    ..Default::default()
                };
                self.phase = self.settled_phase();
            }

            SessionEvent::Reset => {
                let generation = self.generation + 1;
                *self = Session {
                    generation,
                    ..Default::default()
                };
            }
        }

        Ok(())
    }
}

/// Shared handle over the single session.
#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<Session>>,
}

impl SessionHandle {
    pub async fn get(&self) -> Session {
        self.inner.lock().await.clone()
    }

    pub async fn generation(&self) -> u64 {
        self.inner.lock().await.generation
    }

    pub async fn apply(&self, event: SessionEvent) -> Result<(), SessionError> {
        self.inner.lock().await.apply(event)
    }

    /// Apply a collaborator outcome only if the session it was dispatched
    /// for is still the active one. Returns false when the response was
    /// stale and discarded.
    pub async fn apply_if_current(&self, generation: u64, event: SessionEvent) -> bool {
        let mut session = self.inner.lock().await;
        if session.generation != generation {
            debug!(
                "Discarding stale response (dispatched for generation {}, now {})",
                generation, session.generation
            );
            return false;
        }
        let _ = session.apply(event);
        true
    }
}
