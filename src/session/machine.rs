//! Session orchestrator.
//!
//! Validates user actions against the session, performs the side effect
//! (capture control, clipboard, or a backend call), and feeds each
//! collaborator outcome back as an event tagged with the generation active
//! at dispatch time. Backend calls run in spawned tasks so channels can
//! overlap; the machine itself lives on the service's command loop.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioCapture, CaptureError, LiveFragment};
use crate::backend::{EmailStyle, EmailType, MeetingBackend};
use crate::clipboard::ClipboardManager;
use crate::sidebar::SidebarHandle;

use super::phase::SessionPhase;
use super::session::{SessionEvent, SessionHandle};

/// Automatic follow-ups after a transcription lands.
#[derive(Debug, Clone, Copy)]
pub struct BehaviorOptions {
    /// Classify the transcript (meeting type, pills, alerts).
    pub auto_analyze: bool,
    /// Ask the backend to name the saved recording.
    pub auto_name: bool,
}

impl Default for BehaviorOptions {
    fn default() -> Self {
        Self {
            auto_analyze: true,
            auto_name: true,
        }
    }
}

pub struct SessionMachine {
    session: SessionHandle,
    sidebar: SidebarHandle,
    backend: Arc<dyn MeetingBackend>,
    capture: Mutex<Box<dyn AudioCapture>>,
    behavior: BehaviorOptions,
}

impl SessionMachine {
    pub fn new(
        capture: Box<dyn AudioCapture>,
        backend: Arc<dyn MeetingBackend>,
        session: SessionHandle,
        sidebar: SidebarHandle,
        behavior: BehaviorOptions,
    ) -> Self {
        Self {
            session,
            sidebar,
            backend,
            capture: Mutex::new(capture),
            behavior,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn sidebar(&self) -> &SidebarHandle {
        &self.sidebar
    }

    /// Start or stop recording depending on the current phase.
    pub async fn toggle_recording(&self) -> Result<SessionPhase> {
        let current = self.session.get().await;
        match current.phase {
            SessionPhase::Recording => {
                self.stop_recording().await?;
                Ok(SessionPhase::Transcribing)
            }
            SessionPhase::Transcribing => {
                warn!("Recording toggle requested while transcribing, ignored");
                Ok(SessionPhase::Transcribing)
            }
            _ => {
                self.start_recording().await?;
                Ok(SessionPhase::Recording)
            }
        }
    }

    /// Open the microphone and enter `Recording`. A permission failure
    /// leaves the session untouched.
    pub async fn start_recording(&self) -> Result<()> {
        let current = self.session.get().await;
        if !current.phase.can_start_recording() {
            bail!("cannot start recording while {}", current.phase.as_str());
        }

        {
            let mut capture = self.capture.lock().await;
            capture.open().context("Failed to open microphone")?;
        }

        if let Err(e) = self.session.apply(SessionEvent::RecordingStarted).await {
            self.capture.lock().await.close();
            return Err(anyhow!(e));
        }

        info!("Recording started");
        Ok(())
    }

    /// Stop recording, finalize the clip and hand it to transcription.
    pub async fn stop_recording(&self) -> Result<()> {
        let current = self.session.get().await;
        if current.phase != SessionPhase::Recording {
            bail!(
                "no recording in progress (current phase: {})",
                current.phase.as_str()
            );
        }
        let elapsed_seconds = current.elapsed_seconds();

        let clip = {
            let mut capture = self.capture.lock().await;
            let stopped = capture.stop();
            let finalized = stopped.and_then(|_| capture.finalize());
            // Release the device on every exit path.
            capture.close();
            finalized
        };

        self.session
            .apply(SessionEvent::RecordingStopped { elapsed_seconds })
            .await
            .map_err(|e| anyhow!(e))?;
        let generation = self.session.generation().await;

        let clip = match clip {
            Ok(clip) => clip,
            Err(CaptureError::NothingCaptured) => {
                warn!("Recording produced no audio");
                self.session
                    .apply_if_current(generation, SessionEvent::TranscriptEmpty)
                    .await;
                return Ok(());
            }
            Err(e) => {
                error!("Failed to finalize recording: {}", e);
                self.session
                    .apply_if_current(
                        generation,
                        SessionEvent::TranscriptFailed {
                            message: e.to_string(),
                        },
                    )
                    .await;
                return Ok(());
            }
        };

        info!(
            "Recording stopped after {}s, {} bytes of audio",
            elapsed_seconds,
            clip.wav.len()
        );

        let backend = Arc::clone(&self.backend);
        let session = self.session.clone();
        let sidebar = self.sidebar.clone();
        let behavior = self.behavior;

        tokio::spawn(async move {
            Self::run_transcription(
                backend,
                session,
                sidebar,
                behavior,
                generation,
                clip,
                elapsed_seconds,
            )
            .await;
        });

        Ok(())
    }

    /// Transcribe, then persist / name / classify. Every write back into the
    /// session is generation-checked; the follow-ups are advisory and never
    /// block the transcript-ready actions.
    #[allow(clippy::too_many_arguments)]
    async fn run_transcription(
        backend: Arc<dyn MeetingBackend>,
        session: SessionHandle,
        sidebar: SidebarHandle,
        behavior: BehaviorOptions,
        generation: u64,
        clip: crate::audio::AudioClip,
        duration_seconds: u64,
    ) {
        let text = match backend.transcribe(clip).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                error!("Transcription failed: {}", e);
                session
                    .apply_if_current(
                        generation,
                        SessionEvent::TranscriptFailed {
                            message: e.to_string(),
                        },
                    )
                    .await;
                return;
            }
        };

        if text.is_empty() {
            warn!("No speech detected in recording");
            session
                .apply_if_current(generation, SessionEvent::TranscriptEmpty)
                .await;
            return;
        }

        info!("Transcription complete: {} chars", text.len());
        if !session
            .apply_if_current(
                generation,
                SessionEvent::TranscriptReceived { text: text.clone() },
            )
            .await
        {
            return;
        }

        match backend.save_recording(&text, duration_seconds).await {
            Ok(id) => {
                session
                    .apply_if_current(generation, SessionEvent::RecordingSaved { id: id.clone() })
                    .await;
                Self::refresh_sidebar(&backend, &sidebar).await;

                if behavior.auto_name {
                    match backend.generate_name(&id, &text).await {
                        Ok(name) => {
                            debug!("Recording {} named {:?}", id, name);
                            Self::refresh_sidebar(&backend, &sidebar).await;
                        }
                        Err(e) => debug!("Name generation failed (best-effort): {}", e),
                    }
                }
            }
            Err(e) => warn!("Failed to save recording: {}", e),
        }

        if behavior.auto_analyze {
            Self::run_analyze(&backend, &session, generation, &text).await;
        }
    }

    /// Classification is advisory: failure falls back to the default pills
    /// and email type without surfacing an error.
    async fn run_analyze(
        backend: &Arc<dyn MeetingBackend>,
        session: &SessionHandle,
        generation: u64,
        transcript: &str,
    ) {
        match backend.analyze(transcript).await {
            Ok(classification) => {
                session
                    .apply_if_current(generation, SessionEvent::Classified { classification })
                    .await;
            }
            Err(e) => debug!("Analyze failed, keeping defaults: {}", e),
        }
    }

    pub async fn summarize(&self) -> Result<()> {
        self.session
            .apply(SessionEvent::SummarizeRequested)
            .await
            .map_err(|e| anyhow!(e))?;

        let snapshot = self.session.get().await;
        let generation = snapshot.generation;
        let transcript = snapshot.transcript;
        let backend = Arc::clone(&self.backend);
        let session = self.session.clone();

        tokio::spawn(async move {
            let event = match backend.summarize(&transcript).await {
                Ok(summary) => SessionEvent::SummaryReceived { summary },
                Err(e) => {
                    warn!("Summarize failed: {}", e);
                    SessionEvent::SummaryFailed {
                        message: e.to_string(),
                    }
                }
            };
            session.apply_if_current(generation, event).await;
        });

        Ok(())
    }

    pub async fn draft_email(&self, email_type: Option<EmailType>) -> Result<()> {
        self.session
            .apply(SessionEvent::DraftRequested { email_type })
            .await
            .map_err(|e| anyhow!(e))?;

        let snapshot = self.session.get().await;
        let generation = snapshot.generation;
        let backend = Arc::clone(&self.backend);
        let session = self.session.clone();

        tokio::spawn(async move {
            let event = match backend
                .draft_email(&snapshot.transcript, &snapshot.summary, snapshot.email_type)
                .await
            {
                Ok(email) => SessionEvent::DraftReceived { email },
                Err(e) => {
                    warn!("Email draft failed: {}", e);
                    SessionEvent::DraftFailed {
                        message: e.to_string(),
                    }
                }
            };
            session.apply_if_current(generation, event).await;
        });

        Ok(())
    }

    pub async fn regenerate_email(&self, style: EmailStyle) -> Result<()> {
        let before = self.session.get().await;
        self.session
            .apply(SessionEvent::RegenerateRequested)
            .await
            .map_err(|e| anyhow!(e))?;

        let generation = before.generation;
        let backend = Arc::clone(&self.backend);
        let session = self.session.clone();

        tokio::spawn(async move {
            let event = match backend
                .regenerate_email(
                    &before.transcript,
                    &before.summary,
                    &before.email_draft,
                    style,
                )
                .await
            {
                Ok(email) => SessionEvent::DraftReceived { email },
                Err(e) => {
                    warn!("Email regeneration failed: {}", e);
                    SessionEvent::DraftFailed {
                        message: e.to_string(),
                    }
                }
            };
            session.apply_if_current(generation, event).await;
        });

        Ok(())
    }

    /// Quick-edit with an empty instruction is a no-op, not an error.
    pub async fn quick_edit_email(&self, instruction: &str) -> Result<()> {
        let instruction = instruction.trim().to_string();
        if instruction.is_empty() {
            debug!("Quick edit with empty instruction, nothing to do");
            return Ok(());
        }

        let before = self.session.get().await;
        self.session
            .apply(SessionEvent::QuickEditRequested)
            .await
            .map_err(|e| anyhow!(e))?;

        let generation = before.generation;
        let backend = Arc::clone(&self.backend);
        let session = self.session.clone();

        tokio::spawn(async move {
            let event = match backend
                .quick_edit_email(&before.email_draft, &instruction)
                .await
            {
                Ok(email) => SessionEvent::DraftReceived { email },
                Err(e) => {
                    warn!("Quick edit failed: {}", e);
                    SessionEvent::DraftFailed {
                        message: e.to_string(),
                    }
                }
            };
            session.apply_if_current(generation, event).await;
        });

        Ok(())
    }

    /// Send a chat question. The history snapshot sent to the backend is
    /// the completed pairs only; the pending question travels separately.
    pub async fn chat(&self, question: &str) -> Result<()> {
        let question = question.trim().to_string();
        if question.is_empty() {
            return Ok(());
        }

        let before = self.session.get().await;
        self.session
            .apply(SessionEvent::ChatSent {
                question: question.clone(),
            })
            .await
            .map_err(|e| anyhow!(e))?;

        let generation = before.generation;
        let backend = Arc::clone(&self.backend);
        let session = self.session.clone();

        tokio::spawn(async move {
            let event = match backend
                .chat(
                    &question,
                    &before.transcript,
                    &before.chat_history,
                    &before.summary,
                )
                .await
            {
                Ok(answer) => SessionEvent::ChatAnswered { answer },
                Err(e) => {
                    warn!("Chat failed: {}", e);
                    SessionEvent::ChatFailed {
                        message: e.to_string(),
                    }
                }
            };
            session.apply_if_current(generation, event).await;
        });

        Ok(())
    }

    pub async fn select_email_type(&self, email_type: EmailType) -> Result<()> {
        self.session
            .apply(SessionEvent::EmailTypeSelected { email_type })
            .await
            .map_err(|e| anyhow!(e))
    }

    pub async fn push_live_caption(&self, fragment: LiveFragment) {
        let _ = self.session.apply(SessionEvent::LiveCaption(fragment)).await;
    }

    /// Replace the session with a persisted recording's fields.
    pub async fn load_recording(&self, id: &str) -> Result<()> {
        self.release_capture_if_active().await;

        let detail = self
            .backend
            .get_recording(id)
            .await
            .with_context(|| format!("Failed to load recording {id}"))?;

        self.session
            .apply(SessionEvent::RecordingLoaded {
                id: id.to_string(),
                detail: detail.clone(),
            })
            .await
            .map_err(|e| anyhow!(e))?;

        info!("Loaded recording {}", id);

        if self.behavior.auto_analyze && !detail.transcript.is_empty() {
            let generation = self.session.generation().await;
            let backend = Arc::clone(&self.backend);
            let session = self.session.clone();
            let transcript = detail.transcript;
            tokio::spawn(async move {
                Self::run_analyze(&backend, &session, generation, &transcript).await;
            });
        }

        Ok(())
    }

    /// Delete a recording; deleting the active one resets the session.
    /// Confirmation is the caller's responsibility.
    pub async fn delete_recording(&self, id: &str) -> Result<()> {
        self.backend
            .delete_recording(id)
            .await
            .with_context(|| format!("Failed to delete recording {id}"))?;

        let active = self.session.get().await.recording_id;
        if active.as_deref() == Some(id) {
            self.release_capture_if_active().await;
            let _ = self.session.apply(SessionEvent::Reset).await;
            info!("Deleted active recording {}, session reset", id);
        } else {
            info!("Deleted recording {}", id);
        }

        Self::refresh_sidebar(&self.backend, &self.sidebar).await;
        Ok(())
    }

    pub async fn rename_recording(&self, id: &str, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            bail!("recording name cannot be empty");
        }
        self.backend
            .rename_recording(id, name)
            .await
            .with_context(|| format!("Failed to rename recording {id}"))?;
        Self::refresh_sidebar(&self.backend, &self.sidebar).await;
        Ok(())
    }

    /// Reset for a new call.
    pub async fn new_session(&self) -> Result<()> {
        self.release_capture_if_active().await;
        self.session
            .apply(SessionEvent::Reset)
            .await
            .map_err(|e| anyhow!(e))
    }

    /// Copy the current draft to the system clipboard.
    pub async fn copy_email(&self) -> Result<()> {
        let draft = self.session.get().await.email_draft;
        if draft.is_empty() {
            bail!("no email draft to copy");
        }
        let mut clipboard = ClipboardManager::new()?;
        clipboard.copy(&draft)?;
        info!("Email draft copied to clipboard ({} chars)", draft.len());
        Ok(())
    }

    pub async fn refresh_recordings(&self) {
        Self::refresh_sidebar(&self.backend, &self.sidebar).await;
    }

    async fn refresh_sidebar(backend: &Arc<dyn MeetingBackend>, sidebar: &SidebarHandle) {
        match backend.list_recordings().await {
            Ok(recordings) => sidebar.set(recordings).await,
            Err(e) => warn!("Failed to refresh recording list: {}", e),
        }
    }

    async fn release_capture_if_active(&self) {
        let mut capture = self.capture.lock().await;
        if capture.is_active() {
            debug!("Releasing active capture on session exit");
            capture.close();
        }
    }
}
