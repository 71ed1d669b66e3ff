//! End-to-end session scenarios against a scripted backend.
//!
//! The machine takes its capture device and backend through trait seams, so
//! these tests drive the real orchestration with a fake microphone and a
//! mock collaborator set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use meetnote::audio::{AudioCapture, AudioClip, CaptureError};
use meetnote::backend::{
    BackendError, ChatTurn, Classification, EmailStyle, EmailType, MeetingBackend,
    RecordingDetail, RecordingSummary,
};
use meetnote::session::{
    BehaviorOptions, Session, SessionHandle, SessionMachine, SessionPhase, TranscriptNotice,
};
use meetnote::sidebar::SidebarHandle;
use meetnote::view::project;

// ── Fake microphone ──────────────────────────────────────────────────────

#[derive(Default)]
struct FakeCapture {
    active: bool,
    stopped: bool,
}

impl AudioCapture for FakeCapture {
    fn open(&mut self) -> Result<(), CaptureError> {
        if self.active {
            return Err(CaptureError::AlreadyRecording);
        }
        self.active = true;
        self.stopped = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        if !self.active {
            return Err(CaptureError::NotRecording);
        }
        self.active = false;
        self.stopped = true;
        Ok(())
    }

    fn finalize(&mut self) -> Result<AudioClip, CaptureError> {
        if !self.stopped {
            return Err(CaptureError::NotStopped);
        }
        self.stopped = false;
        AudioClip::from_samples(&[0.1_f32; 1600], 16000)
    }

    fn close(&mut self) {
        self.active = false;
        self.stopped = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// A microphone the user refused access to.
struct DeniedCapture;

impl AudioCapture for DeniedCapture {
    fn open(&mut self) -> Result<(), CaptureError> {
        Err(CaptureError::PermissionDenied)
    }
    fn stop(&mut self) -> Result<(), CaptureError> {
        Err(CaptureError::NotRecording)
    }
    fn finalize(&mut self) -> Result<AudioClip, CaptureError> {
        Err(CaptureError::NotStopped)
    }
    fn close(&mut self) {}
    fn is_active(&self) -> bool {
        false
    }
}

// ── Scripted backend ─────────────────────────────────────────────────────

struct MockBackend {
    transcript: Mutex<Result<String, String>>,
    summary: Mutex<Result<String, String>>,
    email: Mutex<Result<String, String>>,
    answer: Mutex<Result<String, String>>,
    classification: Mutex<Option<Classification>>,
    /// When set, `summarize` blocks until notified.
    summarize_gate: Mutex<Option<Arc<Notify>>>,
    recordings: Mutex<Vec<RecordingSummary>>,
    details: Mutex<HashMap<String, RecordingDetail>>,
    saved: AtomicUsize,
    summarize_calls: AtomicUsize,
    quick_edit_calls: AtomicUsize,
    chat_calls: AtomicUsize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            transcript: Mutex::new(Ok("Let's ship by Friday.".to_string())),
            summary: Mutex::new(Ok("- Ship by Friday".to_string())),
            email: Mutex::new(Ok("Hi,\n\nShipping Friday.".to_string())),
            answer: Mutex::new(Ok("Friday.".to_string())),
            classification: Mutex::new(None),
            summarize_gate: Mutex::new(None),
            recordings: Mutex::new(Vec::new()),
            details: Mutex::new(HashMap::new()),
            saved: AtomicUsize::new(0),
            summarize_calls: AtomicUsize::new(0),
            quick_edit_calls: AtomicUsize::new(0),
            chat_calls: AtomicUsize::new(0),
        }
    }
}

impl MockBackend {
    fn script_transcript(&self, result: Result<&str, &str>) {
        *self.transcript.lock().unwrap() =
            result.map(str::to_string).map_err(str::to_string);
    }

    fn seed_recording(&self, id: &str, detail: RecordingDetail) {
        self.recordings.lock().unwrap().push(RecordingSummary {
            id: id.to_string(),
            name: format!("Recording {id}"),
            duration: 60,
            created_at: Utc::now(),
        });
        self.details.lock().unwrap().insert(id.to_string(), detail);
    }

    fn gate_summarize(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.summarize_gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

fn api(message: &str) -> BackendError {
    BackendError::Api(message.to_string())
}

#[async_trait]
impl MeetingBackend for MockBackend {
    async fn transcribe(&self, _clip: AudioClip) -> Result<String, BackendError> {
        self.transcript.lock().unwrap().clone().map_err(|e| api(&e))
    }

    async fn save_recording(&self, transcript: &str, duration: u64) -> Result<String, BackendError> {
        let n = self.saved.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("rec-{n}");
        self.seed_recording(
            &id,
            RecordingDetail {
                transcript: transcript.to_string(),
                ..Default::default()
            },
        );
        let _ = duration;
        Ok(id)
    }

    async fn analyze(&self, _transcript: &str) -> Result<Classification, BackendError> {
        self.classification
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| api("analysis unavailable"))
    }

    async fn generate_name(&self, id: &str, _transcript: &str) -> Result<String, BackendError> {
        let name = format!("Named {id}");
        if let Some(r) = self.recordings.lock().unwrap().iter_mut().find(|r| r.id == id) {
            r.name = name.clone();
        }
        Ok(name)
    }

    async fn list_recordings(&self) -> Result<Vec<RecordingSummary>, BackendError> {
        Ok(self.recordings.lock().unwrap().clone())
    }

    async fn get_recording(&self, id: &str) -> Result<RecordingDetail, BackendError> {
        self.details
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| api("Recording not found"))
    }

    async fn delete_recording(&self, id: &str) -> Result<(), BackendError> {
        self.recordings.lock().unwrap().retain(|r| r.id != id);
        self.details.lock().unwrap().remove(id);
        Ok(())
    }

    async fn rename_recording(&self, id: &str, name: &str) -> Result<(), BackendError> {
        if let Some(r) = self.recordings.lock().unwrap().iter_mut().find(|r| r.id == id) {
            r.name = name.to_string();
            Ok(())
        } else {
            Err(api("Recording not found"))
        }
    }

    async fn summarize(&self, _transcript: &str) -> Result<String, BackendError> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.summarize_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.summary.lock().unwrap().clone().map_err(|e| api(&e))
    }

    async fn draft_email(
        &self,
        _transcript: &str,
        _summary: &str,
        _email_type: EmailType,
    ) -> Result<String, BackendError> {
        self.email.lock().unwrap().clone().map_err(|e| api(&e))
    }

    async fn regenerate_email(
        &self,
        _transcript: &str,
        _summary: &str,
        current_email: &str,
        style: EmailStyle,
    ) -> Result<String, BackendError> {
        Ok(format!("{current_email} [{}]", style.as_str()))
    }

    async fn quick_edit_email(
        &self,
        current_email: &str,
        instruction: &str,
    ) -> Result<String, BackendError> {
        self.quick_edit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{current_email} ({instruction})"))
    }

    async fn chat(
        &self,
        _question: &str,
        _transcript: &str,
        _history: &[ChatTurn],
        _summary: &str,
    ) -> Result<String, BackendError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.answer.lock().unwrap().clone().map_err(|e| api(&e))
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

fn machine_with(backend: Arc<MockBackend>) -> SessionMachine {
    SessionMachine::new(
        Box::new(FakeCapture::default()),
        backend,
        SessionHandle::default(),
        SidebarHandle::default(),
        BehaviorOptions::default(),
    )
}

async fn wait_until<F>(session: &SessionHandle, mut pred: F) -> Session
where
    F: FnMut(&Session) -> bool,
{
    for _ in 0..400 {
        let s = session.get().await;
        if pred(&s) {
            return s;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("session never reached expected state");
}

async fn record_and_transcribe(machine: &SessionMachine) -> Session {
    machine.start_recording().await.unwrap();
    machine.stop_recording().await.unwrap();
    wait_until(machine.session(), |s| {
        s.phase != SessionPhase::Recording && s.phase != SessionPhase::Transcribing
    })
    .await
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn transcription_enables_downstream_actions() {
    let backend = Arc::new(MockBackend::default());
    let machine = machine_with(backend.clone());

    let session = record_and_transcribe(&machine).await;

    assert_eq!(session.phase, SessionPhase::TranscriptReady);
    assert_eq!(session.transcript, "Let's ship by Friday.");

    let view = project(&session, &machine.sidebar().get().await, chrono::Local::now());
    assert!(view.controls.summarize_enabled);
    assert!(view.controls.chat_enabled);

    // The recording was persisted and the sidebar picked it up.
    let session = wait_until(machine.session(), |s| s.recording_id.is_some()).await;
    assert_eq!(session.recording_id.as_deref(), Some("rec-1"));
    for _ in 0..200 {
        if machine.sidebar().contains("rec-1").await {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert!(machine.sidebar().contains("rec-1").await);
}

#[tokio::test]
async fn empty_transcription_shows_empty_state_and_keeps_actions_disabled() {
    let backend = Arc::new(MockBackend::default());
    backend.script_transcript(Ok(""));
    let machine = machine_with(backend);

    let session = record_and_transcribe(&machine).await;

    assert_eq!(session.phase, SessionPhase::Idle);
    assert_eq!(session.notice, Some(TranscriptNotice::NoSpeech));
    assert!(session.recording_id.is_none());

    let view = project(&session, &[], chrono::Local::now());
    assert!(!view.controls.summarize_enabled);
    assert!(!view.controls.chat_enabled);
    assert_eq!(view.transcript.notice.as_deref(), Some("No speech detected"));
}

#[tokio::test]
async fn failed_transcription_leaves_recording_reattemptable() {
    let backend = Arc::new(MockBackend::default());
    backend.script_transcript(Err("upstream timeout"));
    let machine = machine_with(backend.clone());

    let session = record_and_transcribe(&machine).await;

    assert_eq!(session.phase, SessionPhase::Idle);
    assert!(matches!(
        session.notice,
        Some(TranscriptNotice::TranscriptionFailed { .. })
    ));

    let view = project(&session, &[], chrono::Local::now());
    assert!(view.controls.record_enabled);

    // Retrying works once the backend recovers.
    backend.script_transcript(Ok("Second try."));
    let session = record_and_transcribe(&machine).await;
    assert_eq!(session.phase, SessionPhase::TranscriptReady);
    assert_eq!(session.transcript, "Second try.");
}

#[tokio::test]
async fn summarize_success_enables_email() {
    let backend = Arc::new(MockBackend::default());
    let machine = machine_with(backend);

    record_and_transcribe(&machine).await;
    machine.summarize().await.unwrap();

    let session = wait_until(machine.session(), |s| s.phase == SessionPhase::Summarized).await;
    assert_eq!(session.summary, "- Ship by Friday");

    let view = project(&session, &[], chrono::Local::now());
    assert!(view.controls.email_enabled);
    assert!(view.controls.summarize_enabled);
}

#[tokio::test]
async fn summarize_failure_surfaces_inline_and_reenables_control() {
    let backend = Arc::new(MockBackend::default());
    *backend.summary.lock().unwrap() = Err("model overloaded".to_string());
    let machine = machine_with(backend);

    record_and_transcribe(&machine).await;
    machine.summarize().await.unwrap();

    let session = wait_until(machine.session(), |s| s.summary_error.is_some()).await;
    assert_eq!(session.phase, SessionPhase::TranscriptReady);
    assert!(session.summary.is_empty());

    let view = project(&session, &[], chrono::Local::now());
    assert!(view.controls.summarize_enabled);
    assert_eq!(view.summary.error.as_deref(), Some("model overloaded"));
}

#[tokio::test]
async fn quick_edit_with_empty_instruction_is_a_no_op() {
    let backend = Arc::new(MockBackend::default());
    let machine = machine_with(backend.clone());

    record_and_transcribe(&machine).await;
    machine.draft_email(None).await.unwrap();
    let session = wait_until(machine.session(), |s| s.phase == SessionPhase::Drafted).await;
    let draft_before = session.email_draft.clone();

    machine.quick_edit_email("   ").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(backend.quick_edit_calls.load(Ordering::SeqCst), 0);
    let session = machine.session().get().await;
    assert_eq!(session.email_draft, draft_before);
    assert_eq!(session.phase, SessionPhase::Drafted);
}

#[tokio::test]
async fn quick_edit_with_instruction_replaces_draft() {
    let backend = Arc::new(MockBackend::default());
    let machine = machine_with(backend.clone());

    record_and_transcribe(&machine).await;
    machine.draft_email(None).await.unwrap();
    wait_until(machine.session(), |s| s.phase == SessionPhase::Drafted).await;

    machine.quick_edit_email("make it shorter").await.unwrap();
    let session = wait_until(machine.session(), |s| {
        s.email_draft.contains("make it shorter")
    })
    .await;

    assert_eq!(backend.quick_edit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.phase, SessionPhase::Drafted);
}

#[tokio::test]
async fn regenerate_applies_style_to_existing_draft() {
    let backend = Arc::new(MockBackend::default());
    let machine = machine_with(backend);

    record_and_transcribe(&machine).await;

    // No draft yet: regeneration is rejected.
    assert!(machine.regenerate_email(EmailStyle::Shorter).await.is_err());

    machine.draft_email(Some(EmailType::SalesFollowup)).await.unwrap();
    wait_until(machine.session(), |s| s.phase == SessionPhase::Drafted).await;

    machine.regenerate_email(EmailStyle::Casual).await.unwrap();
    let session = wait_until(machine.session(), |s| s.email_draft.contains("[casual]")).await;
    assert_eq!(session.email_type, EmailType::SalesFollowup);
}

#[tokio::test]
async fn chat_works_before_summarizing() {
    let backend = Arc::new(MockBackend::default());
    let machine = machine_with(backend.clone());

    record_and_transcribe(&machine).await;
    machine.chat("When do we ship?").await.unwrap();

    let session = wait_until(machine.session(), |s| s.chat_history.len() == 2).await;
    assert!(session.summary.is_empty());
    assert_eq!(session.chat_history[0].content, "When do we ship?");
    assert_eq!(session.chat_history[1].content, "Friday.");
}

#[tokio::test]
async fn blank_chat_question_sends_nothing() {
    let backend = Arc::new(MockBackend::default());
    let machine = machine_with(backend.clone());

    record_and_transcribe(&machine).await;
    machine.chat("   ").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(backend.chat_calls.load(Ordering::SeqCst), 0);
    assert!(machine.session().get().await.chat_history.is_empty());
}

#[tokio::test]
async fn deleting_active_recording_resets_session_and_sidebar() {
    let backend = Arc::new(MockBackend::default());
    let machine = machine_with(backend);

    record_and_transcribe(&machine).await;
    let session = wait_until(machine.session(), |s| s.recording_id.is_some()).await;
    let id = session.recording_id.unwrap();

    machine.delete_recording(&id).await.unwrap();

    let session = machine.session().get().await;
    assert_eq!(session.phase, SessionPhase::Idle);
    assert!(session.transcript.is_empty());
    assert!(session.recording_id.is_none());
    assert!(!machine.sidebar().contains(&id).await);
}

#[tokio::test]
async fn deleting_inactive_recording_keeps_session() {
    let backend = Arc::new(MockBackend::default());
    backend.seed_recording(
        "other",
        RecordingDetail {
            transcript: "other meeting".to_string(),
            ..Default::default()
        },
    );
    let machine = machine_with(backend);

    record_and_transcribe(&machine).await;
    wait_until(machine.session(), |s| s.recording_id.is_some()).await;

    machine.delete_recording("other").await.unwrap();

    let session = machine.session().get().await;
    assert_eq!(session.phase, SessionPhase::TranscriptReady);
    assert!(!machine.sidebar().contains("other").await);
}

#[tokio::test]
async fn stale_summary_after_switching_recordings_is_discarded() {
    let backend = Arc::new(MockBackend::default());
    backend.seed_recording(
        "r1",
        RecordingDetail {
            transcript: "first meeting".to_string(),
            ..Default::default()
        },
    );
    backend.seed_recording(
        "r2",
        RecordingDetail {
            transcript: "second meeting".to_string(),
            ..Default::default()
        },
    );
    let machine = machine_with(backend.clone());

    machine.load_recording("r1").await.unwrap();
    let gate = backend.gate_summarize();
    machine.summarize().await.unwrap();

    // Switch before the summary lands.
    machine.load_recording("r2").await.unwrap();
    gate.notify_one();

    // Let the gated response arrive and be discarded.
    for _ in 0..100 {
        if backend.summarize_calls.load(Ordering::SeqCst) >= 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let session = machine.session().get().await;
    assert_eq!(session.recording_id.as_deref(), Some("r2"));
    assert_eq!(session.transcript, "second meeting");
    assert!(session.summary.is_empty());
    assert!(!session.in_flight.summarize);
}

#[tokio::test]
async fn loading_recording_replaces_session_wholesale() {
    let backend = Arc::new(MockBackend::default());
    backend.seed_recording(
        "r1",
        RecordingDetail {
            transcript: "first".to_string(),
            summary: "- first summary".to_string(),
            email: "first email".to_string(),
        },
    );
    let machine = machine_with(backend);

    record_and_transcribe(&machine).await;
    machine.chat("q?").await.unwrap();
    wait_until(machine.session(), |s| s.chat_history.len() == 2).await;

    machine.load_recording("r1").await.unwrap();

    let session = machine.session().get().await;
    assert_eq!(session.phase, SessionPhase::Drafted);
    assert_eq!(session.transcript, "first");
    assert_eq!(session.summary, "- first summary");
    assert_eq!(session.email_draft, "first email");
    assert!(session.chat_history.is_empty());
}

#[tokio::test]
async fn classification_applies_email_default_and_pills() {
    let backend = Arc::new(MockBackend::default());
    *backend.classification.lock().unwrap() = Some(Classification {
        meeting_type: "internal".to_string(),
        email_default: "team".to_string(),
        pills: vec!["Who is blocked?".to_string()],
        alerts: vec![],
    });
    let machine = machine_with(backend);

    record_and_transcribe(&machine).await;
    let session = wait_until(machine.session(), |s| s.classification.is_some()).await;

    assert_eq!(session.email_type, EmailType::Team);
    let view = project(&session, &[], chrono::Local::now());
    assert_eq!(view.chat.pills, vec!["Who is blocked?".to_string()]);
}

#[tokio::test]
async fn classification_failure_falls_back_to_defaults() {
    // MockBackend::default has no scripted classification, so analyze errors.
    let backend = Arc::new(MockBackend::default());
    let machine = machine_with(backend);

    let session = record_and_transcribe(&machine).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert!(machine.session().get().await.classification.is_none());
    let view = project(&session, &[], chrono::Local::now());
    assert_eq!(view.chat.pills.len(), 3);
    assert_eq!(view.email.email_type, EmailType::Customer);
}

#[tokio::test]
async fn denied_microphone_leaves_session_idle() {
    let backend = Arc::new(MockBackend::default());
    let machine = SessionMachine::new(
        Box::new(DeniedCapture),
        backend,
        SessionHandle::default(),
        SidebarHandle::default(),
        BehaviorOptions::default(),
    );

    let err = machine.start_recording().await.unwrap_err();
    assert!(err.to_string().contains("microphone"));

    let session = machine.session().get().await;
    assert_eq!(session.phase, SessionPhase::Idle);
    assert_eq!(session.generation, 0);
}

#[tokio::test]
async fn new_recording_resets_timer_and_artifacts() {
    let backend = Arc::new(MockBackend::default());
    let machine = machine_with(backend);

    record_and_transcribe(&machine).await;
    machine.summarize().await.unwrap();
    wait_until(machine.session(), |s| s.phase == SessionPhase::Summarized).await;

    machine.start_recording().await.unwrap();

    let session = machine.session().get().await;
    assert_eq!(session.phase, SessionPhase::Recording);
    assert_eq!(session.elapsed_seconds(), 0);
    assert!(session.summary.is_empty());
    assert!(session.email_draft.is_empty());
    assert!(session.chat_history.is_empty());
}
