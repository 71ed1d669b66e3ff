//! Session lifecycle phases.

use serde::{Deserialize, Serialize};

/// Phase of the active meeting session.
///
/// The phase tracks the capture/artifact lifecycle. Chat is not a phase:
/// it is gated only on transcript presence and may overlap any phase from
/// `TranscriptReady` onward, so it is tracked as an in-flight flag on the
/// session instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Recording,
    Transcribing,
    TranscriptReady,
    Summarizing,
    Summarized,
    Drafting,
    Drafted,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Transcribing => "transcribing",
            Self::TranscriptReady => "transcript_ready",
            Self::Summarizing => "summarizing",
            Self::Summarized => "summarized",
            Self::Drafting => "drafting",
            Self::Drafted => "drafted",
        }
    }

    /// Whether a new recording may start from this phase.
    pub fn can_start_recording(&self) -> bool {
        !matches!(self, Self::Recording | Self::Transcribing)
    }
}

impl Default for SessionPhase {
    fn default() -> Self {
        Self::Idle
    }
}
