//! Best-effort live caption buffer.
//!
//! While recording, the embedding front end may push interim speech
//! fragments for user feedback. Final fragments accumulate, interim ones
//! replace each other. The buffer is advisory only: it is never persisted,
//! never sent to any generator, and is wholly discarded once the
//! authoritative transcript arrives.

use serde::{Deserialize, Serialize};

/// One incremental speech-to-text fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveFragment {
    pub text: String,
    /// Final fragments are committed; non-final ones replace the current
    /// interim tail.
    #[serde(rename = "final", default)]
    pub is_final: bool,
}

/// Accumulated live captions for the current recording.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveTranscript {
    committed: String,
    interim: String,
}

impl LiveTranscript {
    pub fn push(&mut self, fragment: &LiveFragment) {
        if fragment.is_final {
            self.committed.push_str(&fragment.text);
            self.committed.push(' ');
            self.interim.clear();
        } else {
            self.interim = fragment.text.clone();
        }
    }

    pub fn clear(&mut self) {
        self.committed.clear();
        self.interim.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty() && self.interim.is_empty()
    }

    /// Display text: committed captions followed by the pending interim tail.
    pub fn render(&self) -> String {
        if self.interim.is_empty() {
            self.committed.trim_end().to_string()
        } else if self.committed.is_empty() {
            self.interim.clone()
        } else {
            format!("{}{}", self.committed, self.interim)
        }
    }
}
