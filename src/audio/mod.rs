pub mod capture;
pub mod live_feed;

pub use capture::{AudioCapture, AudioClip, CaptureError, MicCapture};
pub use live_feed::{LiveFragment, LiveTranscript};
