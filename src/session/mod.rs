pub mod machine;
pub mod phase;
#[allow(clippy::module_inception)]
pub mod session;

pub use machine::{BehaviorOptions, SessionMachine};
pub use phase::SessionPhase;
pub use session::{
    InFlight, Session, SessionError, SessionEvent, SessionHandle, TranscriptNotice,
};
