mod phase;
mod session;

pub use phase::{format_remaining, Phase, SessionConfig, Segment};
pub use session::{Countdown, SessionClock, SessionState};
