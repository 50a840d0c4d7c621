pub mod clock;
pub mod controller;
pub mod events;
pub mod orchestration;
pub mod scheduler;
pub mod state;

pub use clock::{AnchoredClock, Clock, SystemClock};
pub use controller::TimerController;
pub use events::{TimerEvent, TimerSnapshot};
pub use state::{Command, SessionState, TransitionError};
