pub mod clock;
pub mod euclidean;
pub mod pattern;

pub use clock::{Clock, ClockEvent};
pub use pattern::StepPattern;
