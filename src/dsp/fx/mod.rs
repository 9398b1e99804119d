pub mod clouds;
pub mod engine;
pub mod ensemble;
pub mod reverb;

pub use clouds::CloudsBuffer;
pub use engine::{FxContext, FxEngine, Segment};
pub use ensemble::Ensemble;
pub use reverb::Reverb;
