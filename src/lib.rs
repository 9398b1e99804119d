#[macro_use]
extern crate lazy_static;

pub mod dsp;
pub mod engine;
pub mod error;
pub mod math;
pub mod message;
pub mod mod_matrix;
pub mod modulation;
pub mod onset;
pub mod sequencer;
pub mod voice_pool;

pub use engine::{Engine, EngineConfig, EngineHandle};
pub use error::EngineError;
pub use message::{Message, ParamId};
