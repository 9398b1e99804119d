//! Error types for the engine's control-plane boundary.
//!
//! Per-sample audio-thread code never returns `Result` — the audio thread cannot
//! propagate errors and instead follows fixed fault-recovery policies directly
//! (clear-and-silence, clamp, log-and-ignore). `EngineError` exists for the
//! message-queue boundary, where a malformed control message can be rejected with
//! a normal `Result` before it ever reaches the audio thread.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A `Message` referenced a voice slot index outside the pool's range.
    InvalidVoiceSlot { index: usize, pool_size: usize },
    /// The control-to-audio message queue was full when a message was pushed.
    QueueOverflow,
    /// A `SetParam` message named a parameter id the modulation bus doesn't know.
    InvalidParameter { id: u32 },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidVoiceSlot { index, pool_size } => {
                write!(f, "voice slot {index} out of range (pool size {pool_size})")
            }
            EngineError::QueueOverflow => write!(f, "control message queue overflowed"),
            EngineError::InvalidParameter { id } => write!(f, "unknown parameter id {id}"),
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_human_readable() {
        let err = EngineError::InvalidVoiceSlot { index: 9, pool_size: 8 };
        assert_eq!(err.to_string(), "voice slot 9 out of range (pool size 8)");
    }
}
