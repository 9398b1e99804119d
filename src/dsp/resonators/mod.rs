pub mod fm_voice;
pub mod modal;
pub mod plucker;
pub mod string;

pub use fm_voice::FmVoice;
pub use modal::ModalResonator;
pub use plucker::Plucker;
pub use string::KarplusString;
