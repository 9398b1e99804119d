pub mod cosine;
pub mod polyblep;

pub use cosine::{CosineMode, CosineOscillator};
pub use polyblep::PolyBlepOscillator;
