pub mod dc_block;
pub mod svf;

pub use dc_block::DcBlock;
pub use svf::{NaiveSvf, StateVariableFilter, SvfOutputs};
