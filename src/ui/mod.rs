//! Console output and interactive prompts

pub mod configure;
pub mod render;
pub mod usage;
