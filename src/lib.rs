pub mod audio;
pub mod error;
pub mod input;
pub mod synth;
