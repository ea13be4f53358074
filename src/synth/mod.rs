pub mod analysis;
pub mod config;
pub mod control;
pub mod engine;
pub mod filter;
pub mod kernels;
pub mod pulse;
pub mod radiation;
pub mod resonator;
pub mod shared;
pub mod smoother;
pub mod source;
pub mod vowel;
pub mod waveform;
