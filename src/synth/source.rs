use std::fmt;
use std::str::FromStr;

use rand::rngs::SmallRng;

use super::kernels::KernelRegistry;
use super::pulse::{PulseModel, PulseSource};
use super::waveform::SawtoothSource;
use crate::error::SynthResult;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SourceType {
    #[default]
    Sawtooth,
    Rosenberg,
    Lf,
}

impl SourceType {
    pub const ALL: [SourceType; 3] = [SourceType::Sawtooth, SourceType::Rosenberg, SourceType::Lf];

    pub fn next(self) -> Self {
        match self {
            SourceType::Sawtooth => SourceType::Rosenberg,
            SourceType::Rosenberg => SourceType::Lf,
            SourceType::Lf => SourceType::Sawtooth,
        }
    }

    fn pulse_model(self) -> Option<PulseModel> {
        match self {
            SourceType::Sawtooth => None,
            SourceType::Rosenberg => Some(PulseModel::Rosenberg),
            SourceType::Lf => Some(PulseModel::Lf),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceType::Sawtooth => "sawtooth",
            SourceType::Rosenberg => "rosenberg",
            SourceType::Lf => "lf",
        };
        f.write_str(name)
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sawtooth" | "saw" => Ok(SourceType::Sawtooth),
            "rosenberg" => Ok(SourceType::Rosenberg),
            "lf" | "liljencrants-fant" => Ok(SourceType::Lf),
            other => Err(format!("unknown source type '{other}'")),
        }
    }
}

/// The single excitation generator feeding the resonator bank.
///
/// Variants are swapped by constructing a fresh value and replacing the old one;
/// no variant holds heap data, so the swap is safe inside the audio callback.
#[derive(Clone, Debug)]
pub enum GlottalSource {
    Sawtooth(SawtoothSource),
    Pulse(PulseSource),
}

impl GlottalSource {
    /// Builds a stopped source of `kind`. Polynomial variants need loaded kernels.
    pub fn create(
        kind: SourceType,
        registry: &KernelRegistry,
        sample_rate: f32,
        smoothing_time: f32,
        f0: f32,
        rng: SmallRng,
    ) -> SynthResult<Self> {
        match kind.pulse_model() {
            None => Ok(GlottalSource::Sawtooth(SawtoothSource::new(
                sample_rate,
                smoothing_time,
                f0,
            ))),
            Some(model) => registry
                .instantiate(model, sample_rate, smoothing_time, rng)
                .map(GlottalSource::Pulse),
        }
    }

    pub fn kind(&self) -> SourceType {
        match self {
            GlottalSource::Sawtooth(_) => SourceType::Sawtooth,
            GlottalSource::Pulse(p) => match p.model() {
                PulseModel::Rosenberg => SourceType::Rosenberg,
                PulseModel::Lf => SourceType::Lf,
            },
        }
    }

    pub fn supports_jitter(&self) -> bool {
        matches!(self, GlottalSource::Pulse(_))
    }

    pub fn set_frequency(&mut self, f0: f32) {
        match self {
            GlottalSource::Sawtooth(s) => s.set_frequency(f0),
            GlottalSource::Pulse(p) => p.set_frequency(f0),
        }
    }

    /// No-op on variants without jitter.
    pub fn set_jitter(&mut self, percent: f32) {
        if let GlottalSource::Pulse(p) = self {
            p.set_jitter(percent);
        }
    }

    pub fn start(&mut self, f0: f32) {
        match self {
            GlottalSource::Sawtooth(s) => s.start(f0),
            GlottalSource::Pulse(p) => p.start(f0),
        }
    }

    pub fn stop(&mut self) {
        match self {
            GlottalSource::Sawtooth(s) => s.stop(),
            GlottalSource::Pulse(p) => p.stop(),
        }
    }

    pub fn is_running(&self) -> bool {
        match self {
            GlottalSource::Sawtooth(s) => s.is_running(),
            GlottalSource::Pulse(p) => p.is_running(),
        }
    }

    /// Phase of the running generator, `None` when stopped.
    pub fn phase(&self) -> Option<f64> {
        match self {
            GlottalSource::Sawtooth(s) => s.is_running().then(|| s.phase()),
            GlottalSource::Pulse(p) => p.phase(),
        }
    }

    pub fn render(&mut self, output: &mut [f32]) {
        match self {
            GlottalSource::Sawtooth(s) => s.render(output),
            GlottalSource::Pulse(p) => p.render(output),
        }
    }
}
