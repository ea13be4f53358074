use std::sync::Arc;

use rand::Rng;
use rtrb::Consumer;

use super::analysis::AnalysisTap;
use super::config::SynthConfig;
use super::radiation::LipRadiation;
use super::resonator::{Formant, FormantBank};
use super::shared::SharedParams;
use super::smoother::ParamSmoother;
use super::source::GlottalSource;

/// Control values the chain is built with and that the control side keeps mirrored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChainParams {
    pub f0: f32,
    pub formants: [f32; 3],
    pub f1_bandwidth: Option<f32>,
    pub f2_bandwidth: Option<f32>,
    pub f1_gain: f32,
    pub f2_gain: f32,
    pub jitter: f32,
    pub volume: f32,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            f0: 120.0,
            formants: [500.0, 1500.0, 2500.0],
            f1_bandwidth: None, // default Q until a bandwidth is requested
            f2_bandwidth: None,
            f1_gain: 18.0,
            f2_gain: 15.0,
            jitter: 1.0,
            volume: 0.5,
        }
    }
}

impl ChainParams {
    /// Puts the resonator settings on `bank` directly, skipping the ramps.
    pub(crate) fn configure(&self, bank: &mut FormantBank) {
        let [f1, f2, f3] = self.formants;
        let _ = bank.set_formants_immediate(f1, f2, f3);
        if let Some(bw) = self.f1_bandwidth {
            let _ = bank.resonator_mut(Formant::F1).set_bandwidth_immediate(bw);
        }
        if let Some(bw) = self.f2_bandwidth {
            let _ = bank.resonator_mut(Formant::F2).set_bandwidth_immediate(bw);
        }
        let _ = bank.resonator_mut(Formant::F1).set_gain_immediate(self.f1_gain);
        let _ = bank.resonator_mut(Formant::F2).set_gain_immediate(self.f2_gain);
    }
}

/// Structural messages from the control thread, applied at the start of the
/// next block. Continuous values travel through [`SharedParams`] instead.
#[derive(Debug)]
pub enum EngineCommand {
    Start { f0: f32 },
    Stop,
    /// Replaces the active source. Built on the control thread, already started if needed.
    SwapSource(GlottalSource),
}

/// Audio-thread side of the synthesizer: source -> F1 -> F2 -> F3 -> lip radiation -> volume.
pub struct SynthEngine {
    config: SynthConfig,
    source: GlottalSource,
    formants: FormantBank,
    radiation: LipRadiation,
    master_gain: ParamSmoother,
    commands: Consumer<EngineCommand>,
    shared: Arc<SharedParams>,
    applied: ChainParams,
    seen_version: u64,
    tap: AnalysisTap,
    excitation: Vec<f32>, // scratch for the source, sized once
    faulted_blocks: u64,
}

impl SynthEngine {
    pub fn new<R: Rng>(
        config: SynthConfig,
        shared: Arc<SharedParams>,
        mut source: GlottalSource,
        commands: Consumer<EngineCommand>,
        tap: AnalysisTap,
        rng: &mut R,
    ) -> Self {
        let sample_rate = config.sample_rate;
        let seen_version = shared.version();
        let params = shared.snapshot();
        let mut formants = FormantBank::new(sample_rate, config.smoothing_time, rng);
        // Construction is the one place values are assigned without a ramp.
        params.configure(&mut formants);
        source.set_jitter(params.jitter);

        Self {
            source,
            formants,
            radiation: LipRadiation::new(sample_rate),
            master_gain: ParamSmoother::new(
                params.volume.clamp(0.0, 1.0),
                sample_rate,
                config.smoothing_time,
            ),
            commands,
            shared,
            applied: params,
            seen_version,
            tap,
            excitation: vec![0.0; config.max_block_size.max(1)],
            faulted_blocks: 0,
            config,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.config.sample_rate
    }

    /// Largest block rendered in one pass; longer requests are split.
    pub fn block_capacity(&self) -> usize {
        self.excitation.len()
    }

    pub fn source(&self) -> &GlottalSource {
        &self.source
    }

    pub fn formant_bank(&self) -> &FormantBank {
        &self.formants
    }

    pub fn is_playing(&self) -> bool {
        self.source.is_running()
    }

    /// Current (smoothed) output level.
    pub fn master_gain(&self) -> f32 {
        self.master_gain.value()
    }

    /// Blocks replaced by silence after producing non-finite samples.
    pub fn faulted_blocks(&self) -> u64 {
        self.faulted_blocks
    }

    /// Drains pending commands. Called at every block boundary.
    fn process_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            self.apply(command);
        }
    }

    /// Applies one command immediately.
    pub fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Start { f0 } => self.source.start(f0),
            EngineCommand::Stop => self.source.stop(),
            EngineCommand::SwapSource(next) => {
                // The old source rendered its last block before this boundary.
                let mut previous = std::mem::replace(&mut self.source, next);
                previous.stop();
            }
        }
    }

    /// Retargets whatever changed in [`SharedParams`] since the last block.
    /// Values were validated on the control side, so setter errors are
    /// discarded rather than raised on the audio thread.
    fn sync_params(&mut self) {
        let version = self.shared.version();
        if version == self.seen_version {
            return;
        }
        self.seen_version = version;
        let next = self.shared.snapshot();
        let previous = std::mem::replace(&mut self.applied, next);

        if next.f0 != previous.f0 {
            self.source.set_frequency(next.f0);
        }
        if next.formants != previous.formants {
            let [f1, f2, f3] = next.formants;
            let _ = self.formants.set_formants(f1, f2, f3);
        }
        for (formant, hz, before) in [
            (Formant::F1, next.f1_bandwidth, previous.f1_bandwidth),
            (Formant::F2, next.f2_bandwidth, previous.f2_bandwidth),
        ] {
            if let Some(hz) = hz.filter(|_| hz != before) {
                let _ = self.formants.resonator_mut(formant).set_bandwidth(hz);
            }
        }
        if next.f1_gain != previous.f1_gain {
            let _ = self.formants.resonator_mut(Formant::F1).set_gain(next.f1_gain);
        }
        if next.f2_gain != previous.f2_gain {
            let _ = self.formants.resonator_mut(Formant::F2).set_gain(next.f2_gain);
        }
        if next.jitter != previous.jitter {
            self.source.set_jitter(next.jitter);
        }
        if next.volume != previous.volume {
            self.master_gain.set_target(next.volume.clamp(0.0, 1.0));
        }
    }

    /// Renders one mono block. Never allocates, blocks or panics on bad input.
    pub fn process(&mut self, output: &mut [f32]) {
        self.process_commands();
        self.sync_params();
        let chunk_len = self.excitation.len();
        for chunk in output.chunks_mut(chunk_len) {
            self.render_chunk(chunk);
        }
    }

    fn render_chunk(&mut self, output: &mut [f32]) {
        let excitation = &mut self.excitation[..output.len()];
        self.source.render(excitation);

        for (out, &x) in output.iter_mut().zip(excitation.iter()) {
            *out = self.radiation.process(self.formants.process(x));
        }

        if output.iter().any(|s| !s.is_finite()) {
            output.fill(0.0);
            self.formants.reset();
            self.radiation.reset();
            self.faulted_blocks += 1;
        }

        // The tap sees the filtered signal before the volume stage.
        self.tap.write(output);

        for sample in output.iter_mut() {
            *sample = soft_limit(*sample * self.master_gain.next());
        }
    }
}

const LIMIT_KNEE: f32 = 0.9;

/// Transparent below the knee, then eases monotonically toward 1.0.
#[inline]
fn soft_limit(sample: f32) -> f32 {
    let magnitude = sample.abs();
    if magnitude <= LIMIT_KNEE {
        sample
    } else {
        let headroom = 1.0 - LIMIT_KNEE;
        let eased = LIMIT_KNEE + headroom * ((magnitude - LIMIT_KNEE) / headroom).tanh();
        eased.copysign(sample)
    }
}
