use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rtrb::{Producer, RingBuffer};
use tracing::{debug, info, warn};

use super::analysis::{analysis_tap, Analyser, Levels};
use super::config::SynthConfig;
use super::engine::{ChainParams, EngineCommand, SynthEngine};
use super::kernels::{KernelParam, KernelRegistry, KernelSpec};
use super::pulse::PulseModel;
use super::resonator::{validate_bandwidth, validate_frequency, validate_gain, FormantBank};
use super::shared::SharedParams;
use super::source::{GlottalSource, SourceType};
use super::vowel::VowelPreset;
use crate::audio::AudioBackend;
use crate::error::{SynthError, SynthResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
    Playing,
    Stopped,
}

/// Control-thread handle on the whole signal chain.
///
/// Every setter validates its input, records the value and publishes it to
/// the audio thread through [`SharedParams`], which never fills up. Only
/// start, stop and source swaps go through the command queue. Values set
/// before `init` are applied when the engine is built.
pub struct VowelSynth<B: AudioBackend> {
    backend: B,
    config: SynthConfig,
    registry: Arc<KernelRegistry>,
    state: EngineState,
    params: ChainParams,
    shared: Arc<SharedParams>,
    source_type: SourceType,
    generation: u64,
    commands: Option<Producer<EngineCommand>>,
    analyser: Option<Analyser>,
    rng: SmallRng,
}

impl<B: AudioBackend> VowelSynth<B> {
    pub fn new(backend: B, config: SynthConfig) -> Self {
        Self::with_registry(backend, config, Arc::new(KernelRegistry::new()))
    }

    /// Shares an already (or concurrently) loading registry.
    pub fn with_registry(backend: B, config: SynthConfig, registry: Arc<KernelRegistry>) -> Self {
        Self {
            backend,
            config,
            registry,
            state: EngineState::Uninitialized,
            params: ChainParams::default(),
            shared: Arc::new(SharedParams::new(&ChainParams::default())),
            source_type: SourceType::default(),
            generation: 0,
            commands: None,
            analyser: None,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Fixes every random draw (LFO offsets, jitter) for reproducible renders.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// Opens the output, loads the kernels and builds the chain with a
    /// Sawtooth source. Calling it again after success does nothing; a failed
    /// call leaves the synth uninitialized so it can be retried.
    pub fn init(&mut self) -> SynthResult<()> {
        if self.state != EngineState::Uninitialized {
            debug!("init skipped, already initialized");
            return Ok(());
        }

        let sample_rate = self.backend.prepare()?;
        self.registry.load(sample_rate)?;
        self.config = self.config.with_sample_rate(sample_rate);

        let (command_tx, command_rx) = RingBuffer::new(self.config.command_capacity);
        let (tap, tap_reader) = analysis_tap(self.config.analysis_capacity());

        let source = self.build_source(SourceType::Sawtooth)?;
        let engine = SynthEngine::new(
            self.config.clone(),
            Arc::clone(&self.shared),
            source,
            command_rx,
            tap,
            &mut self.rng,
        );
        self.backend.launch(engine)?;

        self.analyser = Some(Analyser::new(
            tap_reader,
            sample_rate,
            self.config.fft_size,
            self.config.analysis_smoothing,
        ));
        self.commands = Some(command_tx);
        self.source_type = SourceType::Sawtooth;
        self.generation += 1;
        self.state = EngineState::Ready;
        info!(sample_rate, "synth initialized");
        Ok(())
    }

    /// Lets the host play. Needed once after `init` where output is gated.
    pub fn resume(&mut self) -> SynthResult<()> {
        self.require_init()?;
        self.backend.resume()
    }

    pub fn suspend(&mut self) -> SynthResult<()> {
        self.require_init()?;
        self.backend.suspend()
    }

    pub fn start(&mut self) -> SynthResult<()> {
        self.require_init()?;
        if self.state == EngineState::Playing {
            return Ok(());
        }
        self.send(EngineCommand::Start { f0: self.params.f0 })?;
        self.state = EngineState::Playing;
        debug!(f0 = self.params.f0, "started");
        Ok(())
    }

    pub fn stop(&mut self) -> SynthResult<()> {
        if self.state != EngineState::Playing {
            return Ok(());
        }
        self.send(EngineCommand::Stop)?;
        self.state = EngineState::Stopped;
        debug!("stopped");
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.state == EngineState::Playing
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    /// Bumped every time a source is instantiated.
    pub fn source_generation(&self) -> u64 {
        self.generation
    }

    pub fn f0(&self) -> f32 {
        self.params.f0
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Replaces the source. The new one is built here, started at the current
    /// f0 if the old one was playing, and swapped in at the next block
    /// boundary. On failure the current source stays in place.
    pub fn set_source_type(&mut self, kind: SourceType) -> SynthResult<()> {
        self.require_init()?;
        if kind == self.source_type {
            return Ok(());
        }

        let mut next = match self.build_source(kind) {
            Ok(source) => source,
            Err(err) => {
                warn!(%kind, %err, "source swap failed");
                return Err(err);
            }
        };
        if self.is_playing() {
            next.start(self.params.f0);
        }
        self.send(EngineCommand::SwapSource(next))?;

        info!(from = %self.source_type, to = %kind, "source swapped");
        self.source_type = kind;
        self.generation += 1;
        Ok(())
    }

    pub fn set_f0(&mut self, hz: f32) -> SynthResult<()> {
        let hz = validate_frequency("f0", hz)?;
        let hz = KernelSpec::for_model(PulseModel::Rosenberg).clamp(KernelParam::F0, hz);
        self.update(|p| p.f0 = hz);
        Ok(())
    }

    pub fn set_formants(&mut self, f1: f32, f2: f32, f3: f32) -> SynthResult<()> {
        let f1 = validate_frequency("f1", f1)?;
        let f2 = validate_frequency("f2", f2)?;
        let f3 = validate_frequency("f3", f3)?;
        self.update(|p| p.formants = [f1, f2, f3]);
        Ok(())
    }

    pub fn set_f1_bandwidth(&mut self, hz: f32) -> SynthResult<()> {
        let hz = validate_bandwidth("f1Bandwidth", hz)?;
        self.update(|p| p.f1_bandwidth = Some(hz));
        Ok(())
    }

    pub fn set_f2_bandwidth(&mut self, hz: f32) -> SynthResult<()> {
        let hz = validate_bandwidth("f2Bandwidth", hz)?;
        self.update(|p| p.f2_bandwidth = Some(hz));
        Ok(())
    }

    pub fn set_f1_gain(&mut self, db: f32) -> SynthResult<()> {
        let db = validate_gain("f1Gain", db)?;
        self.update(|p| p.f1_gain = db);
        Ok(())
    }

    pub fn set_f2_gain(&mut self, db: f32) -> SynthResult<()> {
        let db = validate_gain("f2Gain", db)?;
        self.update(|p| p.f2_gain = db);
        Ok(())
    }

    /// Jitter in percent. Ignored by the Sawtooth source but kept for the next swap.
    pub fn set_jitter(&mut self, percent: f32) -> SynthResult<()> {
        if !percent.is_finite() {
            return Err(SynthError::InvalidParameter {
                name: "jitter",
                value: percent,
            });
        }
        let percent = KernelSpec::for_model(PulseModel::Lf).clamp(KernelParam::Jitter, percent);
        self.update(|p| p.jitter = percent);
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f32) -> SynthResult<()> {
        if !volume.is_finite() {
            return Err(SynthError::InvalidParameter {
                name: "volume",
                value: volume,
            });
        }
        let volume = volume.clamp(0.0, 1.0);
        self.update(|p| p.volume = volume);
        Ok(())
    }

    pub fn volume(&self) -> f32 {
        self.params.volume
    }

    /// Moves formants, bandwidths and gains to a preset.
    pub fn apply_vowel(&mut self, vowel: &VowelPreset) -> SynthResult<()> {
        self.set_formants(vowel.f1, vowel.f2, vowel.f3)?;
        self.set_f1_bandwidth(vowel.f1_bandwidth)?;
        self.set_f2_bandwidth(vowel.f2_bandwidth)?;
        self.set_f1_gain(vowel.f1_gain)?;
        self.set_f2_gain(vowel.f2_gain)?;
        debug!(ipa = vowel.ipa, label = vowel.label, "vowel applied");
        Ok(())
    }

    /// Resonator bank response in dB at the current (unmodulated) settings.
    pub fn formant_response_db(&self, frequencies: &[f32]) -> Vec<f32> {
        let mut bank = FormantBank::new(
            self.config.sample_rate,
            self.config.smoothing_time,
            &mut SmallRng::seed_from_u64(0),
        );
        self.params.configure(&mut bank);
        bank.magnitude_response_db(frequencies)
    }

    /// The analysis tap, drained up to the latest rendered sample.
    pub fn analyser(&mut self) -> Option<&mut Analyser> {
        let analyser = self.analyser.as_mut()?;
        analyser.poll();
        Some(analyser)
    }

    pub fn levels(&mut self) -> Option<Levels> {
        self.analyser().map(|a| a.levels())
    }

    fn require_init(&self) -> SynthResult<()> {
        if self.state == EngineState::Uninitialized {
            Err(SynthError::NotInitialized)
        } else {
            Ok(())
        }
    }

    fn build_source(&mut self, kind: SourceType) -> SynthResult<GlottalSource> {
        let rng = SmallRng::seed_from_u64(self.rng.gen());
        let mut source = GlottalSource::create(
            kind,
            &self.registry,
            self.config.sample_rate,
            self.config.smoothing_time,
            self.params.f0,
            rng,
        )?;
        source.set_jitter(self.params.jitter);
        Ok(source)
    }

    /// Records a continuous value and publishes the whole set. The engine
    /// picks it up at its next block boundary, or at construction before init.
    fn update(&mut self, change: impl FnOnce(&mut ChainParams)) {
        change(&mut self.params);
        self.shared.publish(&self.params);
    }

    /// Queues a structural command. Callers commit their own state only
    /// after this succeeds. Before init there is no engine yet.
    fn send(&mut self, command: EngineCommand) -> SynthResult<()> {
        match self.commands.as_mut() {
            Some(tx) => tx.push(command).map_err(|_| SynthError::CommandQueueFull),
            None => Ok(()),
        }
    }
}
