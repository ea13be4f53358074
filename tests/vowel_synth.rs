use std::sync::Arc;

use vowelsynth::audio::ManualBackend;
use vowelsynth::error::SynthError;
use vowelsynth::synth::config::SynthConfig;
use vowelsynth::synth::control::{EngineState, VowelSynth};
use vowelsynth::synth::kernels::KernelRegistry;
use vowelsynth::synth::resonator::Formant;
use vowelsynth::synth::source::SourceType;
use vowelsynth::synth::vowel;

const SR: f32 = 48000.0;

fn synth() -> VowelSynth<ManualBackend> {
    VowelSynth::new(ManualBackend::new(SR), SynthConfig::default()).with_seed(42)
}

fn running_synth() -> VowelSynth<ManualBackend> {
    let mut synth = synth();
    synth.init().unwrap();
    synth.resume().unwrap();
    synth
}

fn render(synth: &mut VowelSynth<ManualBackend>, samples: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(samples);
    let mut block = [0.0f32; 128];
    while out.len() < samples {
        synth.backend_mut().render(&mut block);
        out.extend_from_slice(&block);
    }
    out.truncate(samples);
    out
}

fn local_maxima(freqs: &[f32], db: &[f32]) -> Vec<f32> {
    (1..db.len() - 1)
        .filter(|&i| db[i] > db[i - 1] && db[i] >= db[i + 1])
        .map(|i| freqs[i])
        .collect()
}

#[test]
fn default_chain_peaks_at_default_formants() {
    let mut synth = running_synth();
    synth.start().unwrap();
    render(&mut synth, SR as usize / 2);

    let freqs: Vec<f32> = (200..3200).map(|f| f as f32).collect();
    let bank = synth.backend().engine().unwrap().formant_bank();
    let db = bank.magnitude_response_db(&freqs);
    let peaks = local_maxima(&freqs, &db);

    for target in [500.0f32, 1500.0, 2500.0] {
        assert!(
            peaks.iter().any(|p| (p - target).abs() <= target * 0.02),
            "no peak near {target} Hz in {peaks:?}"
        );
    }
    let nominal = synth.formant_response_db(&freqs);
    for (a, b) in nominal.iter().zip(&db) {
        assert!((a - b).abs() < 1e-3, "control-side response drifted");
    }
}

#[test]
fn lf_source_period_follows_f0() {
    let mut synth = running_synth();
    synth.set_source_type(SourceType::Lf).unwrap();
    synth.set_jitter(0.0).unwrap();
    synth.set_f0(200.0).unwrap();
    synth.start().unwrap();

    let out = render(&mut synth, SR as usize);
    let tail = &out[out.len() / 2..];
    let window = 4096;
    let correlation = |lag: usize| -> f32 {
        (0..window).map(|i| tail[i] * tail[i + lag]).sum()
    };
    let best = (100..400)
        .max_by(|&a, &b| correlation(a).total_cmp(&correlation(b)))
        .unwrap();
    assert_eq!(best, (SR / 200.0) as usize);

    let engine = synth.backend().engine().unwrap();
    assert_eq!(engine.source().kind(), SourceType::Lf);
    assert!(engine.is_playing());
}

#[test]
fn volume_change_ramps_up() {
    let mut synth = running_synth();
    synth.start().unwrap();
    synth.set_volume(0.0).unwrap();
    render(&mut synth, SR as usize / 2);

    synth.set_volume(1.0).unwrap();
    // One window per sawtooth period at 120 Hz.
    let period = 400;
    let mut previous = 0.0f32;
    loop {
        let window = render(&mut synth, period);
        let peak = window.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak + 1e-6 >= previous, "envelope fell from {previous} to {peak}");
        previous = peak;
        if synth.backend().engine().unwrap().master_gain() > 0.95 {
            break;
        }
    }
    assert!(previous > 0.0);
}

#[test]
fn same_source_type_is_a_no_op() {
    let mut synth = running_synth();
    synth.start().unwrap();
    let generation = synth.source_generation();
    synth.set_source_type(SourceType::Sawtooth).unwrap();
    assert_eq!(synth.source_generation(), generation);
    assert!(synth.is_playing());
}

#[test]
fn swap_while_playing_keeps_running() {
    let mut synth = running_synth();
    synth.start().unwrap();
    render(&mut synth, 512);

    for kind in [SourceType::Rosenberg, SourceType::Lf, SourceType::Sawtooth] {
        let before = synth.source_generation();
        synth.set_source_type(kind).unwrap();
        assert!(synth.is_playing());
        assert_eq!(synth.source_generation(), before + 1);

        let out = render(&mut synth, 1024);
        let engine = synth.backend().engine().unwrap();
        assert_eq!(engine.source().kind(), kind);
        assert!(engine.is_playing());
        assert!(out.iter().any(|s| *s != 0.0));
    }
}

#[test]
fn swap_while_stopped_stays_stopped() {
    let mut synth = running_synth();
    synth.set_source_type(SourceType::Rosenberg).unwrap();
    let out = render(&mut synth, 1024);
    assert!(out.iter().all(|s| *s == 0.0));
    assert!(!synth.backend().engine().unwrap().is_playing());
}

#[test]
fn init_is_idempotent() {
    let mut synth = synth();
    assert_eq!(synth.state(), EngineState::Uninitialized);
    synth.init().unwrap();
    let generation = synth.source_generation();
    synth.init().unwrap();
    assert_eq!(synth.state(), EngineState::Ready);
    assert_eq!(synth.source_generation(), generation);
    assert_eq!(synth.source_type(), SourceType::Sawtooth);
    assert_eq!(synth.config().sample_rate, SR);
}

#[test]
fn blocked_output_can_be_retried() {
    let mut backend = ManualBackend::new(SR);
    backend.set_available(false);
    let mut synth = VowelSynth::new(backend, SynthConfig::default());

    assert!(matches!(synth.init(), Err(SynthError::AudioUnavailable(_))));
    assert_eq!(synth.state(), EngineState::Uninitialized);

    synth.backend_mut().set_available(true);
    synth.init().unwrap();
    assert_eq!(synth.state(), EngineState::Ready);
}

#[test]
fn failed_kernel_load_rejects_init() {
    let registry = Arc::new(KernelRegistry::new());
    assert!(registry.load(4000.0).is_err());

    let mut synth = VowelSynth::with_registry(ManualBackend::new(SR), SynthConfig::default(), registry);
    assert!(matches!(synth.init(), Err(SynthError::ModuleLoad { .. })));
    assert_eq!(synth.state(), EngineState::Uninitialized);
}

#[test]
fn calls_before_init() {
    let mut synth = synth();
    assert_eq!(synth.start(), Err(SynthError::NotInitialized));
    assert_eq!(
        synth.set_source_type(SourceType::Lf),
        Err(SynthError::NotInitialized)
    );

    synth.set_f0(180.0).unwrap();
    synth.set_formants(300.0, 870.0, 2240.0).unwrap();
    synth.set_f1_bandwidth(60.0).unwrap();
    synth.init().unwrap();

    let bank = synth.backend().engine().unwrap().formant_bank();
    assert_eq!(bank.resonator(Formant::F1).center_target(), 300.0);
    assert_eq!(bank.resonator(Formant::F1).q_target(), 5.0);
    assert_eq!(synth.f0(), 180.0);
}

#[test]
fn setters_work_before_start() {
    let mut synth = running_synth();
    synth.set_formants(270.0, 2290.0, 3010.0).unwrap();
    synth.set_f2_gain(18.0).unwrap();
    render(&mut synth, 256);
    assert_eq!(synth.state(), EngineState::Ready);

    let bank = synth.backend().engine().unwrap().formant_bank();
    let f2 = bank.resonator(Formant::F2);
    assert_eq!(f2.center_target(), 2290.0);
    assert!((f2.modulation_depth() - 2290.0 * 0.03).abs() < 1e-3);
    assert_eq!(f2.gain_target(), 18.0);
}

#[test]
fn invalid_values_are_rejected_and_clamped() {
    let mut synth = running_synth();
    assert!(matches!(
        synth.set_f1_bandwidth(0.0),
        Err(SynthError::InvalidParameter { .. })
    ));
    assert!(synth.set_f0(f32::NAN).is_err());
    assert!(synth.set_volume(f32::INFINITY).is_err());

    synth.set_f0(5000.0).unwrap();
    assert_eq!(synth.f0(), 1000.0);
    synth.set_volume(3.0).unwrap();
    assert_eq!(synth.volume(), 1.0);
    synth.set_jitter(-2.0).unwrap();
    assert_eq!(synth.params().jitter, 0.0);
}

#[test]
fn vowel_preset_reaches_the_bank() {
    let mut synth = running_synth();
    let goose = vowel::find_nearest(300.0, 870.0);
    synth.apply_vowel(goose).unwrap();
    render(&mut synth, 128);

    let bank = synth.backend().engine().unwrap().formant_bank();
    assert_eq!(bank.resonator(Formant::F1).center_target(), goose.f1);
    assert_eq!(bank.resonator(Formant::F2).bandwidth(), Some(goose.f2_bandwidth));
    assert_eq!(bank.resonator(Formant::F3).center_target(), goose.f3);
}

#[test]
fn stop_then_start_again() {
    let mut synth = running_synth();
    synth.start().unwrap();
    synth.stop().unwrap();
    assert_eq!(synth.state(), EngineState::Stopped);
    let out = render(&mut synth, 512);
    assert!(!synth.backend().engine().unwrap().is_playing());
    assert!(out.iter().all(|s| s.is_finite()));

    synth.start().unwrap();
    assert_eq!(synth.state(), EngineState::Playing);
}

#[test]
fn analyser_sees_the_output() {
    let mut synth = running_synth();
    synth.start().unwrap();
    render(&mut synth, 8192);

    let levels = synth.levels().unwrap();
    assert!(levels.rms_db > -60.0);

    let analyser = synth.analyser().unwrap();
    let spectrum = analyser.frequency_data_db();
    assert_eq!(spectrum.len(), analyser.bin_count());
    assert!(spectrum.iter().all(|v| v.is_finite()));
}

#[test]
fn setter_bursts_before_resume_keep_engine_in_sync() {
    let mut synth = synth();
    synth.init().unwrap();
    let capacity = synth.config().command_capacity;
    for i in 0..capacity + 44 {
        synth.set_volume((i % 10) as f32 / 10.0).unwrap();
        synth.set_f0(100.0 + i as f32).unwrap();
    }
    synth.set_volume(0.9).unwrap();
    synth.set_formants(300.0, 870.0, 2240.0).unwrap();
    synth.resume().unwrap();
    synth.start().unwrap();
    render(&mut synth, 400 * 128);

    let engine = synth.backend().engine().unwrap();
    assert_eq!(engine.master_gain(), 0.9);
    assert_eq!(engine.formant_bank().resonator(Formant::F2).center_target(), 870.0);
    assert_eq!(synth.volume(), 0.9);
}

#[test]
fn full_command_queue_leaves_state_unchanged() {
    let mut synth = synth();
    synth.init().unwrap();
    let kinds = [SourceType::Rosenberg, SourceType::Lf];
    let mut rejected = None;
    for i in 0..synth.config().command_capacity + 8 {
        let kind = kinds[i % 2];
        let (before_kind, before_generation) = (synth.source_type(), synth.source_generation());
        match synth.set_source_type(kind) {
            Ok(()) => assert_eq!(synth.source_type(), kind),
            Err(err) => {
                assert_eq!(err, SynthError::CommandQueueFull);
                assert_eq!(synth.source_type(), before_kind);
                assert_eq!(synth.source_generation(), before_generation);
                rejected = Some(before_kind);
                break;
            }
        }
    }
    let current = rejected.expect("queue never filled");

    // Draining the queue lets the engine catch up with the control side.
    synth.resume().unwrap();
    render(&mut synth, 128);
    assert_eq!(synth.backend().engine().unwrap().source().kind(), current);
    synth.start().unwrap();
    assert!(synth.is_playing());
}

#[test]
fn slow_poll_reports_current_levels() {
    let mut synth = running_synth();
    synth.start().unwrap();
    render(&mut synth, SR as usize);
    synth.stop().unwrap();
    // A second of silence between polls, well past the analysis window.
    render(&mut synth, SR as usize);

    let levels = synth.levels().unwrap();
    assert!(levels.rms_db < -100.0, "stale audio in the tap: {levels:?}");
}

#[test]
fn shared_registry_checks_each_device_rate() {
    let registry = Arc::new(KernelRegistry::new());
    let mut first =
        VowelSynth::with_registry(ManualBackend::new(SR), SynthConfig::default(), Arc::clone(&registry));
    first.init().unwrap();

    let mut second =
        VowelSynth::with_registry(ManualBackend::new(4000.0), SynthConfig::default(), registry);
    assert!(matches!(second.init(), Err(SynthError::ModuleLoad { .. })));
    assert_eq!(second.state(), EngineState::Uninitialized);
    assert_eq!(first.state(), EngineState::Ready);
}
