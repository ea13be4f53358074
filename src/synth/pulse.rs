//! Polynomial glottal pulse generators (Rosenberg and Liljencrants-Fant).
//!
//! Both run as block-rate kernels: parameters written by the control side are
//! picked up once per rendered block, while the waveform itself is computed per
//! sample from a phase accumulator in `[0, 1)`. Open-quotient jitter is drawn once
//! per cycle and blended into a smoothed random walk, and every raw sample passes
//! through a one-pole low-pass that supplies the source's spectral tilt.

use rand::rngs::SmallRng;
use rand::Rng;

use super::filter::OnePoleLowpass;
use super::kernels::{KernelParam, KernelSpec};
use super::smoother::ParamSmoother;

pub const TILT_CUTOFF_HZ: f64 = 3000.0;
const LF_GAIN: f64 = 0.8;
const LF_PEAK_FRACTION: f64 = 0.4;
const LF_EXCITATION_FRACTION: f64 = 0.8;
const LF_RETURN_DECAY: f64 = 3.0;

// Random-walk blend applied at each cycle boundary.
const JITTER_MEMORY: f64 = 0.7;
const JITTER_INNOVATION: f64 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PulseModel {
    Rosenberg,
    Lf,
}

impl PulseModel {
    /// Output trim applied after the kernel.
    pub fn output_gain(self) -> f32 {
        match self {
            PulseModel::Rosenberg => 0.8,
            PulseModel::Lf => 0.6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PulseModel::Rosenberg => "rosenberg",
            PulseModel::Lf => "lf",
        }
    }

    /// Unscaled glottal flow derivative at `phase` for one cycle.
    ///
    /// `oq` is the (possibly jittered) open quotient, `sq` the speed quotient;
    /// the LF shape ignores `sq`.
    pub fn shape(self, phase: f64, oq: f64, sq: f64) -> f64 {
        match self {
            PulseModel::Rosenberg => rosenberg(phase, oq, sq),
            PulseModel::Lf => liljencrants_fant(phase, oq),
        }
    }
}

/// Rosenberg pulse: a parabolic opening lobe, a linear negative return, then the closed phase.
pub fn rosenberg(t: f64, oq: f64, sq: f64) -> f64 {
    let opening_end = (oq * sq) / (1.0 + sq);
    let closing_end = oq;
    if t < opening_end {
        let u = t / opening_end;
        6.0 * u * (1.0 - u)
    } else if t < closing_end {
        let u = (t - opening_end) / (closing_end - opening_end);
        -2.0 * (1.0 - u)
    } else {
        0.0
    }
}

/// LF pulse: quarter-sine rise to Tp, cosine fall to Te, decaying negative return to Tc.
pub fn liljencrants_fant(t: f64, oq: f64) -> f64 {
    let tp = oq * LF_PEAK_FRACTION;
    let te = oq * LF_EXCITATION_FRACTION;
    let tc = oq;
    if t < tp {
        (std::f64::consts::PI / (2.0 * tp) * t).sin()
    } else if t < te {
        let u = (t - tp) / (te - tp);
        (u * std::f64::consts::PI).cos()
    } else if t < tc {
        let u = (t - te) / (tc - te);
        (-1.0 + u) * (-LF_RETURN_DECAY * u).exp()
    } else {
        0.0
    }
}

/// Per-cycle smoothed random walk of the open-quotient scale factor.
#[derive(Clone, Debug)]
pub struct CycleJitter {
    smoothed: f64,
    current: f64,
}

impl CycleJitter {
    pub fn new() -> Self {
        Self {
            smoothed: 0.0,
            current: 0.0,
        }
    }

    /// Offset applied to the open quotient for the running cycle.
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Called at each cycle boundary with jitter in percent.
    pub fn next_cycle<R: Rng>(&mut self, jitter_percent: f64, rng: &mut R) {
        let amount = jitter_percent / 100.0;
        if amount > 0.0 {
            let target = (rng.gen::<f64>() - 0.5) * 2.0 * amount;
            self.smoothed = self.smoothed * JITTER_MEMORY + target * JITTER_INNOVATION;
            self.current = self.smoothed;
        } else {
            self.current = 0.0;
        }
    }
}

impl Default for CycleJitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Block-rate parameter values read by a running kernel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelParams {
    pub f0: f32,
    pub open_quotient: f32,
    pub speed_quotient: f32,
    pub amplitude: f32,
    pub jitter: f32,
}

/// Running generator state. Created on `start`, discarded on `stop`.
#[derive(Clone, Debug)]
struct PulseKernel {
    phase: f64,
    jitter: CycleJitter,
    tilt: OnePoleLowpass,
}

/// A Rosenberg or LF source: control-side parameter ramps plus an optional running kernel.
#[derive(Clone, Debug)]
pub struct PulseSource {
    model: PulseModel,
    spec: KernelSpec,
    sample_rate: f32,
    f0: ParamSmoother,
    jitter: ParamSmoother,
    open_quotient: f32,
    speed_quotient: f32,
    amplitude: f32,
    kernel: Option<PulseKernel>,
    rng: SmallRng,
}

impl PulseSource {
    pub(crate) fn new(
        model: PulseModel,
        spec: KernelSpec,
        sample_rate: f32,
        smoothing_time: f32,
        rng: SmallRng,
    ) -> Self {
        let param = |p: KernelParam| spec.param(p).map(|d| d.default).unwrap_or(0.0);
        Self {
            model,
            spec,
            sample_rate,
            f0: ParamSmoother::new(param(KernelParam::F0), sample_rate, smoothing_time),
            jitter: ParamSmoother::new(param(KernelParam::Jitter), sample_rate, smoothing_time),
            open_quotient: param(KernelParam::OpenQuotient),
            speed_quotient: param(KernelParam::SpeedQuotient),
            amplitude: param(KernelParam::Amplitude),
            kernel: None,
            rng,
        }
    }

    pub fn model(&self) -> PulseModel {
        self.model
    }

    pub fn set_frequency(&mut self, f0: f32) {
        if self.kernel.is_some() {
            self.f0.set_target(self.spec.clamp(KernelParam::F0, f0));
        }
    }

    /// The last requested jitter is kept so the next kernel starts with it.
    pub fn set_jitter(&mut self, percent: f32) {
        let percent = self.spec.clamp(KernelParam::Jitter, percent);
        if self.kernel.is_some() {
            self.jitter.set_target(percent);
        } else {
            self.jitter.set_immediate(percent);
        }
    }

    pub fn start(&mut self, f0: f32) {
        if self.kernel.is_some() {
            return;
        }
        self.f0.set_immediate(self.spec.clamp(KernelParam::F0, f0));
        self.jitter.set_immediate(self.jitter.target());
        self.kernel = Some(PulseKernel {
            phase: 0.0,
            jitter: CycleJitter::new(),
            tilt: OnePoleLowpass::new(TILT_CUTOFF_HZ, self.sample_rate as f64),
        });
    }

    pub fn stop(&mut self) {
        self.kernel = None;
    }

    pub fn is_running(&self) -> bool {
        self.kernel.is_some()
    }

    pub fn phase(&self) -> Option<f64> {
        self.kernel.as_ref().map(|k| k.phase)
    }

    /// Values the next block will be rendered with.
    pub fn params(&self) -> KernelParams {
        KernelParams {
            f0: self.f0.value(),
            open_quotient: self.open_quotient,
            speed_quotient: self.speed_quotient,
            amplitude: self.amplitude,
            jitter: self.jitter.value(),
        }
    }

    pub fn render(&mut self, output: &mut [f32]) {
        let Some(kernel) = self.kernel.as_mut() else {
            output.fill(0.0);
            return;
        };

        // Block rate: sample the ramps once, then advance them past this block.
        let params = KernelParams {
            f0: self.f0.value(),
            open_quotient: self.open_quotient,
            speed_quotient: self.speed_quotient,
            amplitude: self.amplitude,
            jitter: self.jitter.value(),
        };
        self.f0.advance(output.len());
        self.jitter.advance(output.len());

        let increment = params.f0 as f64 / self.sample_rate as f64;
        let base_oq = params.open_quotient as f64;
        let sq = params.speed_quotient as f64;
        let scale = match self.model {
            PulseModel::Rosenberg => params.amplitude as f64,
            PulseModel::Lf => LF_GAIN,
        };
        let gain = self.model.output_gain();

        for sample in output.iter_mut() {
            let oq = base_oq * (1.0 + kernel.jitter.current());
            let raw = self.model.shape(kernel.phase, oq, sq) * scale;
            *sample = kernel.tilt.process(raw) as f32 * gain;

            kernel.phase += increment;
            if kernel.phase >= 1.0 {
                kernel.phase -= 1.0;
                kernel.jitter.next_cycle(params.jitter as f64, &mut self.rng);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::kernels::KernelRegistry;
    use rand::SeedableRng;

    const SR: f32 = 48000.0;
    const EPS: f64 = 1e-6;

    fn source(model: PulseModel) -> PulseSource {
        let registry = KernelRegistry::new();
        registry.load(SR).unwrap();
        registry
            .instantiate(model, SR, 0.02, SmallRng::seed_from_u64(7))
            .unwrap()
    }

    #[test]
    fn lf_is_continuous_at_every_boundary() {
        let oq = 0.6;
        for boundary in [oq * 0.4, oq * 0.8, oq] {
            let before = liljencrants_fant(boundary - 1e-9, oq);
            let after = liljencrants_fant(boundary, oq);
            assert!((before - after).abs() < EPS, "jump at {boundary}: {before} vs {after}");
        }
    }

    #[test]
    fn rosenberg_closes_continuously() {
        let (oq, sq) = (0.6, 2.0);
        let before = rosenberg(oq - 1e-9, oq, sq);
        let after = rosenberg(oq, oq, sq);
        assert!((before - after).abs() < EPS);
        // opening lobe returns to zero at its end
        let opening_end = oq * sq / (1.0 + sq);
        assert!(rosenberg(opening_end - 1e-9, oq, sq).abs() < EPS);
        assert_eq!(rosenberg(opening_end, oq, sq), -2.0);
    }

    #[test]
    fn shapes_start_and_end_each_cycle_at_zero() {
        for model in [PulseModel::Rosenberg, PulseModel::Lf] {
            assert_eq!(model.shape(0.0, 0.6, 2.0), 0.0);
            assert_eq!(model.shape(0.999, 0.6, 2.0), 0.0);
        }
    }

    #[test]
    fn jitter_blends_seventy_thirty() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut probe = rng.clone();
        let mut jitter = CycleJitter::new();

        jitter.next_cycle(5.0, &mut rng);
        let first = (probe.gen::<f64>() - 0.5) * 2.0 * 0.05 * 0.3;
        assert!((jitter.current() - first).abs() < 1e-12);

        jitter.next_cycle(5.0, &mut rng);
        let second = first * 0.7 + (probe.gen::<f64>() - 0.5) * 2.0 * 0.05 * 0.3;
        assert!((jitter.current() - second).abs() < 1e-12);
    }

    #[test]
    fn zero_jitter_clears_the_offset() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut jitter = CycleJitter::new();
        jitter.next_cycle(5.0, &mut rng);
        jitter.next_cycle(0.0, &mut rng);
        assert_eq!(jitter.current(), 0.0);
    }

    #[test]
    fn phase_stays_in_unit_interval_and_wraps_per_period() {
        for model in [PulseModel::Rosenberg, PulseModel::Lf] {
            let mut src = source(model);
            src.set_jitter(5.0);
            src.start(187.5);
            let mut buf = [0.0; 1];
            let mut prev = src.phase().unwrap();
            let mut wraps = 0;
            for _ in 0..(256 * 8) {
                src.render(&mut buf);
                let p = src.phase().unwrap();
                assert!((0.0..1.0).contains(&p));
                if p < prev {
                    wraps += 1;
                }
                prev = p;
            }
            assert_eq!(wraps, 8);
        }
    }

    #[test]
    fn zero_jitter_cycles_repeat_exactly() {
        for model in [PulseModel::Rosenberg, PulseModel::Lf] {
            let mut src = source(model);
            src.set_jitter(0.0);
            src.start(187.5);
            let oq = src.params().open_quotient as f64;
            let sq = src.params().speed_quotient as f64;
            // 187.5 Hz at 48 kHz is exactly 256 samples per cycle.
            let increment = 187.5 / 48000.0;
            let cycle = |k: usize| -> Vec<f64> {
                (0..256)
                    .map(|i| model.shape((i as f64 + (k * 256) as f64) * increment % 1.0, oq, sq))
                    .collect()
            };
            assert_eq!(cycle(0), cycle(3));

            let mut a = vec![0.0; 256 * 4];
            src.render(&mut a);
            let mut b = vec![0.0; 256];
            src.render(&mut b);
            // The tilt filter settles; by the fifth cycle successive periods agree.
            let mut c = vec![0.0; 256];
            src.render(&mut c);
            for (x, y) in b.iter().zip(c.iter()) {
                assert!((x - y).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn parameters_apply_at_block_rate() {
        let mut src = source(PulseModel::Lf);
        src.start(100.0);
        src.set_frequency(400.0);
        assert_eq!(src.params().f0, 100.0);
        let mut buf = [0.0; 128];
        src.render(&mut buf);
        let after = src.params().f0;
        assert!(after > 100.0 && after < 400.0);
    }

    #[test]
    fn stop_discards_the_kernel() {
        let mut src = source(PulseModel::Rosenberg);
        src.start(120.0);
        let mut buf = [0.0; 256];
        src.render(&mut buf);
        src.stop();
        assert!(!src.is_running());
        src.render(&mut buf);
        assert!(buf.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut src = source(PulseModel::Rosenberg);
        src.start(5000.0);
        assert_eq!(src.params().f0, 1000.0);
        src.set_jitter(40.0);
        assert!(src.params().jitter <= 5.0);
    }
}
