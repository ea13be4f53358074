use rand::Rng;

use super::filter::{Biquad, BiquadCoeffs};
use super::smoother::ParamSmoother;
use crate::error::{SynthError, SynthResult};

/// Modulation depth as a fraction of the resonator's center frequency.
pub const MOD_DEPTH_RATIO: f32 = 0.03;
// LFOs after the first start up to this many seconds "late".
const LFO_START_SPREAD: f64 = 0.3;
const MIN_Q: f32 = 0.1;
const MAX_Q: f32 = 200.0;
const MAX_GAIN_DB: f32 = 40.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Formant {
    F1,
    F2,
    F3,
}

impl Formant {
    pub const ALL: [Formant; 3] = [Formant::F1, Formant::F2, Formant::F3];

    fn index(self) -> usize {
        match self {
            Formant::F1 => 0,
            Formant::F2 => 1,
            Formant::F3 => 2,
        }
    }

    pub fn default_center(self) -> f32 {
        [500.0, 1500.0, 2500.0][self.index()]
    }

    pub fn default_q(self) -> f32 {
        [8.0, 12.0, 15.0][self.index()]
    }

    pub fn default_gain_db(self) -> f32 {
        [18.0, 15.0, 12.0][self.index()]
    }

    /// Distinct rates keep the three formants from drifting in lockstep.
    pub fn lfo_rate(self) -> f32 {
        [2.3, 3.1, 2.7][self.index()]
    }
}

pub(crate) fn validate_frequency(name: &'static str, hz: f32) -> SynthResult<f32> {
    if hz.is_finite() && hz > 0.0 {
        Ok(hz)
    } else {
        Err(SynthError::InvalidParameter { name, value: hz })
    }
}

pub(crate) fn validate_bandwidth(name: &'static str, hz: f32) -> SynthResult<f32> {
    validate_frequency(name, hz)
}

pub(crate) fn validate_gain(name: &'static str, db: f32) -> SynthResult<f32> {
    if db.is_finite() {
        Ok(db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB))
    } else {
        Err(SynthError::InvalidParameter { name, value: db })
    }
}

/// Low-rate sine perturbing a resonator's center frequency.
#[derive(Clone, Debug)]
pub struct ModulationLfo {
    phase: f64,
    increment: f64,
    depth: ParamSmoother,
}

impl ModulationLfo {
    fn new(rate: f32, phase: f64, depth: f32, sample_rate: f32, smoothing_time: f32) -> Self {
        Self {
            phase: phase.rem_euclid(1.0),
            increment: rate as f64 / sample_rate as f64,
            depth: ParamSmoother::new(depth, sample_rate, smoothing_time),
        }
    }

    /// Offset in Hz for this sample.
    #[inline]
    fn next(&mut self) -> f32 {
        let offset = self.depth.next() * (std::f64::consts::TAU * self.phase).sin() as f32;
        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        offset
    }
}

/// One peaking resonator with its own modulation source.
#[derive(Clone, Debug)]
pub struct FormantResonator {
    sample_rate: f32,
    center: ParamSmoother,
    q: ParamSmoother,
    gain_db: ParamSmoother,
    bandwidth: Option<f32>,
    lfo: ModulationLfo,
    filter: Biquad,
}

impl FormantResonator {
    pub fn new(formant: Formant, sample_rate: f32, smoothing_time: f32, lfo_phase: f64) -> Self {
        let center = formant.default_center();
        let q = formant.default_q();
        let gain = formant.default_gain_db();
        let smoother = |v| ParamSmoother::new(v, sample_rate, smoothing_time);
        Self {
            sample_rate,
            center: smoother(center),
            q: smoother(q),
            gain_db: smoother(gain),
            bandwidth: None,
            lfo: ModulationLfo::new(
                formant.lfo_rate(),
                lfo_phase,
                center * MOD_DEPTH_RATIO,
                sample_rate,
                smoothing_time,
            ),
            filter: Biquad::new(BiquadCoeffs::peaking(center, q, gain, sample_rate)),
        }
    }

    /// Ramps the center; modulation depth and (if a bandwidth is set) Q follow it.
    pub fn set_center(&mut self, hz: f32) -> SynthResult<()> {
        let hz = validate_frequency("formant frequency", hz)?;
        self.center.set_target(hz);
        self.lfo.depth.set_target(hz * MOD_DEPTH_RATIO);
        if let Some(bw) = self.bandwidth {
            self.q.set_target(q_for(hz, bw));
        }
        Ok(())
    }

    pub fn set_center_immediate(&mut self, hz: f32) -> SynthResult<()> {
        let hz = validate_frequency("formant frequency", hz)?;
        self.center.set_immediate(hz);
        self.lfo.depth.set_immediate(hz * MOD_DEPTH_RATIO);
        if let Some(bw) = self.bandwidth {
            self.q.set_immediate(q_for(hz, bw));
        }
        Ok(())
    }

    /// Q becomes center / bandwidth, ramped.
    pub fn set_bandwidth(&mut self, hz: f32) -> SynthResult<()> {
        let hz = validate_bandwidth("formant bandwidth", hz)?;
        self.bandwidth = Some(hz);
        self.q.set_target(q_for(self.center.target(), hz));
        Ok(())
    }

    pub fn set_bandwidth_immediate(&mut self, hz: f32) -> SynthResult<()> {
        let hz = validate_bandwidth("formant bandwidth", hz)?;
        self.bandwidth = Some(hz);
        self.q.set_immediate(q_for(self.center.target(), hz));
        Ok(())
    }

    pub fn set_gain(&mut self, db: f32) -> SynthResult<()> {
        self.gain_db.set_target(validate_gain("formant gain", db)?);
        Ok(())
    }

    pub fn set_gain_immediate(&mut self, db: f32) -> SynthResult<()> {
        self.gain_db.set_immediate(validate_gain("formant gain", db)?);
        Ok(())
    }

    pub fn center(&self) -> f32 {
        self.center.value()
    }

    pub fn center_target(&self) -> f32 {
        self.center.target()
    }

    pub fn q_target(&self) -> f32 {
        self.q.target()
    }

    pub fn gain_target(&self) -> f32 {
        self.gain_db.target()
    }

    pub fn bandwidth(&self) -> Option<f32> {
        self.bandwidth
    }

    /// Modulation depth the LFO is heading to, always `MOD_DEPTH_RATIO` of the target center.
    pub fn modulation_depth(&self) -> f32 {
        self.lfo.depth.target()
    }

    /// Coefficients at the smoothed, unmodulated center.
    pub fn nominal_coeffs(&self) -> BiquadCoeffs {
        BiquadCoeffs::peaking(
            self.center.value(),
            self.q.value(),
            self.gain_db.value(),
            self.sample_rate,
        )
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let center = self.center.next() + self.lfo.next();
        let q = self.q.next();
        let gain = self.gain_db.next();
        self.filter
            .set_coeffs(BiquadCoeffs::peaking(center, q, gain, self.sample_rate));
        self.filter.process(input)
    }

    pub fn reset(&mut self) {
        self.filter.reset();
    }
}

fn q_for(center: f32, bandwidth: f32) -> f32 {
    (center / bandwidth).clamp(MIN_Q, MAX_Q)
}

/// F1 -> F2 -> F3 cascade.
#[derive(Clone, Debug)]
pub struct FormantBank {
    sample_rate: f32,
    resonators: [FormantResonator; 3],
}

impl FormantBank {
    pub fn new<R: Rng>(sample_rate: f32, smoothing_time: f32, rng: &mut R) -> Self {
        let resonators = Formant::ALL.map(|formant| {
            let delay = match formant {
                Formant::F1 => 0.0,
                _ => rng.gen_range(0.0..LFO_START_SPREAD),
            };
            // A late start of `delay` seconds shows up as a phase lag.
            let phase = -(formant.lfo_rate() as f64 * delay);
            FormantResonator::new(formant, sample_rate, smoothing_time, phase)
        });
        Self {
            sample_rate,
            resonators,
        }
    }

    pub fn resonator(&self, formant: Formant) -> &FormantResonator {
        &self.resonators[formant.index()]
    }

    pub fn resonator_mut(&mut self, formant: Formant) -> &mut FormantResonator {
        &mut self.resonators[formant.index()]
    }

    pub fn set_formants(&mut self, f1: f32, f2: f32, f3: f32) -> SynthResult<()> {
        let centers = validate_formants(f1, f2, f3)?;
        for (resonator, hz) in self.resonators.iter_mut().zip(centers) {
            resonator.set_center(hz)?;
        }
        Ok(())
    }

    pub fn set_formants_immediate(&mut self, f1: f32, f2: f32, f3: f32) -> SynthResult<()> {
        let centers = validate_formants(f1, f2, f3)?;
        for (resonator, hz) in self.resonators.iter_mut().zip(centers) {
            resonator.set_center_immediate(hz)?;
        }
        Ok(())
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.resonators
            .iter_mut()
            .fold(input, |signal, resonator| resonator.process(signal))
    }

    /// Cascade magnitude in dB at each frequency, without the modulation offset.
    pub fn magnitude_response_db(&self, frequencies: &[f32]) -> Vec<f32> {
        let coeffs = self.resonators.each_ref().map(|r| r.nominal_coeffs());
        frequencies
            .iter()
            .map(|&f| {
                coeffs
                    .iter()
                    .map(|c| c.magnitude_db(f, self.sample_rate))
                    .sum()
            })
            .collect()
    }

    pub fn reset(&mut self) {
        for resonator in &mut self.resonators {
            resonator.reset();
        }
    }
}

fn validate_formants(f1: f32, f2: f32, f3: f32) -> SynthResult<[f32; 3]> {
    Ok([
        validate_frequency("f1", f1)?,
        validate_frequency("f2", f2)?,
        validate_frequency("f3", f3)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    const SR: f32 = 48000.0;

    fn bank() -> FormantBank {
        FormantBank::new(SR, 0.02, &mut SmallRng::seed_from_u64(5))
    }

    #[test]
    fn center_change_retargets_modulation_depth() {
        let mut bank = bank();
        bank.set_formants(320.0, 1800.0, 2700.0).unwrap();
        for (formant, hz) in Formant::ALL.into_iter().zip([320.0f32, 1800.0, 2700.0]) {
            assert_eq!(bank.resonator(formant).modulation_depth(), hz * MOD_DEPTH_RATIO);
        }
    }

    #[test]
    fn defaults_match_the_neutral_vowel() {
        let bank = bank();
        for formant in Formant::ALL {
            let r = bank.resonator(formant);
            assert_eq!(r.center_target(), formant.default_center());
            assert_eq!(r.q_target(), formant.default_q());
            assert_eq!(r.modulation_depth(), formant.default_center() * MOD_DEPTH_RATIO);
        }
    }

    #[test]
    fn bandwidth_sets_q_and_tracks_center() {
        let mut bank = bank();
        let f1 = bank.resonator_mut(Formant::F1);
        f1.set_bandwidth(100.0).unwrap();
        assert_eq!(f1.q_target(), 5.0);
        f1.set_center(700.0).unwrap();
        assert_eq!(f1.q_target(), 7.0);
    }

    #[test]
    fn invalid_values_leave_state_untouched() {
        let mut bank = bank();
        let f2 = bank.resonator_mut(Formant::F2);
        assert!(f2.set_bandwidth(0.0).is_err());
        assert!(f2.set_bandwidth(-20.0).is_err());
        assert!(f2.set_center(f32::NAN).is_err());
        assert!(f2.set_gain(f32::INFINITY).is_err());
        assert_eq!(f2.q_target(), Formant::F2.default_q());
        assert_eq!(f2.center_target(), 1500.0);
        assert!(bank.set_formants(500.0, -1.0, 2500.0).is_err());
        assert_eq!(bank.resonator(Formant::F1).center_target(), 500.0);
    }

    #[test]
    fn center_changes_ramp() {
        let mut bank = bank();
        bank.set_formants(800.0, 1500.0, 2500.0).unwrap();
        bank.process(0.0);
        let c = bank.resonator(Formant::F1).center();
        assert!(c > 500.0 && c < 800.0);
    }

    #[test]
    fn response_peaks_sit_on_the_centers() {
        let bank = bank();
        let freqs: Vec<f32> = (100..4000).map(|f| f as f32).collect();
        let db = bank.magnitude_response_db(&freqs);
        for center in [500.0f32, 1500.0, 2500.0] {
            let lo = (center * 0.9) as usize - 100;
            let hi = (center * 1.1) as usize - 100;
            let (idx, _) = db[lo..hi]
                .iter()
                .enumerate()
                .fold((0, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
            let peak = freqs[lo + idx];
            assert!((peak - center).abs() <= center * 0.02, "peak {peak} for {center}");
        }
    }

    #[test]
    fn impulse_response_stays_finite() {
        let mut bank = bank();
        let mut y = bank.process(1.0);
        for _ in 0..48000 {
            assert!(y.is_finite());
            y = bank.process(0.0);
        }
        assert!(y.abs() < 1e-3);
    }
}
