use super::smoother::ParamSmoother;

// Raw sawtooth peaks at +/-1; this trims it to sit with the other variants.
const SAWTOOTH_OUTPUT_GAIN: f32 = 0.5;

/// Band-limited sawtooth oscillator, driven directly at audio rate.
///
/// A sawtooth approximates the derivative of glottal flow. It is the cheapest
/// source and carries no jitter: only its frequency is smoothed.
#[derive(Clone, Debug)]
pub struct SawtoothSource {
    sample_rate: f32,
    frequency: ParamSmoother,
    phase: f64,
    running: bool,
}

impl SawtoothSource {
    pub fn new(sample_rate: f32, smoothing_time: f32, f0: f32) -> Self {
        Self {
            sample_rate,
            frequency: ParamSmoother::new(f0, sample_rate, smoothing_time),
            phase: 0.0,
            running: false,
        }
    }

    /// Only a running oscillator follows frequency changes; `start` seeds the next one.
    pub fn set_frequency(&mut self, f0: f32) {
        if self.running {
            self.frequency.set_target(f0);
        }
    }

    pub fn start(&mut self, f0: f32) {
        if self.running {
            return;
        }
        self.frequency.set_immediate(f0);
        self.phase = 0.0;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.phase = 0.0;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn frequency(&self) -> f32 {
        self.frequency.value()
    }

    pub fn render(&mut self, output: &mut [f32]) {
        if !self.running {
            output.fill(0.0);
            return;
        }
        for sample in output.iter_mut() {
            let increment = self.frequency.next() as f64 / self.sample_rate as f64;
            *sample = (sawtooth(self.phase) - poly_blep(self.phase, increment)) as f32
                * SAWTOOTH_OUTPUT_GAIN;

            self.phase += increment;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }
}

/// Naive sawtooth: 0 at phase 0, rising to +1 at half a cycle, then jumping to -1.
pub fn sawtooth(phase: f64) -> f64 {
    2.0 * (phase - (phase + 0.5).floor())
}

/// Polynomial band-limited step correction around the discontinuity at phase 0.5.
fn poly_blep(phase: f64, increment: f64) -> f64 {
    if increment <= 0.0 {
        return 0.0;
    }
    // The jump sits at 0.5; shift so it lands on the wrap point.
    let mut t = phase + 0.5;
    if t >= 1.0 {
        t -= 1.0;
    }
    if t < increment {
        let t = t / increment;
        t + t - t * t - 1.0
    } else if t > 1.0 - increment {
        let t = (t - 1.0) / increment;
        t * t + t + t + 1.0
    } else {
        0.0
    }
}
