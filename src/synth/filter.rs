use std::f32::consts::PI;

// Frequencies are kept strictly inside (0, nyquist) so the cookbook formulas stay finite.
const MIN_FREQUENCY: f32 = 10.0;
const MAX_NYQUIST_FRACTION: f32 = 0.49;
const MIN_Q: f32 = 0.05;

/// Normalised biquad coefficients (a0 == 1), Audio EQ Cookbook formulas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoeffs {
    /// Unity passthrough.
    pub fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Peaking (bell) boost or cut around `frequency`.
    pub fn peaking(frequency: f32, q: f32, db_gain: f32, sample_rate: f32) -> Self {
        let q = q.max(MIN_Q);
        let a = 10.0_f32.powf(db_gain / 40.0);
        let omega = 2.0 * PI * clamp_frequency(frequency, sample_rate) / sample_rate;
        let (sin_omega, cos_omega) = omega.sin_cos();
        let alpha = sin_omega / (2.0 * q);

        let b0 = 1.0 + alpha * a;
        let b1 = -2.0 * cos_omega;
        let b2 = 1.0 - alpha * a;
        let a0 = 1.0 + alpha / a;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha / a;

        Self::normalised(b0, b1, b2, a0, a1, a2)
    }

    /// High shelf with slope S = 1, the shape a browser `highshelf` node produces.
    pub fn high_shelf(frequency: f32, db_gain: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(db_gain / 40.0);
        let omega = 2.0 * PI * clamp_frequency(frequency, sample_rate) / sample_rate;
        let (sin_omega, cos_omega) = omega.sin_cos();
        // S = 1  =>  alpha = sin(w0)/2 * sqrt(2)
        let alpha = sin_omega / 2.0 * std::f32::consts::SQRT_2;
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let b0 = a * ((a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha);
        let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega);
        let b2 = a * ((a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha);
        let a0 = (a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha;
        let a1 = 2.0 * ((a - 1.0) - (a + 1.0) * cos_omega);
        let a2 = (a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha;

        Self::normalised(b0, b1, b2, a0, a1, a2)
    }

    fn normalised(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Magnitude response in dB at `frequency`.
    pub fn magnitude_db(&self, frequency: f32, sample_rate: f32) -> f32 {
        let w = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
        let (s1, c1) = w.sin_cos();
        let (s2, c2) = (2.0 * w).sin_cos();
        let (b0, b1, b2) = (self.b0 as f64, self.b1 as f64, self.b2 as f64);
        let (a1, a2) = (self.a1 as f64, self.a2 as f64);

        let num_re = b0 + b1 * c1 + b2 * c2;
        let num_im = -(b1 * s1 + b2 * s2);
        let den_re = 1.0 + a1 * c1 + a2 * c2;
        let den_im = -(a1 * s1 + a2 * s2);

        let num = num_re * num_re + num_im * num_im;
        let den = (den_re * den_re + den_im * den_im).max(1e-30);
        (10.0 * (num / den).max(1e-30).log10()) as f32
    }

    pub fn is_finite(&self) -> bool {
        self.b0.is_finite()
            && self.b1.is_finite()
            && self.b2.is_finite()
            && self.a1.is_finite()
            && self.a2.is_finite()
    }
}

/// Transposed direct form II biquad. Coefficients can change every sample without
/// resetting the state.
#[derive(Clone, Copy, Debug)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    z1: f32,
    z2: f32,
}

impl Biquad {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        if coeffs.is_finite() {
            self.coeffs = coeffs;
        }
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let c = &self.coeffs;
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;
        output
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

/// One-pole low-pass `y = c*y + (1-c)*x` with `c = exp(-2*pi*fc/fs)`.
#[derive(Clone, Copy, Debug)]
pub struct OnePoleLowpass {
    coeff: f64,
    state: f64,
}

impl OnePoleLowpass {
    pub fn new(cutoff: f64, sample_rate: f64) -> Self {
        Self {
            coeff: (-2.0 * std::f64::consts::PI * cutoff / sample_rate).exp(),
            state: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        self.state = self.coeff * self.state + (1.0 - self.coeff) * input;
        self.state
    }

    pub fn coeff(&self) -> f64 {
        self.coeff
    }
}

fn clamp_frequency(frequency: f32, sample_rate: f32) -> f32 {
    frequency.clamp(MIN_FREQUENCY, sample_rate * MAX_NYQUIST_FRACTION)
}
