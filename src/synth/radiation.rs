use super::filter::{Biquad, BiquadCoeffs};

pub const LIP_SHELF_HZ: f32 = 1000.0;
pub const LIP_SHELF_GAIN_DB: f32 = 6.0;

/// Fixed +6 dB high shelf standing in for lip radiation. Lows pass unchanged.
#[derive(Clone, Debug)]
pub struct LipRadiation {
    filter: Biquad,
}

impl LipRadiation {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            filter: Biquad::new(BiquadCoeffs::high_shelf(
                LIP_SHELF_HZ,
                LIP_SHELF_GAIN_DB,
                sample_rate,
            )),
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.filter.process(input)
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        self.filter.coeffs()
    }

    pub fn reset(&mut self) {
        self.filter.reset();
    }
}
