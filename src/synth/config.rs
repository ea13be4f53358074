#[derive(Clone, Debug)]
pub struct SynthConfig {
    pub sample_rate: f32,
    pub smoothing_time: f32, // Exponential time constant for every control ramp, seconds
    pub command_capacity: usize,
    pub fft_size: usize,
    pub analysis_smoothing: f32,
    pub max_block_size: usize, // Scratch space preallocated for the audio callback
}

impl SynthConfig {
    pub fn with_sample_rate(&self, sample_rate: f32) -> Self {
        Self {
            sample_rate,
            ..self.clone()
        }
    }

    /// Samples of history the audio thread overwrites for the analyser:
    /// one analysis window plus the largest block rendered at once.
    pub fn analysis_capacity(&self) -> usize {
        self.fft_size + self.max_block_size
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0, // Replaced by the device rate on init
            smoothing_time: 0.02,
            command_capacity: 256,
            fft_size: 4096,
            analysis_smoothing: 0.7,
            max_block_size: 4096,
        }
    }
}
