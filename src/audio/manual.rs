use crate::audio::AudioBackend;
use crate::error::{SynthError, SynthResult};
use crate::synth::engine::SynthEngine;

/// Headless backend that renders on the calling thread.
///
/// Used for offline rendering and tests: nothing plays until `render` is
/// called, and `set_available(false)` simulates a host that refuses audio.
pub struct ManualBackend {
    sample_rate: f32,
    available: bool,
    running: bool,
    engine: Option<SynthEngine>,
}

impl ManualBackend {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            available: true,
            running: false,
            engine: None,
        }
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn engine(&self) -> Option<&SynthEngine> {
        self.engine.as_ref()
    }

    /// Fills `output` with the next block. Silent while suspended.
    pub fn render(&mut self, output: &mut [f32]) {
        match self.engine.as_mut() {
            Some(engine) if self.running => engine.process(output),
            _ => output.fill(0.0),
        }
    }

    pub fn render_samples(&mut self, count: usize) -> Vec<f32> {
        let mut output = vec![0.0; count];
        self.render(&mut output);
        output
    }
}

impl AudioBackend for ManualBackend {
    fn prepare(&mut self) -> SynthResult<f32> {
        if self.available {
            Ok(self.sample_rate)
        } else {
            Err(SynthError::AudioUnavailable(
                "audio output blocked by host".into(),
            ))
        }
    }

    fn launch(&mut self, engine: SynthEngine) -> SynthResult<()> {
        self.engine = Some(engine);
        Ok(())
    }

    fn resume(&mut self) -> SynthResult<()> {
        if self.engine.is_none() {
            return Err(SynthError::NotInitialized);
        }
        self.running = true;
        Ok(())
    }

    fn suspend(&mut self) -> SynthResult<()> {
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
