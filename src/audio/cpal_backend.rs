use std::panic::{self, AssertUnwindSafe};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, SupportedStreamConfig};
use tracing::{debug, error, info, warn};

use crate::audio::AudioBackend;
use crate::error::{SynthError, SynthResult};
use crate::synth::engine::SynthEngine;

fn unavailable(err: impl std::fmt::Display) -> SynthError {
    SynthError::AudioUnavailable(err.to_string())
}

pub struct CpalBackend {
    device_filter: Option<String>,
    device: Option<(Device, SupportedStreamConfig)>,
    stream: Option<Stream>,
    running: bool,
}

impl CpalBackend {
    /// `device_filter` picks the first output whose name contains it
    /// (case-insensitive); otherwise the host default is used.
    pub fn new(device_filter: Option<String>) -> Self {
        Self {
            device_filter,
            device: None,
            stream: None,
            running: false,
        }
    }

    fn select_device(&self) -> SynthResult<Device> {
        let host = cpal::default_host();

        if let Some(filter) = &self.device_filter {
            let needle = filter.to_lowercase();
            let devices = host.output_devices().map_err(unavailable)?;
            for device in devices {
                let name = device.name().unwrap_or_default();
                debug!(device = %name, "found output device");
                if name.to_lowercase().contains(&needle) {
                    return Ok(device);
                }
            }
            warn!(filter = %filter, "no output device matched, using default");
        }

        host.default_output_device()
            .ok_or_else(|| SynthError::AudioUnavailable("no output device available".into()))
    }

    fn build_stream(
        device: &Device,
        config: &SupportedStreamConfig,
        mut engine: SynthEngine,
    ) -> SynthResult<Stream> {
        let channels = config.channels().max(1) as usize;
        // Allocated here, never inside the callback.
        let mut mono = vec![0.0f32; engine.block_capacity()];

        let stream = device
            .build_output_stream(
                &config.config(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill_interleaved(data, channels, &mut mono, |block| engine.process(block));
                },
                |err| error!(%err, "output stream error"),
                None,
            )
            .map_err(unavailable)?;

        // Some hosts start streams on creation; hold output until resume.
        stream.pause().map_err(unavailable)?;
        Ok(stream)
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AudioBackend for CpalBackend {
    fn prepare(&mut self) -> SynthResult<f32> {
        if let Some((_, config)) = &self.device {
            return Ok(config.sample_rate().0 as f32);
        }

        let device = self.select_device()?;
        let config = device.default_output_config().map_err(unavailable)?;
        if config.sample_format() != SampleFormat::F32 {
            return Err(SynthError::UnsupportedSampleFormat(format!(
                "{:?}",
                config.sample_format()
            )));
        }

        let sample_rate = config.sample_rate().0 as f32;
        info!(
            device = %device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels(),
            "selected output device"
        );
        self.device = Some((device, config));
        Ok(sample_rate)
    }

    fn launch(&mut self, engine: SynthEngine) -> SynthResult<()> {
        let (device, config) = self.device.as_ref().ok_or(SynthError::NotInitialized)?;
        self.stream = Some(Self::build_stream(device, config, engine)?);
        self.running = false;
        Ok(())
    }

    fn resume(&mut self) -> SynthResult<()> {
        let stream = self.stream.as_ref().ok_or(SynthError::NotInitialized)?;
        stream.play().map_err(unavailable)?;
        self.running = true;
        debug!("output stream resumed");
        Ok(())
    }

    fn suspend(&mut self) -> SynthResult<()> {
        if let Some(stream) = &self.stream {
            stream.pause().map_err(unavailable)?;
            debug!("output stream suspended");
        }
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// Renders mono blocks through `render` and copies each sample to every
/// channel of the interleaved `data`. A block whose render panics is output
/// as silence and the stream keeps running.
fn fill_interleaved(
    data: &mut [f32],
    channels: usize,
    mono: &mut [f32],
    mut render: impl FnMut(&mut [f32]),
) {
    let channels = channels.max(1);
    for frames in data.chunks_mut(mono.len() * channels) {
        let block = &mut mono[..frames.len() / channels];
        if panic::catch_unwind(AssertUnwindSafe(|| render(&mut *block))).is_err() {
            block.fill(0.0);
        }
        for (frame, sample) in frames.chunks_mut(channels).zip(block.iter()) {
            frame.fill(*sample);
        }
    }
}
