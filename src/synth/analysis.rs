//! Pull-based analysis tap for visualizers and level meters.
//!
//! The audio thread overwrites a fixed history of post-filter samples in
//! place; the consumer copies the newest `fft_size` of them whenever it polls
//! (typically once per display frame). A slow poller therefore always sees
//! the latest audio, never a backlog.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

// Floor for level conversion so silence maps to a finite dB value.
const LEVEL_FLOOR: f32 = 1e-10;

#[derive(Debug)]
struct TapBuffer {
    samples: Box<[AtomicU32]>,
    /// Total samples ever written; the newest sits at `written - 1`.
    written: AtomicU64,
}

impl TapBuffer {
    #[inline]
    fn slot(&self, position: u64) -> &AtomicU32 {
        &self.samples[(position % self.samples.len() as u64) as usize]
    }
}

/// Creates a connected tap and reader holding `capacity` samples.
///
/// Size it to at least the analysis window plus the largest block written at
/// once, so a reader never copies a slot the writer is replacing.
pub fn analysis_tap(capacity: usize) -> (AnalysisTap, TapReader) {
    let buffer = Arc::new(TapBuffer {
        samples: (0..capacity.max(1)).map(|_| AtomicU32::new(0)).collect(),
        written: AtomicU64::new(0),
    });
    (
        AnalysisTap {
            buffer: Arc::clone(&buffer),
        },
        TapReader { buffer, read: 0 },
    )
}

/// Audio-thread end of the tap.
pub struct AnalysisTap {
    buffer: Arc<TapBuffer>,
}

impl AnalysisTap {
    /// Overwrites the oldest samples; never blocks or allocates.
    #[inline]
    pub fn write(&mut self, samples: &[f32]) {
        let start = self.buffer.written.load(Ordering::Relaxed);
        for (offset, &sample) in samples.iter().enumerate() {
            self.buffer
                .slot(start + offset as u64)
                .store(sample.to_bits(), Ordering::Relaxed);
        }
        self.buffer
            .written
            .store(start + samples.len() as u64, Ordering::Release);
    }
}

/// Consumer end of the tap.
pub struct TapReader {
    buffer: Arc<TapBuffer>,
    read: u64,
}

impl TapReader {
    /// Feeds up to `limit` of the newest unread samples to `sink`, oldest
    /// first, and returns how many were written since the last read.
    fn read_newest(&mut self, limit: usize, mut sink: impl FnMut(f32)) -> usize {
        let written = self.buffer.written.load(Ordering::Acquire);
        let fresh = written - self.read;
        self.read = written;
        let keep = fresh
            .min(limit as u64)
            .min(self.buffer.samples.len() as u64);
        for position in written - keep..written {
            sink(f32::from_bits(
                self.buffer.slot(position).load(Ordering::Relaxed),
            ));
        }
        fresh as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Levels {
    pub peak_db: f32,
    pub rms_db: f32,
}

/// Consumer end: windowed FFT magnitudes and time-domain levels.
pub struct Analyser {
    reader: TapReader,
    sample_rate: f32,
    smoothing: f32,
    history: Vec<f32>,
    write_pos: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    spectrum: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl Analyser {
    pub fn new(reader: TapReader, sample_rate: f32, fft_size: usize, smoothing: f32) -> Self {
        let fft_size = fft_size.max(32);
        let mut planner = FftPlanner::new();
        Self {
            reader,
            sample_rate,
            smoothing: smoothing.clamp(0.0, 1.0),
            history: vec![0.0; fft_size],
            write_pos: 0,
            window: blackman(fft_size),
            fft: planner.plan_fft_forward(fft_size),
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; fft_size / 2],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.history.len()
    }

    pub fn bin_count(&self) -> usize {
        self.smoothed.len()
    }

    /// Center frequency of bin `index`.
    pub fn bin_frequency(&self, index: usize) -> f32 {
        index as f32 * self.sample_rate / self.fft_size() as f32
    }

    /// Catches up with the audio thread and returns how many samples it
    /// produced since the last poll. Only the newest `fft_size` are kept.
    pub fn poll(&mut self) -> usize {
        let size = self.history.len();
        let history = &mut self.history;
        let write_pos = &mut self.write_pos;
        self.reader.read_newest(size, |sample| {
            history[*write_pos] = sample;
            *write_pos = (*write_pos + 1) % size;
        })
    }

    /// Oldest-first copy of the last `fft_size` samples.
    pub fn time_domain_data(&self) -> Vec<f32> {
        let (newer, older) = self.history.split_at(self.write_pos);
        older.iter().chain(newer.iter()).copied().collect()
    }

    /// Smoothed magnitude spectrum in dB, `bin_count` evenly spaced bins.
    pub fn frequency_data_db(&mut self) -> Vec<f32> {
        let n = self.fft_size();
        let (newer, older) = self.history.split_at(self.write_pos);
        for ((slot, sample), w) in self
            .spectrum
            .iter_mut()
            .zip(older.iter().chain(newer.iter()))
            .zip(self.window.iter())
        {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.spectrum);

        let smoothing = self.smoothing;
        for (bin, value) in self.smoothed.iter_mut().zip(self.spectrum.iter()) {
            let magnitude = value.norm() / n as f32;
            *bin = smoothing * *bin + (1.0 - smoothing) * magnitude;
        }
        self.smoothed.iter().map(|m| to_db(*m)).collect()
    }

    pub fn levels(&self) -> Levels {
        let n = self.history.len() as f32;
        let peak = self.history.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        let rms = (self.history.iter().map(|s| s * s).sum::<f32>() / n).sqrt();
        Levels {
            peak_db: to_db(peak),
            rms_db: to_db(rms),
        }
    }
}

fn to_db(value: f32) -> f32 {
    20.0 * (value + LEVEL_FLOOR).log10()
}

fn blackman(size: usize) -> Vec<f32> {
    let alpha = 0.16f32;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5;
    let a2 = 0.5 * alpha;
    (0..size)
        .map(|i| {
            let x = i as f32 / size as f32;
            a0 - a1 * (std::f32::consts::TAU * x).cos() + a2 * (2.0 * std::f32::consts::TAU * x).cos()
        })
        .collect()
}
