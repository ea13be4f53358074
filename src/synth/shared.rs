use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use super::engine::ChainParams;

// Bandwidths are validated positive, so zero encodes "not set".
const UNSET_BANDWIDTH: f32 = 0.0;

#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Lock-free latest values of the continuous controls.
///
/// The control thread overwrites them; the audio thread reads a snapshot at
/// each block boundary. Unlike a queue this can never fill up: any number of
/// writes between two blocks collapse into the last one.
#[derive(Debug)]
pub struct SharedParams {
    f0: AtomicF32,
    formants: [AtomicF32; 3],
    bandwidths: [AtomicF32; 2],
    gains: [AtomicF32; 2],
    jitter: AtomicF32,
    volume: AtomicF32,
    /// Bumped after every publish so readers can skip unchanged blocks.
    version: AtomicU64,
}

impl SharedParams {
    pub fn new(params: &ChainParams) -> Self {
        let [f1, f2, f3] = params.formants;
        Self {
            f0: AtomicF32::new(params.f0),
            formants: [AtomicF32::new(f1), AtomicF32::new(f2), AtomicF32::new(f3)],
            bandwidths: [
                AtomicF32::new(params.f1_bandwidth.unwrap_or(UNSET_BANDWIDTH)),
                AtomicF32::new(params.f2_bandwidth.unwrap_or(UNSET_BANDWIDTH)),
            ],
            gains: [AtomicF32::new(params.f1_gain), AtomicF32::new(params.f2_gain)],
            jitter: AtomicF32::new(params.jitter),
            volume: AtomicF32::new(params.volume),
            version: AtomicU64::new(0),
        }
    }

    /// Overwrites every value. Single writer: only the control handle calls this.
    pub fn publish(&self, params: &ChainParams) {
        self.f0.store(params.f0);
        for (slot, hz) in self.formants.iter().zip(params.formants) {
            slot.store(hz);
        }
        self.bandwidths[0].store(params.f1_bandwidth.unwrap_or(UNSET_BANDWIDTH));
        self.bandwidths[1].store(params.f2_bandwidth.unwrap_or(UNSET_BANDWIDTH));
        self.gains[0].store(params.f1_gain);
        self.gains[1].store(params.f2_gain);
        self.jitter.store(params.jitter);
        self.volume.store(params.volume);
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Number of publishes so far.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Reads the current values. A snapshot taken while a publish is in
    /// flight may mix old and new fields; the version bump that follows makes
    /// the next block read again.
    pub fn snapshot(&self) -> ChainParams {
        let bandwidth = |slot: &AtomicF32| {
            let hz = slot.load();
            (hz > UNSET_BANDWIDTH).then_some(hz)
        };
        ChainParams {
            f0: self.f0.load(),
            formants: [
                self.formants[0].load(),
                self.formants[1].load(),
                self.formants[2].load(),
            ],
            f1_bandwidth: bandwidth(&self.bandwidths[0]),
            f2_bandwidth: bandwidth(&self.bandwidths[1]),
            f1_gain: self.gains[0].load(),
            f2_gain: self.gains[1].load(),
            jitter: self.jitter.load(),
            volume: self.volume.load(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn snapshot_returns_the_last_publish() {
        let shared = SharedParams::new(&ChainParams::default());
        assert_eq!(shared.snapshot(), ChainParams::default());
        assert_eq!(shared.version(), 0);

        let mut params = ChainParams::default();
        for i in 0..1000 {
            params.volume = i as f32 / 1000.0;
            shared.publish(&params);
        }
        params.f1_bandwidth = Some(80.0);
        params.formants = [300.0, 870.0, 2240.0];
        shared.publish(&params);

        assert_eq!(shared.snapshot(), params);
        assert_eq!(shared.version(), 1001);
    }

    #[test]
    fn unset_bandwidth_stays_unset() {
        let params = ChainParams {
            f2_bandwidth: Some(120.0),
            ..ChainParams::default()
        };
        let shared = SharedParams::new(&params);
        let snapshot = shared.snapshot();
        assert_eq!(snapshot.f1_bandwidth, None);
        assert_eq!(snapshot.f2_bandwidth, Some(120.0));
    }

    #[test]
    fn reader_sees_final_value_after_concurrent_writes() {
        let shared = Arc::new(SharedParams::new(&ChainParams::default()));
        let writer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                let mut params = ChainParams::default();
                for i in 0..=10_000 {
                    params.f0 = 100.0 + i as f32 * 0.01;
                    shared.publish(&params);
                }
            })
        };
        let mut last_version = 0;
        while !writer.is_finished() {
            let version = shared.version();
            assert!(version >= last_version);
            last_version = version;
            let f0 = shared.snapshot().f0;
            assert!((100.0..=200.0).contains(&f0));
        }
        writer.join().unwrap();
        assert_eq!(shared.snapshot().f0, 100.0 + 10_000.0 * 0.01);
    }
}
