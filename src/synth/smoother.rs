/// Exponential approach toward a target value.
///
/// Each sample the distance to the target shrinks by `exp(-1 / (tau * sample_rate))`,
/// the discrete form of a first-order lag with time constant `tau`. The value never
/// crosses the target, so a monotonic sequence of targets produces a monotonic ramp.
///
/// State is kept in f64 so the tail of a ramp keeps shrinking instead of
/// stalling a few f32 ULPs short of the target.
#[derive(Clone, Copy, Debug)]
pub struct ParamSmoother {
    current: f64,
    target: f64,
    coeff: f64, // per-sample retention factor
}

// Distance below which the value locks onto the target.
const SETTLE_EPSILON: f64 = 1e-6;

impl ParamSmoother {
    pub fn new(value: f32, sample_rate: f32, time_constant: f32) -> Self {
        Self {
            current: value as f64,
            target: value as f64,
            coeff: retention(sample_rate, time_constant),
        }
    }

    /// Moves the target; the value follows over subsequent samples.
    pub fn set_target(&mut self, target: f32) {
        if target.is_finite() {
            self.target = target as f64;
        }
    }

    /// Jumps straight to `value`. Reserved for construction and (re)instantiation.
    pub fn set_immediate(&mut self, value: f32) {
        if value.is_finite() {
            self.current = value as f64;
            self.target = value as f64;
        }
    }

    /// Advances one sample and returns the new value.
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.current != self.target {
            let next = self.target + (self.current - self.target) * self.coeff;
            self.settle(next);
        }
        self.current as f32
    }

    /// Advances `samples` samples at once, used by block-rate parameters.
    pub fn advance(&mut self, samples: usize) -> f32 {
        if self.current != self.target && samples > 0 {
            let decay = self.coeff.powi(samples.min(i32::MAX as usize) as i32);
            let next = self.target + (self.current - self.target) * decay;
            self.settle(next);
        }
        self.current as f32
    }

    pub fn value(&self) -> f32 {
        self.current as f32
    }

    pub fn target(&self) -> f32 {
        self.target as f32
    }

    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }

    /// Largest change one sample may make for the current distance to target.
    pub fn max_step(&self) -> f32 {
        ((self.target - self.current).abs() * (1.0 - self.coeff)) as f32
    }

    /// Stores `next`, locking onto the target once close enough or once an
    /// update stops moving the value at all.
    fn settle(&mut self, next: f64) {
        let close = (next - self.target).abs() <= SETTLE_EPSILON * self.target.abs().max(1.0);
        self.current = if close || next == self.current {
            self.target
        } else {
            next
        };
    }
}

fn retention(sample_rate: f32, time_constant: f32) -> f64 {
    if sample_rate <= 0.0 || time_constant <= 0.0 {
        return 0.0;
    }
    (-1.0 / (time_constant as f64 * sample_rate as f64)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    #[test]
    fn step_change_never_overshoots() {
        let mut s = ParamSmoother::new(0.0, SR, 0.02);
        s.set_target(1.0);
        let mut prev = s.value();
        for _ in 0..(SR as usize) {
            let v = s.next();
            assert!(v >= prev, "ramp must be monotonic");
            assert!(v <= 1.0, "ramp must not overshoot");
            prev = v;
        }
        assert!(s.is_settled());
    }

    #[test]
    fn per_sample_change_is_bounded_by_time_constant() {
        let mut s = ParamSmoother::new(100.0, SR, 0.02);
        s.set_target(1000.0);
        // Reading back through f32 rounds each value by at most half an ULP.
        let rounding = f32::EPSILON * 1000.0;
        for _ in 0..512 {
            let allowed = s.max_step();
            let before = s.value();
            let after = s.next();
            assert!((after - before).abs() <= allowed + rounding);
        }
    }

    #[test]
    fn unit_step_settles_within_a_second() {
        let mut s = ParamSmoother::new(0.0, SR, 0.02);
        s.set_target(1.0);
        let mut settled_at = None;
        for i in 0..(SR as usize) {
            s.next();
            if s.is_settled() {
                settled_at = Some(i);
                break;
            }
        }
        // ln(1e6) time constants, about 0.28 s.
        let settled_at = settled_at.expect("ramp stalled short of the target");
        assert!(settled_at < (0.3 * SR) as usize);
        assert_eq!(s.value(), 1.0);
    }

    #[test]
    fn tiny_moves_still_reach_the_target() {
        let mut s = ParamSmoother::new(0.5, SR, 0.02);
        s.set_target(0.5 + f32::EPSILON);
        for _ in 0..10 {
            s.next();
        }
        assert!(s.is_settled());
        assert_eq!(s.value(), 0.5 + f32::EPSILON);
    }

    #[test]
    fn block_advance_matches_sample_loop() {
        let mut a = ParamSmoother::new(0.0, SR, 0.02);
        let mut b = a;
        a.set_target(1.0);
        b.set_target(1.0);
        for _ in 0..128 {
            a.next();
        }
        b.advance(128);
        assert!((a.value() - b.value()).abs() < 1e-4);
    }

    #[test]
    fn one_time_constant_covers_most_of_the_distance() {
        let mut s = ParamSmoother::new(0.0, SR, 0.02);
        s.set_target(1.0);
        let v = s.advance((0.02 * SR) as usize);
        assert!((v - (1.0 - (-1.0f32).exp())).abs() < 1e-3);
    }

    #[test]
    fn immediate_assignment_skips_the_ramp() {
        let mut s = ParamSmoother::new(0.0, SR, 0.02);
        s.set_immediate(5.0);
        assert_eq!(s.value(), 5.0);
        assert!(s.is_settled());
    }

    #[test]
    fn non_finite_targets_are_ignored() {
        let mut s = ParamSmoother::new(2.0, SR, 0.02);
        s.set_target(f32::NAN);
        s.set_immediate(f32::INFINITY);
        assert_eq!(s.target(), 2.0);
        assert_eq!(s.next(), 2.0);
    }
}
