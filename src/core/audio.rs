/// Lead-in before the first note, in milliseconds of song time.
pub const START_DELAY_MS: f64 = 3000.0;

/// Falls back to 1.0 for rates a transport should never report.
#[inline(always)]
pub fn effective_rate(rate: f32) -> f32 {
    if rate.is_finite() && rate > 0.0 { rate } else { 1.0 }
}

/// Read side of the audio transport: the only things gameplay consumes from it.
pub trait AudioClock {
    /// Current playback position in milliseconds of song time.
    fn time_ms(&self) -> f64;
    /// Playback rate multiplier, 1.0 for normal speed.
    fn rate(&self) -> f32;
}

/// Clock driven by hand. Used by the simulator and the tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualClock {
    time_ms: f64,
    rate: f32,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl ManualClock {
    pub const fn new(time_ms: f64) -> Self {
        Self { time_ms, rate: 1.0 }
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.set_rate(rate);
        self
    }

    #[inline(always)]
    pub fn set_time(&mut self, time_ms: f64) {
        self.time_ms = time_ms;
    }

    /// Moves the clock by `delta_ms` of wall time, scaled by the playback rate.
    #[inline(always)]
    pub fn advance(&mut self, delta_ms: f64) {
        self.time_ms += delta_ms * f64::from(self.rate);
    }

    #[inline(always)]
    pub fn set_rate(&mut self, rate: f32) {
        self.rate = effective_rate(rate);
    }
}

impl AudioClock for ManualClock {
    #[inline(always)]
    fn time_ms(&self) -> f64 {
        self.time_ms
    }

    #[inline(always)]
    fn rate(&self) -> f32 {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_scales_by_rate() {
        let mut clock = ManualClock::new(100.0).with_rate(1.5);
        clock.advance(100.0);
        assert_eq!(clock.time_ms(), 250.0);
    }

    #[test]
    fn bad_rates_fall_back_to_one() {
        assert_eq!(effective_rate(f32::NAN), 1.0);
        assert_eq!(effective_rate(-2.0), 1.0);
        assert_eq!(effective_rate(0.0), 1.0);
        assert_eq!(effective_rate(0.75), 0.75);
    }
}
