use rand::Rng;
use std::time::Duration;

/// Uniformly jittered delay between poll iterations.
///
/// Spreads concurrent pollers so they don't hit the service in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterBackoff {
    min: Duration,
    max: Duration,
}

impl JitterBackoff {
    /// Bounds are reordered if given inverted.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draw the next delay from `[min, max]`.
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rng.gen_range(min..=max))
    }

    /// Like [`next_delay`](Self::next_delay), but never past `remaining`.
    pub fn next_delay_within<R: Rng + ?Sized>(&self, rng: &mut R, remaining: Duration) -> Duration {
        self.next_delay(rng).min(remaining)
    }
}

impl Default for JitterBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(10))
    }
}
