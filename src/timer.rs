use std::time::Duration;

use crate::rng::SeededRng;

/// Jitter is drawn from `[-JITTER_FRACTION / 2, JITTER_FRACTION / 2)` of the current rto.
const JITTER_FRACTION: f32 = 0.5;

/// Lower bound for any retransmission delay.
const MIN_RTO: Duration = Duration::from_millis(50);

/// Doubling retransmission timeout with a bounded number of attempts.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    rto: Duration,
    jitter: f32,
    left: usize,
}

impl ExponentialBackoff {
    pub fn new(start_rto: Duration, retries: usize, rng: &mut SeededRng) -> Self {
        Self {
            rto: start_rto,
            jitter: Self::jitter(rng),
            left: retries,
        }
    }

    /// Current delay including jitter.
    pub fn rto(&self) -> Duration {
        let delta = self.rto.mul_f32(self.jitter.abs());
        if self.jitter < 0.0 {
            self.rto.saturating_sub(delta)
        } else {
            self.rto + delta
        }
        .max(MIN_RTO)
    }

    // A value between -0.25 and 0.25
    fn jitter(rng: &mut SeededRng) -> f32 {
        rng.random::<f32>() * JITTER_FRACTION - (JITTER_FRACTION / 2.0)
    }

    /// Consume one retry and double the delay.
    pub fn attempt(&mut self, rng: &mut SeededRng) {
        let Some(n) = self.left.checked_sub(1) else {
            return;
        };

        self.left = n;
        self.jitter = Self::jitter(rng);
        self.rto = self.rto.saturating_mul(2);
    }

    pub fn can_retry(&self) -> bool {
        self.left > 0
    }

    pub fn retries_left(&self) -> usize {
        self.left
    }
}
