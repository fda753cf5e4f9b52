use crate::config::TimingConfig;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Uniform random duration in `[min, max]` seconds, millisecond granularity.
pub fn random_between(min_secs: u64, max_secs: u64) -> Duration {
    let (lo, hi) = if min_secs <= max_secs {
        (min_secs, max_secs)
    } else {
        (max_secs, min_secs)
    };
    Duration::from_millis(fastrand::u64(lo.saturating_mul(1000)..=hi.saturating_mul(1000)))
}

/// Per-run spacing between two sends by the same phone number.
///
/// Each call draws a fresh window `D` in `[min, max]`. If the phone sent less
/// than `D` ago the caller sleeps out the remainder, otherwise it sleeps a
/// small jitter. The send instant is recorded before returning.
#[derive(Debug)]
pub struct PhoneThrottle {
    last_send: HashMap<String, Instant>,
    min_secs: u64,
    max_secs: u64,
    jitter_max_secs: u64,
}

impl PhoneThrottle {
    pub fn new(min_secs: u64, max_secs: u64, jitter_max_secs: u64) -> Self {
        Self {
            last_send: HashMap::new(),
            min_secs,
            max_secs,
            jitter_max_secs,
        }
    }

    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self::new(
            timing.throttle_min_secs,
            timing.throttle_max_secs,
            timing.throttle_jitter_max_secs,
        )
    }

    /// Wait until `phone` may send again, then reserve the slot.
    /// Returns how long the caller waited.
    pub async fn await_turn(&mut self, phone: &str) -> Duration {
        let window = random_between(self.min_secs, self.max_secs);
        let wait = match self.last_send.get(phone) {
            Some(last) => {
                let elapsed = last.elapsed();
                if elapsed < window {
                    window - elapsed
                } else {
                    random_between(0, self.jitter_max_secs)
                }
            }
            None => random_between(0, self.jitter_max_secs),
        };
        if !wait.is_zero() {
            debug!("throttle: {} waits {}ms", phone, wait.as_millis());
            tokio::time::sleep(wait).await;
        }
        self.last_send.insert(phone.to_string(), Instant::now());
        wait
    }

    pub fn last_send(&self, phone: &str) -> Option<Instant> {
        self.last_send.get(phone).copied()
    }
}
