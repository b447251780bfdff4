// src/gateway/backoff.rs — Pacing between external calls
//
// Two delay classes: page_delay between follower-page fetches, action_delay
// after each follow/unfollow side effect. Both are uniform random draws from
// a configured range so call timing does not look mechanical to the remote
// service. Tests substitute NoDelay.

use std::time::Duration;

use crate::infra::config::BackoffConfig;

pub trait BackoffPolicy: Send + Sync {
    /// Pause before fetching the next follower page.
    fn page_delay(&self) -> Duration;
    /// Pause after a successful follow/unfollow.
    fn action_delay(&self) -> Duration;
}

/// Uniform random delay within configured second ranges.
pub struct RandomizedBackoff {
    page_secs: (u64, u64),
    action_secs: (u64, u64),
}

impl RandomizedBackoff {
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            page_secs: (config.page_min_secs, config.page_max_secs),
            action_secs: (config.action_min_secs, config.action_max_secs),
        }
    }
}

impl Default for RandomizedBackoff {
    fn default() -> Self {
        Self::new(&BackoffConfig::default())
    }
}

impl BackoffPolicy for RandomizedBackoff {
    fn page_delay(&self) -> Duration {
        Duration::from_secs(random_in_range(self.page_secs.0, self.page_secs.1))
    }

    fn action_delay(&self) -> Duration {
        Duration::from_secs(random_in_range(self.action_secs.0, self.action_secs.1))
    }
}

/// Zero-delay policy for tests.
pub struct NoDelay;

impl BackoffPolicy for NoDelay {
    fn page_delay(&self) -> Duration {
        Duration::ZERO
    }

    fn action_delay(&self) -> Duration {
        Duration::ZERO
    }
}

/// Uniform draw from [min, max]. Falls back to min if the OS entropy source
/// fails or the range is degenerate.
fn random_in_range(min: u64, max: u64) -> u64 {
    if max <= min {
        return min;
    }
    let mut buf = [0u8; 8];
    if getrandom::getrandom(&mut buf).is_err() {
        return min;
    }
    min + u64::from_le_bytes(buf) % (max - min + 1)
}
