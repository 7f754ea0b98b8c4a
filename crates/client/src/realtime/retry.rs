//! Reconnect delays after the hub connection is lost.

use std::time::Duration;

/// Delays for the first attempts; every later attempt waits [`MAX_DELAY`].
const DELAYS: [Duration; 4] = [
    Duration::ZERO,
    Duration::from_secs(2),
    Duration::from_secs(10),
    Duration::from_secs(30),
];

/// Delay for every attempt past the fixed schedule.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// A session that stayed up this long starts the schedule over.
pub const STABLE_SESSION: Duration = Duration::from_secs(30);

/// Reconnect schedule. Retries never stop.
#[derive(Debug, Clone, Default)]
pub struct ReconnectPolicy {
    attempt: u32,
}

impl ReconnectPolicy {
    /// Delay before the next attempt, advancing the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = usize::try_from(self.attempt)
            .ok()
            .and_then(|i| DELAYS.get(i).copied())
            .unwrap_or(MAX_DELAY);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Attempts made since the last reset, starting at 1 once retrying.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Start over.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Account for a session that just ended after being up for `lived`.
    ///
    /// Only a session that lasted [`STABLE_SESSION`] resets the schedule; a
    /// server that accepts and then drops connections keeps backing off.
    pub fn session_ended(&mut self, lived: Duration) {
        if lived >= STABLE_SESSION {
            self.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule() {
        let mut policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..7).map(|_| policy.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![0, 2, 10, 30, 60, 60, 60]);
        assert_eq!(policy.attempt(), 7);
    }

    #[test]
    fn test_reset() {
        let mut policy = ReconnectPolicy::default();
        policy.next_delay();
        policy.next_delay();
        policy.reset();
        assert_eq!(policy.next_delay(), Duration::ZERO);
    }

    #[test]
    fn test_short_sessions_keep_backing_off() {
        let mut policy = ReconnectPolicy::default();
        assert_eq!(policy.next_delay(), Duration::ZERO);
        policy.session_ended(Duration::from_millis(5));
        assert_eq!(policy.next_delay(), Duration::from_secs(2));
        policy.session_ended(STABLE_SESSION - Duration::from_millis(1));
        assert_eq!(policy.next_delay(), Duration::from_secs(10));
        assert_eq!(policy.attempt(), 3);
    }

    #[test]
    fn test_stable_session_starts_over() {
        let mut policy = ReconnectPolicy::default();
        policy.next_delay();
        policy.next_delay();
        policy.session_ended(STABLE_SESSION);
        assert_eq!(policy.attempt(), 0);
        assert_eq!(policy.next_delay(), Duration::ZERO);
    }
}
