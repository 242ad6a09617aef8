//! Reconnection policies decide how long a pool waits between consecutive
//! attempts to re-establish a lost connection.

use std::fmt;
use std::time::Duration;

/// A stateful generator of delays between reconnection attempts.
///
/// A schedule is obtained per reconnection slot and is not restartable: the
/// pool moves it from a finished attempt into the follow-up attempt so that
/// backoff keeps progressing while the slot stays unfilled.
pub trait ReconnectionSchedule: Send {
    /// The delay to wait before the next attempt.
    fn next_delay(&mut self) -> Duration;
}

/// Produces a fresh [`ReconnectionSchedule`] for every reconnection slot.
pub trait ReconnectionPolicy: fmt::Debug + Send + Sync {
    fn new_schedule(&self) -> Box<dyn ReconnectionSchedule>;

    /// Short human-readable name used in log lines.
    fn name(&self) -> &'static str;
}

/// Doubles the delay on every attempt, starting from `base_delay` and capped
/// at `max_delay`.
///
/// Deliberately jitter-free: a schedule carried across retries of the same
/// slot yields non-decreasing delays.
#[derive(Debug, Clone)]
pub struct ExponentialReconnectionPolicy {
    base_delay: Duration,
    max_delay: Duration,
}

impl ExponentialReconnectionPolicy {
    #[inline]
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        ExponentialReconnectionPolicy {
            base_delay,
            max_delay,
        }
    }
}

impl Default for ExponentialReconnectionPolicy {
    #[inline]
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(60))
    }
}

impl ReconnectionPolicy for ExponentialReconnectionPolicy {
    fn new_schedule(&self) -> Box<dyn ReconnectionSchedule> {
        Box::new(ExponentialReconnectionSchedule {
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            attempt: 0,
        })
    }

    fn name(&self) -> &'static str {
        "exponential"
    }
}

struct ExponentialReconnectionSchedule {
    base_delay: Duration,
    max_delay: Duration,
    attempt: u32,
}

impl ReconnectionSchedule for ExponentialReconnectionSchedule {
    fn next_delay(&mut self) -> Duration {
        let delay = 1u32
            .checked_shl(self.attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay));
        self.attempt = self.attempt.saturating_add(1);
        delay
    }
}

/// Waits the same fixed delay before every attempt.
#[derive(Debug, Clone)]
pub struct ConstantReconnectionPolicy {
    delay: Duration,
}

impl ConstantReconnectionPolicy {
    #[inline]
    pub fn new(delay: Duration) -> Self {
        ConstantReconnectionPolicy { delay }
    }
}

impl ReconnectionPolicy for ConstantReconnectionPolicy {
    fn new_schedule(&self) -> Box<dyn ReconnectionSchedule> {
        Box::new(ConstantReconnectionSchedule { delay: self.delay })
    }

    fn name(&self) -> &'static str {
        "constant"
    }
}

struct ConstantReconnectionSchedule {
    delay: Duration,
}

impl ReconnectionSchedule for ConstantReconnectionSchedule {
    fn next_delay(&mut self) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ConstantReconnectionPolicy, ExponentialReconnectionPolicy, ReconnectionPolicy};
    use crate::test_utils::setup_tracing;

    #[test]
    fn test_exponential_schedule_doubles_up_to_cap() {
        setup_tracing();
        let policy =
            ExponentialReconnectionPolicy::new(Duration::from_millis(100), Duration::from_secs(1));
        let mut schedule = policy.new_schedule();

        let delays: Vec<_> = (0..6).map(|_| schedule.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
                Duration::from_secs(1),
                Duration::from_secs(1),
            ]
        );
    }

    #[test]
    fn test_exponential_schedule_survives_many_attempts() {
        setup_tracing();
        let policy = ExponentialReconnectionPolicy::default();
        let mut schedule = policy.new_schedule();
        let mut previous = Duration::ZERO;
        for _ in 0..100 {
            let delay = schedule.next_delay();
            assert!(delay >= previous);
            assert!(delay <= Duration::from_secs(60));
            previous = delay;
        }
    }

    #[test]
    fn test_schedules_are_independent() {
        setup_tracing();
        let policy =
            ExponentialReconnectionPolicy::new(Duration::from_millis(50), Duration::from_secs(10));
        let mut first = policy.new_schedule();
        assert_eq!(first.next_delay(), Duration::from_millis(50));
        assert_eq!(first.next_delay(), Duration::from_millis(100));

        let mut second = policy.new_schedule();
        assert_eq!(second.next_delay(), Duration::from_millis(50));
    }

    #[test]
    fn test_constant_schedule() {
        setup_tracing();
        let policy = ConstantReconnectionPolicy::new(Duration::from_millis(250));
        let mut schedule = policy.new_schedule();
        for _ in 0..5 {
            assert_eq!(schedule.next_delay(), Duration::from_millis(250));
        }
        assert_eq!(policy.name(), "constant");
    }
}
