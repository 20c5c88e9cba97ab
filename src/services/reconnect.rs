use std::time::Duration;

/// How long the status channel waits before reopening an abnormally closed
/// socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Same delay before every attempt.
    Fixed {
        delay: Duration,
        max_attempts: Option<u32>,
    },
    /// Delay doubles with each consecutive failure, starting at `initial` and
    /// never exceeding `max`.
    Exponential {
        initial: Duration,
        max: Duration,
        max_attempts: Option<u32>,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Exponential {
            initial: Duration::from_millis(5000),
            max: Duration::from_secs(60),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        ReconnectPolicy::Fixed {
            delay,
            max_attempts: None,
        }
    }

    /// Delay before reconnect attempt number `attempt` (zero based), or
    /// `None` once the attempt budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match self {
            ReconnectPolicy::Fixed { delay, max_attempts } => {
                if exhausted(*max_attempts, attempt) {
                    return None;
                }
                Some(*delay)
            }
            ReconnectPolicy::Exponential {
                initial,
                max,
                max_attempts,
            } => {
                if exhausted(*max_attempts, attempt) {
                    return None;
                }
                let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
                let delay = initial.checked_mul(factor).unwrap_or(*max);
                Some(delay.min(*max))
            }
        }
    }
}

fn exhausted(max_attempts: Option<u32>, attempt: u32) -> bool {
    matches!(max_attempts, Some(limit) if attempt >= limit)
}
