use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};

/// Delays used between log stream reconnects
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

/// Capped exponential backoff that never gives up and can be reset.
pub struct StreamBackoff {
    backoff: ExponentialBackoff,
    builder: ExponentialBuilder,
    max: Duration,
}

impl StreamBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        let builder = ExponentialBuilder::default()
            .with_min_delay(config.initial)
            .with_max_delay(config.max)
            .with_factor(2.0)
            .without_max_times();

        Self {
            backoff: builder.build(),
            builder,
            max: config.max,
        }
    }

    /// Gets the delay before the next reconnect.
    pub fn next_delay(&mut self) -> Duration {
        self.backoff.next().unwrap_or(self.max)
    }

    /// Starts over from the initial delay.
    pub fn reset(&mut self) {
        self.backoff = self.builder.build();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grows_until_capped() {
        let config = BackoffConfig::default();
        let mut backoff = StreamBackoff::new(config);

        let delays: Vec<Duration> = (0..10).map(|_| backoff.next_delay()).collect();
        assert_eq!(delays[0], config.initial);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= config.max));
        assert_eq!(*delays.last().unwrap(), config.max);
    }

    #[test]
    fn test_reset_starts_over() {
        let config = BackoffConfig::default();
        let mut backoff = StreamBackoff::new(config);
        backoff.next_delay();
        backoff.next_delay();
        assert!(backoff.next_delay() > config.initial);

        backoff.reset();
        assert_eq!(backoff.next_delay(), config.initial);
    }
}
