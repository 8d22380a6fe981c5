//! Election/heartbeat timing, driven entirely by [`crate::replica::Replica::tick`].
//!
//! There is no wall-clock dependency here: the host accumulates elapsed
//! time into the timer via `add_elapsed`, and the timer only ever compares
//! durations against one another.

use std::time::Duration;

use rand::RngCore;

use crate::config::Config;

/// Accumulates elapsed time since the last heartbeat/election-relevant
/// event and answers whether it is time to act.
#[derive(Debug, Clone)]
pub struct Timer {
    config: Config,
    elapsed: Duration,
    election_timeout: Duration,
}

impl Timer {
    pub fn new(config: Config) -> Self {
        let election_timeout = Self::sample(&config);
        Timer {
            config,
            elapsed: Duration::from_millis(0),
            election_timeout,
        }
    }

    /// Accumulate `d` more elapsed time since the last reset.
    pub fn add_elapsed(&mut self, d: Duration) {
        self.elapsed += d;
    }

    /// Zero out the elapsed accumulator, e.g. after hearing from a leader
    /// or sending a fresh round of heartbeats.
    pub fn reset_elapsed(&mut self) {
        self.elapsed = Duration::from_millis(0);
    }

    /// Draw a fresh election timeout uniformly from
    /// `[election_timeout_min, election_timeout_max)`.
    pub fn randomize_election_timeout(&mut self) {
        self.election_timeout = Self::sample(&self.config);
    }

    /// Leaders: true once `heartbeat_interval` has elapsed since the last
    /// reset.
    pub fn is_time_to_ping(&self) -> bool {
        self.elapsed >= self.config.heartbeat_interval
    }

    /// Non-leaders: true once the current randomized election timeout has
    /// elapsed.
    pub fn is_time_to_elect(&self) -> bool {
        self.elapsed >= self.election_timeout
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn election_timeout(&self) -> Duration {
        self.election_timeout
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.config.heartbeat_interval
    }

    fn sample(config: &Config) -> Duration {
        let min = config.election_timeout_min.as_millis() as u64;
        let max = config.election_timeout_max.as_millis() as u64;
        let span = max - min;
        let mut rng = rand::thread_rng();
        let millis = min + ((rng.next_u32() as u64) * span) / (u32::MAX as u64);
        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn election_timeout_stays_within_bounds() {
        let config = Config::default();
        for _ in 0..200 {
            let mut t = Timer::new(config);
            assert!(t.election_timeout() >= config.election_timeout_min);
            assert!(t.election_timeout() < config.election_timeout_max);
            t.randomize_election_timeout();
            assert!(t.election_timeout() >= config.election_timeout_min);
            assert!(t.election_timeout() < config.election_timeout_max);
        }
    }

    #[test]
    fn ping_and_elect_thresholds() {
        let config = Config::default();
        let mut t = Timer::new(config);
        assert!(!t.is_time_to_ping());
        t.add_elapsed(config.heartbeat_interval);
        assert!(t.is_time_to_ping());

        t.reset_elapsed();
        assert!(!t.is_time_to_elect());
        t.add_elapsed(config.election_timeout_max);
        assert!(t.is_time_to_elect());
    }

    #[test]
    fn reset_elapsed_zeroes_accumulator() {
        let mut t = Timer::new(Config::default());
        t.add_elapsed(Duration::from_millis(300));
        t.reset_elapsed();
        assert_eq!(t.elapsed(), Duration::from_millis(0));
    }
}
