use std::time::Duration;

/// Tunable timing parameters for a replica's [`crate::timer::Timer`].
///
/// The defaults reproduce the reference implementation's constants: an
/// election timeout randomized uniformly in `[400ms, 800ms)` and a
/// heartbeat interval of `150ms` (around 6 heartbeats per second while
/// leader).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Lower bound of the randomized election timeout.
    pub election_timeout_min: Duration,
    /// Upper (exclusive) bound of the randomized election timeout.
    pub election_timeout_max: Duration,
    /// How long a leader waits between heartbeats to an up-to-date peer.
    pub heartbeat_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            election_timeout_min: Duration::from_millis(400),
            election_timeout_max: Duration::from_millis(800),
            heartbeat_interval: Duration::from_millis(150),
        }
    }
}

impl Config {
    /// Validate that the timeout range is well formed and that the
    /// heartbeat interval is meaningfully shorter than the election
    /// timeout (otherwise a leader could never keep followers from timing
    /// out).
    pub fn validate(&self) -> Result<(), String> {
        if self.election_timeout_min >= self.election_timeout_max {
            return Err(format!(
                "election_timeout_min ({:?}) must be less than election_timeout_max ({:?})",
                self.election_timeout_min, self.election_timeout_max
            ));
        }
        if self.heartbeat_interval >= self.election_timeout_min {
            return Err(format!(
                "heartbeat_interval ({:?}) must be less than election_timeout_min ({:?})",
                self.heartbeat_interval, self.election_timeout_min
            ));
        }
        Ok(())
    }
}
