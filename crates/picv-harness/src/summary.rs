//! End-of-run summary, renderable as a text line or JSON.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::roles::RoleStats;

/// What a completed run looked like.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub producers: usize,
    pub consumers: usize,
    pub annoyers: usize,
    pub pi_helpers: bool,
    /// Role threads that were joined during teardown.
    pub threads_joined: usize,
    pub produced: u64,
    pub consumed: u64,
    /// Items still in the buffer after all roles exited.
    pub final_occupancy: usize,
    pub annoyer_bursts: u64,
    /// Longest any consumer blocked in a single `take`.
    pub max_consumer_wait_us: u128,
    pub total_consumer_wait_us: u128,
    pub elapsed_secs: f64,
}

impl RunSummary {
    pub(crate) fn new(
        producers: usize,
        consumers: usize,
        annoyers: usize,
        pi_helpers: bool,
        threads_joined: usize,
        stats: &RoleStats,
        final_occupancy: usize,
        elapsed: Duration,
    ) -> Self {
        Self {
            producers,
            consumers,
            annoyers,
            pi_helpers,
            threads_joined,
            produced: stats.produced,
            consumed: stats.consumed,
            final_occupancy,
            annoyer_bursts: stats.bursts,
            max_consumer_wait_us: stats.wait_max.as_micros(),
            total_consumer_wait_us: stats.wait_total.as_micros(),
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "joined {} threads in {:.2}s: produced {} consumed {} in-flight {}; \
             max consumer wait {}us (helpers {})",
            self.threads_joined,
            self.elapsed_secs,
            self.produced,
            self.consumed,
            self.final_occupancy,
            self.max_consumer_wait_us,
            if self.pi_helpers { "on" } else { "off" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunSummary {
        RunSummary::new(
            2,
            1,
            0,
            false,
            3,
            &RoleStats {
                produced: 10,
                consumed: 8,
                bursts: 0,
                wait_total: Duration::from_micros(900),
                wait_max: Duration::from_micros(400),
            },
            2,
            Duration::from_secs(3),
        )
    }

    #[test]
    fn display_mentions_counts() {
        let text = sample().to_string();
        assert!(text.contains("joined 3 threads"));
        assert!(text.contains("produced 10"));
        assert!(text.contains("in-flight 2"));
    }

    #[test]
    fn json_roundtrips_fields() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["produced"], 10);
        assert_eq!(value["final_occupancy"], 2);
        assert_eq!(value["max_consumer_wait_us"], 400);
    }
}
