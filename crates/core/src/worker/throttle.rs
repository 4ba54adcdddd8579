//! Rate limiting for progress reports.

use std::time::{Duration, Instant};

/// Decides when a worker should publish a progress event.
///
/// An event is due when either the interval has elapsed since the last one
/// or the percentage advanced by at least `min_percent_delta`. The first
/// report is always due.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    min_percent_delta: f64,
    last_emit: Option<Instant>,
    last_percent: f64,
}

impl ProgressThrottle {
    pub fn new(interval: Duration, min_percent_delta: f64) -> Self {
        Self {
            interval,
            min_percent_delta,
            last_emit: None,
            last_percent: 0.0,
        }
    }

    /// Returns true (and records the emission) when an event is due.
    pub fn should_emit(&mut self, received: u64, total: Option<u64>, now: Instant) -> bool {
        let percent = match total {
            Some(total) if total > 0 => received as f64 * 100.0 / total as f64,
            _ => 0.0,
        };

        let due = match self.last_emit {
            None => true,
            Some(last) => {
                now.duration_since(last) >= self.interval
                    || (total.is_some()
                        && self.min_percent_delta > 0.0
                        && percent - self.last_percent >= self.min_percent_delta)
            }
        };

        if due {
            self.last_emit = Some(now);
            self.last_percent = percent;
        }
        due
    }
}
