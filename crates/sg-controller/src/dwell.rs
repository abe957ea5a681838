//! Sustained below-t3 tracking for cooldown

use chrono::{DateTime, Duration, Utc};

/// Tracks how long the reading has stayed below t3
///
/// The clock starts at the first evaluation that sees a reading below t3 and
/// is cleared by any reading at or above t3, or by an unavailable reading,
/// since "continuously below" can no longer be confirmed.
#[derive(Debug, Clone, Default)]
pub struct CooldownTracker {
    below_since: Option<DateTime<Utc>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the latest known reading
    pub fn observe(&mut self, reading: Option<f64>, t3: f64, now: DateTime<Utc>) {
        match reading {
            Some(value) if value < t3 => {
                self.below_since.get_or_insert(now);
            }
            _ => self.below_since = None,
        }
    }

    /// Whether the reading has been below t3 for at least `dwell`
    pub fn is_satisfied(&self, now: DateTime<Utc>, dwell: Duration) -> bool {
        self.below_since
            .map(|since| now - since >= dwell)
            .unwrap_or(false)
    }

    pub fn below_since(&self) -> Option<DateTime<Utc>> {
        self.below_since
    }

    pub fn reset(&mut self) {
        self.below_since = None;
    }
}
