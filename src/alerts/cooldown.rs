use crate::events::{AlertCategory, Timestamp};
use chrono::Duration;
use std::collections::HashMap;

/// Per-category cooldown for alert triggers
///
/// Remembers when each alert category last triggered and refuses another
/// trigger of the same category until more than `cooldown` has passed.
/// Categories are independent of each other.
#[derive(Debug)]
pub struct CooldownTracker {
    /// Minimum spacing between two triggers of one category
    cooldown: Duration,
    /// When each category last triggered
    last_triggered: HashMap<AlertCategory, Timestamp>,
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new(Duration::seconds(300)) // Default: 5 minutes
    }
}

impl CooldownTracker {
    /// Create a tracker with the given cooldown
    ///
    /// # Arguments
    ///
    /// * `cooldown` - Minimum time between two alerts of the same category
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_triggered: HashMap::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Check if `category` may trigger at `now`
    ///
    /// A trigger exactly `cooldown` after the previous one is still refused.
    pub fn can_trigger_at(&self, category: AlertCategory, now: Timestamp) -> bool {
        match self.last_triggered.get(&category) {
            Some(&last) => now - last > self.cooldown,
            None => true,
        }
    }

    /// Record that `category` triggered at `now`
    pub fn record_trigger_at(&mut self, category: AlertCategory, now: Timestamp) {
        self.last_triggered.insert(category, now);
    }

    /// When `category` last triggered, if ever
    pub fn last_triggered(&self, category: AlertCategory) -> Option<Timestamp> {
        self.last_triggered.get(&category).copied()
    }

    /// Time left before `category` may trigger again, `None` if it may now
    pub fn remaining_at(&self, category: AlertCategory, now: Timestamp) -> Option<Duration> {
        if self.can_trigger_at(category, now) {
            return None;
        }
        self.last_triggered
            .get(&category)
            .map(|&last| self.cooldown - (now - last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_first_trigger_allowed() {
        let tracker = CooldownTracker::new(Duration::seconds(300));
        let now = Utc::now();
        assert!(tracker.can_trigger_at(AlertCategory::Failover, now));
        assert!(tracker.can_trigger_at(AlertCategory::ErrorRate, now));
        assert_eq!(tracker.last_triggered(AlertCategory::Failover), None);
    }

    #[test]
    fn test_cooldown_blocks_within_window() {
        let mut tracker = CooldownTracker::new(Duration::seconds(300));
        let now = Utc::now();

        tracker.record_trigger_at(AlertCategory::Failover, now);
        assert!(!tracker.can_trigger_at(AlertCategory::Failover, now + Duration::seconds(10)));
        assert!(!tracker.can_trigger_at(AlertCategory::Failover, now + Duration::seconds(300)));
        assert!(tracker.can_trigger_at(AlertCategory::Failover, now + Duration::seconds(301)));
    }

    #[test]
    fn test_categories_are_independent() {
        let mut tracker = CooldownTracker::new(Duration::seconds(300));
        let now = Utc::now();

        tracker.record_trigger_at(AlertCategory::Failover, now);
        assert!(tracker.can_trigger_at(AlertCategory::ErrorRate, now));
    }

    #[test]
    fn test_remaining_time() {
        let mut tracker = CooldownTracker::new(Duration::seconds(300));
        let now = Utc::now();
        tracker.record_trigger_at(AlertCategory::ErrorRate, now);

        assert_eq!(
            tracker.remaining_at(AlertCategory::ErrorRate, now + Duration::seconds(100)),
            Some(Duration::seconds(200))
        );
        assert_eq!(
            tracker.remaining_at(AlertCategory::ErrorRate, now + Duration::seconds(400)),
            None
        );
    }

    #[test]
    fn test_clock_going_backwards_stays_suppressed() {
        let mut tracker = CooldownTracker::new(Duration::seconds(300));
        let now = Utc::now();
        tracker.record_trigger_at(AlertCategory::Failover, now);
        assert!(!tracker.can_trigger_at(AlertCategory::Failover, now - Duration::seconds(60)));
    }

    #[test]
    fn test_default_cooldown() {
        let tracker = CooldownTracker::default();
        assert_eq!(tracker.cooldown(), Duration::seconds(300));
    }
}
