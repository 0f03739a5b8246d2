//! Built-in detection rules for the access log watcher
//!
//! Two detectors feed the alert manager: one watches the active pool for
//! failovers, the other watches the share of 5xx responses over the last
//! N requests.

use crate::aggregator::StatusWindow;
use crate::events::{AlertEvent, ErrorRateBreach, FailoverEvent, LogRecord, NO_POOL_SENTINEL};
use crate::triggers::TriggerRule;
use log::info;

/// Tracking state of the failover detector
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FailoverState {
    /// No pool observed yet
    #[default]
    Uninitialized,
    /// Last observed pool
    Tracking(String),
}

/// Detects changes of the active pool
///
/// The first pool seen becomes the baseline without an event. Afterwards
/// every observation of a different pool reports `(old, new)` and moves the
/// baseline, whether or not the alert is later sent.
#[derive(Debug, Default)]
pub struct FailoverDetector {
    state: FailoverState,
}

impl FailoverDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe the pool of one request
    ///
    /// The `-` sentinel carries no pool information and is ignored.
    pub fn observe_pool(&mut self, pool: &str) -> Option<FailoverEvent> {
        if pool == NO_POOL_SENTINEL {
            return None;
        }

        match &self.state {
            FailoverState::Uninitialized => {
                info!("📍 Initial pool: {}", pool);
                self.state = FailoverState::Tracking(pool.to_string());
                None
            }
            FailoverState::Tracking(current) if current == pool => None,
            FailoverState::Tracking(current) => {
                let event = FailoverEvent {
                    from: current.clone(),
                    to: pool.to_string(),
                };
                info!("🔄 FAILOVER: {} → {}", event.from, event.to);
                self.state = FailoverState::Tracking(pool.to_string());
                Some(event)
            }
        }
    }

    /// Pool currently considered active, if any was seen
    pub fn current_pool(&self) -> Option<&str> {
        match &self.state {
            FailoverState::Uninitialized => None,
            FailoverState::Tracking(pool) => Some(pool.as_str()),
        }
    }

    pub fn state(&self) -> &FailoverState {
        &self.state
    }
}

impl TriggerRule for FailoverDetector {
    fn observe(&mut self, record: &LogRecord) -> Option<AlertEvent> {
        let pool = record.pool.as_deref()?;
        self.observe_pool(pool).map(AlertEvent::Failover)
    }

    fn name(&self) -> &str {
        "FailoverDetector"
    }
}

/// Reports when the share of 5xx statuses over a full window exceeds a threshold
///
/// No breach is possible until the window is full, which avoids alerting on
/// the tiny samples right after startup. 4xx statuses never count.
#[derive(Debug)]
pub struct ErrorRateMonitor {
    window: StatusWindow,
    /// Percentage (0-100); breach requires rate strictly above it
    threshold: f64,
}

impl ErrorRateMonitor {
    /// Create a monitor over the last `window_size` requests
    ///
    /// # Arguments
    ///
    /// * `window_size` - Number of requests the rate is computed over
    /// * `threshold` - Error percentage that must be exceeded to breach
    pub fn new(window_size: usize, threshold: f64) -> Self {
        Self {
            window: StatusWindow::new(window_size),
            threshold,
        }
    }

    /// Append one status to the window
    pub fn record(&mut self, status: u16) {
        self.window.record(status);
    }

    /// Current 5xx percentage, `None` until the window is full
    pub fn error_rate(&self) -> Option<f64> {
        if !self.window.is_full() {
            return None;
        }
        let errors = self.window.server_errors();
        Some((errors * 100) as f64 / self.window.len() as f64)
    }

    /// Check whether the current window breaches the threshold
    ///
    /// # Returns
    ///
    /// The breach details when the window is full and the rate is strictly
    /// greater than the threshold, `None` otherwise
    pub fn check_breach(&self) -> Option<ErrorRateBreach> {
        let rate = self.error_rate()?;
        if rate > self.threshold {
            Some(ErrorRateBreach {
                rate,
                threshold: self.threshold,
                errors: self.window.server_errors(),
                window_len: self.window.len(),
            })
        } else {
            None
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn window(&self) -> &StatusWindow {
        &self.window
    }
}

impl TriggerRule for ErrorRateMonitor {
    fn observe(&mut self, record: &LogRecord) -> Option<AlertEvent> {
        self.record(record.status);
        self.check_breach().map(AlertEvent::ErrorRate)
    }

    fn name(&self) -> &str {
        "ErrorRateMonitor"
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn prop_partial_window_never_breaches(statuses: Vec<u16>, capacity: u8) -> bool {
        let capacity = statuses.len() + 1 + capacity as usize;
        let mut monitor = ErrorRateMonitor::new(capacity, 0.0);
        statuses.iter().all(|&status| {
            monitor.record(status);
            monitor.check_breach().is_none()
        })
    }

    #[quickcheck]
    fn prop_full_window_rate_matches_definition(
        statuses: Vec<u16>,
        capacity: u8,
        threshold: u8,
    ) -> bool {
        let capacity = (capacity as usize % 40) + 1;
        let threshold = (threshold % 101) as f64;
        let mut monitor = ErrorRateMonitor::new(capacity, threshold);

        let mut ok = true;
        for (i, &status) in statuses.iter().enumerate() {
            monitor.record(status);
            if i + 1 < capacity {
                continue;
            }
            let tail = &statuses[i + 1 - capacity..=i];
            let errors = tail.iter().filter(|&&s| s >= 500).count();
            let expected = (errors * 100) as f64 / capacity as f64;

            ok &= monitor.error_rate() == Some(expected);
            ok &= monitor.check_breach().is_some() == (expected > threshold);
        }
        ok
    }

    #[quickcheck]
    fn prop_failover_events_match_pool_changes(pools: Vec<bool>) -> bool {
        let mut detector = FailoverDetector::new();
        let names: Vec<&str> = pools
            .iter()
            .map(|&blue| if blue { "blue" } else { "green" })
            .collect();

        let events: Vec<FailoverEvent> = names
            .iter()
            .filter_map(|pool| detector.observe_pool(pool))
            .collect();

        let expected: Vec<FailoverEvent> = names
            .windows(2)
            .filter(|pair| pair[0] != pair[1])
            .map(|pair| FailoverEvent {
                from: pair[0].to_string(),
                to: pair[1].to_string(),
            })
            .collect();

        events == expected
    }

    #[quickcheck]
    fn prop_replaying_same_pool_is_idempotent(pool: String, repeats: u8) -> bool {
        if pool == NO_POOL_SENTINEL {
            return true;
        }
        let mut detector = FailoverDetector::new();
        (0..=repeats).all(|_| detector.observe_pool(&pool).is_none())
    }
}
