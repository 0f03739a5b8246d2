//! Run statistics for the watcher
//!
//! Counts what the stream driver saw and what happened to every triggered
//! alert, so a summary can be logged at shutdown.

use crate::alerts::TriggerOutcome;
use crate::events::{AlertEvent, Timestamp};
use chrono::Utc;
use log::{info, warn};

/// Counters accumulated over one watcher run
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherStats {
    /// Lines pulled from the source
    pub lines_read: u64,
    /// Lines that matched the access log format
    pub records_parsed: u64,
    /// Lines that did not match and were skipped
    pub lines_skipped: u64,
    pub failovers_detected: u64,
    pub error_rate_breaches: u64,
    /// Alerts delivered to the webhook
    pub alerts_dispatched: u64,
    /// Alerts suppressed by an active cooldown
    pub alerts_suppressed: u64,
    /// Alerts dropped because delivery is disabled or in maintenance mode
    pub alerts_dropped: u64,
    /// Delivery attempts that failed
    pub delivery_failures: u64,
    pub started_at: Timestamp,
}

impl Default for WatcherStats {
    fn default() -> Self {
        Self::new()
    }
}

impl WatcherStats {
    pub fn new() -> Self {
        Self {
            lines_read: 0,
            records_parsed: 0,
            lines_skipped: 0,
            failovers_detected: 0,
            error_rate_breaches: 0,
            alerts_dispatched: 0,
            alerts_suppressed: 0,
            alerts_dropped: 0,
            delivery_failures: 0,
            started_at: Utc::now(),
        }
    }

    /// Record one pulled line and whether it parsed
    pub fn record_line(&mut self, parsed: bool) {
        self.lines_read += 1;
        if parsed {
            self.records_parsed += 1;
        } else {
            self.lines_skipped += 1;
        }
    }

    /// Record a detector event
    pub fn record_event(&mut self, event: &AlertEvent) {
        match event {
            AlertEvent::Failover(_) => self.failovers_detected += 1,
            AlertEvent::ErrorRate(_) => self.error_rate_breaches += 1,
        }
    }

    /// Record what the alert manager did with an event
    pub fn record_outcome(&mut self, outcome: TriggerOutcome) {
        match outcome {
            TriggerOutcome::Dispatched => self.alerts_dispatched += 1,
            TriggerOutcome::Suppressed => self.alerts_suppressed += 1,
            TriggerOutcome::Dropped => self.alerts_dropped += 1,
            TriggerOutcome::Failed => self.delivery_failures += 1,
        }
    }

    /// Share of delivery attempts that succeeded, as a percentage
    ///
    /// Reports 100% when nothing was attempted.
    pub fn delivery_success_rate(&self) -> f64 {
        let attempts = self.alerts_dispatched + self.delivery_failures;
        if attempts == 0 {
            return 100.0;
        }
        (self.alerts_dispatched as f64 / attempts as f64) * 100.0
    }

    /// Log a one-line summary of the run
    pub fn log_summary(&self) {
        let uptime = Utc::now() - self.started_at;
        info!(
            "Run summary: uptime={}s, lines={}, parsed={}, skipped={}, failovers={}, breaches={}, alerts sent={}, suppressed={}, dropped={}, failed={}",
            uptime.num_seconds(),
            self.lines_read,
            self.records_parsed,
            self.lines_skipped,
            self.failovers_detected,
            self.error_rate_breaches,
            self.alerts_dispatched,
            self.alerts_suppressed,
            self.alerts_dropped,
            self.delivery_failures
        );

        if self.delivery_failures > 0 {
            warn!(
                "Webhook delivery success rate: {:.1}%",
                self.delivery_success_rate()
            );
        }
    }
}
