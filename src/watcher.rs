//! Stream driver
//!
//! Pulls lines one at a time and fully processes each before asking for the
//! next: parse, run the detectors in order, hand any events to the alert
//! manager. All detection and cooldown state is owned here, so nothing is
//! shared across threads.

use crate::alerts::{AlertManager, AlertSettings, NotificationSink, TriggerOutcome};
use crate::collectors::parse_line;
use crate::config::Config;
use crate::error::{CollectorError, ConfigError};
use crate::events::{AlertEvent, Timestamp};
use crate::monitoring::WatcherStats;
use crate::triggers::TriggerEngine;
use chrono::Utc;
use log::{debug, info};

/// An event raised while processing a line and what became of it
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredAlert {
    pub event: AlertEvent,
    pub outcome: TriggerOutcome,
}

/// Owns the detectors and the alert manager for one run
pub struct Watcher {
    engine: TriggerEngine,
    alerts: AlertManager,
    stats: WatcherStats,
}

impl Watcher {
    pub fn new(engine: TriggerEngine, alerts: AlertManager) -> Self {
        Self {
            engine,
            alerts,
            stats: WatcherStats::new(),
        }
    }

    /// Build the standard watcher for a validated configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Window size, threshold and alert settings
    /// * `sink` - Notification target, `None` when no webhook is configured
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the cooldown cannot be represented.
    pub fn from_config(
        config: &Config,
        sink: Option<Box<dyn NotificationSink>>,
    ) -> Result<Self, ConfigError> {
        let engine = TriggerEngine::with_defaults(config.window_size, config.error_rate_threshold);
        let alerts = AlertManager::new(sink, AlertSettings::try_from(config)?);
        Ok(Self::new(engine, alerts))
    }

    /// Process one raw log line now
    pub fn process_line(&mut self, line: &str) -> Vec<TriggeredAlert> {
        self.process_line_at(line, Utc::now())
    }

    /// Process one raw log line at a given time
    ///
    /// Lines that don't match the access log format are skipped silently.
    pub fn process_line_at(&mut self, line: &str, now: Timestamp) -> Vec<TriggeredAlert> {
        let record = parse_line(line);
        self.stats.record_line(record.is_some());

        let Some(record) = record else {
            return Vec::new();
        };

        debug!(
            "{} pool={} release={} status={}",
            record.status_class().indicator(),
            record.pool.as_deref().unwrap_or("-"),
            record.release.as_deref().unwrap_or("-"),
            record.status
        );

        self.engine
            .evaluate(&record)
            .into_iter()
            .map(|event| {
                self.stats.record_event(&event);
                let outcome = self.alerts.trigger_at(&event, now);
                self.stats.record_outcome(outcome);
                TriggeredAlert { event, outcome }
            })
            .collect()
    }

    /// Consume lines until the source ends or fails
    ///
    /// The source ends when it is stopped, e.g. by an interrupt.
    ///
    /// # Errors
    ///
    /// Returns the first `CollectorError` the source yields. Lines already
    /// pulled have been fully processed at that point.
    pub fn run<I>(&mut self, lines: I) -> Result<(), CollectorError>
    where
        I: IntoIterator<Item = Result<String, CollectorError>>,
    {
        for line in lines {
            let line = line?;
            self.process_line(&line);
        }
        info!("Line source closed, stopping");
        Ok(())
    }

    pub fn stats(&self) -> &WatcherStats {
        &self.stats
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    pub fn engine(&self) -> &TriggerEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::webhook::MockNotificationSink;
    use crate::events::{AlertCategory, FailoverEvent};
    use chrono::Duration;

    fn config() -> Config {
        Config {
            slack_webhook_url: "https://hooks.example.com/T000".to_string(),
            ..Config::default()
        }
    }

    fn watcher_expecting(sends: usize) -> Watcher {
        let mut sink = MockNotificationSink::new();
        sink.expect_send().times(sends).returning(|_| Ok(()));
        Watcher::from_config(&config(), Some(Box::new(sink))).unwrap()
    }

    fn line(pool: &str, status: &str) -> String {
        format!(
            "10.0.0.1 - - [18/Oct/2026:09:30:00 +0000] \"GET / HTTP/1.1\" 200 12 pool={} release=v1.2.0 upstream_status={} upstream=172.18.0.2:3000",
            pool, status
        )
    }

    #[test]
    fn test_steady_traffic_raises_nothing() {
        let mut watcher = watcher_expecting(0);
        for _ in 0..200 {
            assert!(watcher.process_line("pool=blue upstream_status=200").is_empty());
        }
        assert_eq!(watcher.stats().records_parsed, 200);
        assert_eq!(watcher.stats().failovers_detected, 0);
        assert_eq!(watcher.stats().error_rate_breaches, 0);
    }

    #[test]
    fn test_error_rate_breach_alerts_once_per_cooldown() {
        let mut watcher = watcher_expecting(1);
        let now = Utc::now();

        // 6 errors spread over 200 requests, 3% against a 2% threshold
        let mut alerts = Vec::new();
        for i in 0..200 {
            let status = if i % 33 == 0 && i > 0 { "503" } else { "200" };
            alerts.extend(watcher.process_line_at(&line("blue", status), now));
        }
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].event.category(), AlertCategory::ErrorRate);
        assert_eq!(alerts[0].outcome, TriggerOutcome::Dispatched);
        match &alerts[0].event {
            AlertEvent::ErrorRate(breach) => {
                assert_eq!(breach.errors, 6);
                assert_eq!(breach.window_len, 200);
                assert_eq!(breach.rate, 3.0);
            }
            other => panic!("Unexpected event: {:?}", other),
        }

        // Still breaching, within cooldown
        let again = watcher.process_line_at(&line("blue", "200"), now + Duration::seconds(30));
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].outcome, TriggerOutcome::Suppressed);
        assert_eq!(watcher.stats().alerts_dispatched, 1);
        assert_eq!(watcher.stats().alerts_suppressed, 1);
    }

    #[test]
    fn test_pool_change_raises_one_failover() {
        let mut watcher = watcher_expecting(1);

        assert!(watcher.process_line(&line("blue", "200")).is_empty());
        assert!(watcher.process_line(&line("blue", "200")).is_empty());
        let alerts = watcher.process_line(&line("green", "200"));

        assert_eq!(
            alerts,
            vec![TriggeredAlert {
                event: AlertEvent::Failover(FailoverEvent {
                    from: "blue".to_string(),
                    to: "green".to_string(),
                }),
                outcome: TriggerOutcome::Dispatched,
            }]
        );
        assert!(watcher.process_line(&line("green", "200")).is_empty());
    }

    #[test]
    fn test_retried_request_uses_last_status() {
        let mut watcher = Watcher::from_config(
            &Config {
                window_size: 1,
                error_rate_threshold: 0.0,
                ..config()
            },
            None,
        )
        .unwrap();

        assert!(watcher
            .process_line("pool=blue upstream_status=502 : 502 : 200")
            .is_empty());
        let alerts = watcher.process_line("pool=blue upstream_status=200 : 502");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].event.category(), AlertCategory::ErrorRate);
    }

    #[test]
    fn test_sentinel_pool_counts_toward_rate_only() {
        let mut watcher = Watcher::from_config(
            &Config {
                window_size: 1,
                error_rate_threshold: 50.0,
                ..config()
            },
            None,
        )
        .unwrap();

        let alerts = watcher.process_line("pool=- upstream_status=500");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].event.category(), AlertCategory::ErrorRate);
        assert_eq!(alerts[0].outcome, TriggerOutcome::Dropped);
        assert_eq!(watcher.stats().failovers_detected, 0);
    }

    #[test]
    fn test_replayed_line_is_idempotent_for_failover() {
        let mut watcher = watcher_expecting(0);
        let entry = line("blue", "200");
        watcher.process_line(&entry);
        watcher.process_line(&entry);
        assert_eq!(watcher.stats().failovers_detected, 0);
    }

    #[test]
    fn test_failover_and_breach_on_same_line() {
        let mut sink = MockNotificationSink::new();
        sink.expect_send().times(2).returning(|_| Ok(()));
        let mut watcher = Watcher::from_config(
            &Config {
                window_size: 2,
                error_rate_threshold: 40.0,
                ..config()
            },
            Some(Box::new(sink)),
        )
        .unwrap();

        watcher.process_line("pool=blue upstream_status=200");
        let alerts = watcher.process_line("pool=green upstream_status=500");

        let categories: Vec<AlertCategory> = alerts.iter().map(|a| a.event.category()).collect();
        assert_eq!(
            categories,
            vec![AlertCategory::Failover, AlertCategory::ErrorRate]
        );
        assert!(alerts
            .iter()
            .all(|a| a.outcome == TriggerOutcome::Dispatched));
    }

    #[test]
    fn test_unmatched_lines_are_skipped() {
        let mut watcher = watcher_expecting(0);
        assert!(watcher.process_line("").is_empty());
        assert!(watcher
            .process_line("GET /healthz 200 upstream_status=500")
            .is_empty());

        assert_eq!(watcher.stats().lines_read, 2);
        assert_eq!(watcher.stats().lines_skipped, 2);
        assert_eq!(watcher.stats().records_parsed, 0);
    }

    #[test]
    fn test_run_processes_until_source_ends() {
        let mut watcher = watcher_expecting(1);
        let lines = vec![
            Ok(line("blue", "200")),
            Ok("not an access log line".to_string()),
            Ok(line("green", "200")),
        ];

        watcher.run(lines).unwrap();
        assert_eq!(watcher.stats().lines_read, 3);
        assert_eq!(watcher.stats().failovers_detected, 1);
    }

    #[test]
    fn test_run_stops_on_source_error() {
        let mut watcher = watcher_expecting(0);
        let lines = vec![
            Ok(line("blue", "200")),
            Err(CollectorError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk gone",
            ))),
            Ok(line("green", "200")),
        ];

        let err = watcher.run(lines).unwrap_err();
        assert!(err.to_string().contains("disk gone"));
        assert_eq!(watcher.stats().lines_read, 1);
    }

    #[test]
    fn test_from_config_builds_default_rules() {
        let watcher = Watcher::from_config(&config(), None).unwrap();
        assert_eq!(
            watcher.engine().rule_names(),
            vec!["FailoverDetector", "ErrorRateMonitor"]
        );
        assert!(!watcher.alerts().is_delivery_enabled());
    }
}
