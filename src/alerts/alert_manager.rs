use crate::alerts::webhook::{Notification, NotificationSink};
use crate::alerts::CooldownTracker;
use crate::config::Config;
use crate::error::ConfigError;
use crate::events::{AlertEvent, Timestamp};
use chrono::{Duration, Utc};
use log::{debug, error, info, warn};

/// Slack rejects header blocks longer than this
const MAX_HEADER_LENGTH: usize = 150;
/// Slack rejects section text longer than this
const MAX_BODY_LENGTH: usize = 3000;

/// What happened to one triggered alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Delivered to the webhook
    Dispatched,
    /// Within the cooldown of an earlier alert of the same category
    Suppressed,
    /// No webhook configured or maintenance mode; dropped locally
    Dropped,
    /// Delivery attempted and failed; not retried
    Failed,
}

/// Settings the alert manager needs from the configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSettings {
    /// Minimum time between two alerts of one category
    pub cooldown: Duration,
    /// Drop every notification locally while set
    pub maintenance_mode: bool,
    pub owner: String,
    pub environment: String,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::seconds(300),
            maintenance_mode: false,
            owner: "Unknown".to_string(),
            environment: "Production".to_string(),
        }
    }
}

impl TryFrom<&Config> for AlertSettings {
    type Error = ConfigError;

    fn try_from(config: &Config) -> Result<Self, Self::Error> {
        Ok(Self {
            cooldown: config.cooldown()?,
            maintenance_mode: config.maintenance_mode,
            owner: config.deployment_owner.clone(),
            environment: config.environment_name.clone(),
        })
    }
}

/// Deduplicates, formats and delivers alerts
///
/// Each alert category has its own cooldown. The cooldown is taken at
/// trigger time, before delivery, so a failed or dropped notification still
/// blocks repeats of the same category until the cooldown expires. Delivery
/// failures are logged and never propagated, so notification problems can't
/// stop log processing.
pub struct AlertManager {
    /// Per-category cooldown timers
    cooldowns: CooldownTracker,
    /// Webhook sink, `None` when no endpoint is configured
    sink: Option<Box<dyn NotificationSink>>,
    settings: AlertSettings,
}

impl AlertManager {
    /// Create an alert manager
    ///
    /// # Arguments
    ///
    /// * `sink` - Delivery target, `None` to drop alerts locally
    /// * `settings` - Cooldown, maintenance flag and labels
    pub fn new(sink: Option<Box<dyn NotificationSink>>, settings: AlertSettings) -> Self {
        Self {
            cooldowns: CooldownTracker::new(settings.cooldown),
            sink,
            settings,
        }
    }

    /// Whether notifications can reach the sink at all
    pub fn is_delivery_enabled(&self) -> bool {
        self.sink.is_some() && !self.settings.maintenance_mode
    }

    pub fn settings(&self) -> &AlertSettings {
        &self.settings
    }

    /// Trigger an alert for `event` now
    pub fn trigger(&mut self, event: &AlertEvent) -> TriggerOutcome {
        self.trigger_at(event, Utc::now())
    }

    /// Trigger an alert for `event` at a given time
    ///
    /// Used directly by tests with controlled timestamps.
    pub fn trigger_at(&mut self, event: &AlertEvent, now: Timestamp) -> TriggerOutcome {
        let category = event.category();

        if !self.cooldowns.can_trigger_at(category, now) {
            debug!(
                "Suppressed {} alert, cooldown has {:?} left",
                category,
                self.cooldowns
                    .remaining_at(category, now)
                    .map(|left| left.num_seconds())
            );
            return TriggerOutcome::Suppressed;
        }
        self.cooldowns.record_trigger_at(category, now);

        let sink = match &self.sink {
            Some(sink) if !self.settings.maintenance_mode => sink,
            _ => {
                warn!(
                    "⚠️  Alert suppressed (no webhook or maintenance mode): {}",
                    category
                );
                return TriggerOutcome::Dropped;
            }
        };

        let notification = self.format_notification(event, now);
        match sink.send(&notification) {
            Ok(()) => {
                info!("✓ Alert sent: {}", category);
                TriggerOutcome::Dispatched
            }
            Err(e) => {
                error!("✗ Alert delivery failed ({}): {}", category, e);
                TriggerOutcome::Failed
            }
        }
    }

    /// Build the notification for `event`
    pub fn format_notification(&self, event: &AlertEvent, now: Timestamp) -> Notification {
        let category = event.category();
        let header = format!(
            "{} [{}] {} Alert",
            category.emoji(),
            self.settings.owner,
            category.label()
        );

        Notification {
            category,
            header: Self::truncate_text(&header, MAX_HEADER_LENGTH),
            body: Self::truncate_text(&Self::format_notification_body(event), MAX_BODY_LENGTH),
            owner: self.settings.owner.clone(),
            environment: self.settings.environment.clone(),
            timestamp: now,
        }
    }

    /// Format the markdown body for an event
    fn format_notification_body(event: &AlertEvent) -> String {
        match event {
            AlertEvent::Failover(failover) => format!(
                "*Failover Detected!*\n\n\
                 • From: `{from}`\n\
                 • To: `{to}`\n\n\
                 *Action Required:* Check health of `{from}` container",
                from = failover.from,
                to = failover.to
            ),
            AlertEvent::ErrorRate(breach) => format!(
                "*High Error Rate Detected!*\n\n\
                 • Error Rate: {:.1}%\n\
                 • Threshold: {:.1}%\n\
                 • Window: Last {} requests\n\
                 • 5xx Errors: {}/{}\n\n\
                 *Action Required:* Check upstream health and logs",
                breach.rate,
                breach.threshold,
                breach.window_len,
                breach.errors,
                breach.window_len
            ),
        }
    }

    /// Truncate text to a maximum byte length on a UTF-8 boundary
    fn truncate_text(text: &str, max_length: usize) -> String {
        if text.len() <= max_length {
            return text.to_string();
        }

        let mut truncate_at = max_length.saturating_sub(3);
        while truncate_at > 0 && !text.is_char_boundary(truncate_at) {
            truncate_at -= 1;
        }
        format!("{}...", &text[..truncate_at])
    }
}
