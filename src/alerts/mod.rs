/// Alert manager, cooldowns and webhook delivery
pub mod alert_manager;
pub mod cooldown;
pub mod webhook;

pub use alert_manager::{AlertManager, AlertSettings, TriggerOutcome};
pub use cooldown::CooldownTracker;
pub use webhook::{Notification, NotificationSink, SlackWebhook};
