use crate::events::{AlertEvent, LogRecord};
use crate::triggers::rules::{ErrorRateMonitor, FailoverDetector};
use log::debug;

/// Runs every detection rule over each parsed record, in registration order
pub struct TriggerEngine {
    rules: Vec<Box<dyn TriggerRule>>,
}

/// A stateful detector fed one record at a time
///
/// Each rule sees every record exactly once, in arrival order, and may
/// report at most one event per record.
pub trait TriggerRule: Send {
    /// Update the rule's state with `record` and report an event if it fired
    fn observe(&mut self, record: &LogRecord) -> Option<AlertEvent>;

    /// Get a human-readable name for this rule
    fn name(&self) -> &str;
}

impl Default for TriggerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerEngine {
    /// Create a new trigger engine with no rules
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create the standard engine: failover detection, then error rate
    ///
    /// Failover runs first so it sees the pool before the error-rate
    /// monitor consumes the status.
    pub fn with_defaults(window_size: usize, threshold_percent: f64) -> Self {
        let mut engine = Self::new();
        engine.add_rule(Box::new(FailoverDetector::new()));
        engine.add_rule(Box::new(ErrorRateMonitor::new(
            window_size,
            threshold_percent,
        )));
        engine
    }

    /// Add a trigger rule to the engine
    pub fn add_rule(&mut self, rule: Box<dyn TriggerRule>) {
        self.rules.push(rule);
    }

    /// Feed one record to all rules and collect the events they report
    pub fn evaluate(&mut self, record: &LogRecord) -> Vec<AlertEvent> {
        let mut events = Vec::new();

        for rule in self.rules.iter_mut() {
            if let Some(event) = rule.observe(record) {
                debug!("Rule '{}' fired: {:?}", rule.name(), event);
                events.push(event);
            }
        }

        events
    }

    /// Get the number of configured rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Names of the configured rules, in evaluation order
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }
}
