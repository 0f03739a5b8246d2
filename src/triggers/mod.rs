/// Trigger engine and detection rules
pub mod trigger_engine;
pub mod rules;

pub use rules::{ErrorRateMonitor, FailoverDetector, FailoverState};
pub use trigger_engine::{TriggerEngine, TriggerRule};
