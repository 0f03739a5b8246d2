/// Error types for the access log watcher
pub mod error;

/// Shared event and record types
pub mod events;

/// Log following and line parsing
pub mod collectors;

/// Sliding window over recent statuses
pub mod aggregator;

/// Failover and error-rate detection rules
pub mod triggers;

/// Alert manager, cooldowns and webhook delivery
pub mod alerts;

/// Configuration management
pub mod config;

/// Run statistics
pub mod monitoring;

/// Stream driver tying the pieces together
pub mod watcher;

// Re-export commonly used types
pub use config::Config;
pub use error::{AlertError, CollectorError, ConfigError};
pub use watcher::Watcher;
