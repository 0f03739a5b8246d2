//! Core record and event types for the access log watcher
//!
//! This module defines the data structures that flow between the parser,
//! the detectors and the alert manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Pool value written by the proxy when no upstream pool applies
pub const NO_POOL_SENTINEL: &str = "-";

/// One access log entry reduced to the fields the watcher cares about
///
/// Built by the line parser and consumed immediately by the detectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Active pool that served the request, `None` for the `-` sentinel
    pub pool: Option<String>,
    /// Release label, carried for logging only
    pub release: Option<String>,
    /// Authoritative upstream status (last attempt), 0 if unparseable
    pub status: u16,
}

impl LogRecord {
    /// Classify the status for the activity indicator
    pub fn status_class(&self) -> StatusClass {
        StatusClass::from_status(self.status)
    }
}

/// Coarse outcome bucket for an upstream status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// Anything below 400, including the unparseable 0
    Success,
    /// 4xx, shown distinctly but never counted as an error
    ClientError,
    /// 5xx and above
    ServerError,
}

impl StatusClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            0..=399 => StatusClass::Success,
            400..=499 => StatusClass::ClientError,
            _ => StatusClass::ServerError,
        }
    }

    /// Short marker used in the per-line activity log
    pub fn indicator(&self) -> &'static str {
        match self {
            StatusClass::Success => "✓",
            StatusClass::ClientError => "⚠️",
            StatusClass::ServerError => "❌",
        }
    }
}

/// Alert category, each with its own cooldown timer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Failover,
    ErrorRate,
}

impl AlertCategory {
    /// Label used in notification headers
    pub fn label(&self) -> &'static str {
        match self {
            AlertCategory::Failover => "FAILOVER",
            AlertCategory::ErrorRate => "ERROR",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            AlertCategory::Failover => "🔄",
            AlertCategory::ErrorRate => "🚨",
        }
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertCategory::Failover => write!(f, "failover"),
            AlertCategory::ErrorRate => write!(f, "error-rate"),
        }
    }
}

/// The active pool changed between two observations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverEvent {
    pub from: String,
    pub to: String,
}

/// The error rate over a full window exceeded the threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRateBreach {
    /// Percentage of 5xx statuses in the window (0-100)
    pub rate: f64,
    /// Configured threshold percentage
    pub threshold: f64,
    /// Number of 5xx statuses in the window
    pub errors: usize,
    /// Number of statuses in the window
    pub window_len: usize,
}

/// Detection handed from the triggers to the alert manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertEvent {
    Failover(FailoverEvent),
    ErrorRate(ErrorRateBreach),
}

impl AlertEvent {
    pub fn category(&self) -> AlertCategory {
        match self {
            AlertEvent::Failover(_) => AlertCategory::Failover,
            AlertEvent::ErrorRate(_) => AlertCategory::ErrorRate,
        }
    }
}
