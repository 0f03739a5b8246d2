//! Bounded FIFO window of recent upstream statuses
//!
//! This module provides the StatusWindow which keeps the last `capacity`
//! statuses in arrival order so the error-rate monitor can compute the share
//! of server errors over a fixed number of requests.

use crate::events::StatusClass;
use std::collections::VecDeque;

/// Ring of the most recent upstream statuses
///
/// Once full, each insertion evicts the oldest status first, so the length
/// never exceeds `capacity`.
#[derive(Debug, Clone)]
pub struct StatusWindow {
    statuses: VecDeque<u16>,
    capacity: usize,
}

impl StatusWindow {
    /// Create an empty window
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of requests the window covers (at least 1)
    ///
    /// # Examples
    ///
    /// ```
    /// use poolwatch::aggregator::StatusWindow;
    ///
    /// let mut window = StatusWindow::new(2);
    /// window.record(200);
    /// window.record(502);
    /// window.record(503);
    /// assert_eq!(window.server_errors(), 2);
    /// assert!(window.is_full());
    /// ```
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            statuses: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a status, evicting the oldest entry when at capacity
    pub fn record(&mut self, status: u16) {
        if self.statuses.len() == self.capacity {
            self.statuses.pop_front();
        }
        self.statuses.push_back(status);
    }

    /// Number of statuses currently held
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether enough requests were seen to judge the error rate
    pub fn is_full(&self) -> bool {
        self.statuses.len() == self.capacity
    }

    /// Count of statuses in the server error class (5xx)
    pub fn server_errors(&self) -> usize {
        self.statuses
            .iter()
            .filter(|&&status| StatusClass::from_status(status) == StatusClass::ServerError)
            .count()
    }

    /// Oldest status still in the window
    pub fn oldest(&self) -> Option<u16> {
        self.statuses.front().copied()
    }

    /// Most recently recorded status
    pub fn newest(&self) -> Option<u16> {
        self.statuses.back().copied()
    }
}

impl Default for StatusWindow {
    fn default() -> Self {
        // Default: last 200 requests
        Self::new(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_count() {
        let mut window = StatusWindow::new(5);
        window.record(200);
        window.record(500);
        window.record(404);
        window.record(503);

        assert_eq!(window.len(), 4);
        assert!(!window.is_full());
        assert_eq!(window.server_errors(), 2);
    }

    #[test]
    fn test_server_errors_follow_status_class() {
        let mut window = StatusWindow::new(6);
        for status in [0, 399, 404, 499, 500, 599] {
            window.record(status);
        }
        let expected = [0u16, 399, 404, 499, 500, 599]
            .iter()
            .filter(|&&s| StatusClass::from_status(s) == StatusClass::ServerError)
            .count();
        assert_eq!(window.server_errors(), expected);
        assert_eq!(window.server_errors(), 2);
    }

    #[test]
    fn test_capacity_enforcement() {
        let mut window = StatusWindow::new(3);
        for status in [500, 200, 200, 200] {
            window.record(status);
        }

        assert_eq!(window.len(), 3);
        assert_eq!(window.server_errors(), 0);
        assert_eq!(window.oldest(), Some(200));
    }

    #[test]
    fn test_fifo_eviction_after_capacity_plus_one() {
        let mut window = StatusWindow::new(4);
        for status in [501, 201, 202, 203, 504] {
            window.record(status);
        }

        assert_eq!(window.oldest(), Some(201));
        assert_eq!(window.newest(), Some(504));
        assert_eq!(window.server_errors(), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut window = StatusWindow::new(0);
        assert_eq!(window.capacity(), 1);
        window.record(200);
        window.record(500);
        assert_eq!(window.len(), 1);
        assert_eq!(window.newest(), Some(500));
    }

    #[test]
    fn test_default_window() {
        let window = StatusWindow::default();
        assert_eq!(window.capacity(), 200);
        assert!(window.is_empty());
    }
}
