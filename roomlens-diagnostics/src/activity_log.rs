//! Bounded activity log
//!
//! Keeps the most recent lifecycle lines in memory for display and mirrors
//! each of them to `tracing`. Clones share the same buffer.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::info;

/// Default number of entries kept
pub const DEFAULT_CAPACITY: usize = 500;

/// A single timestamped line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// When the line was logged
    pub at: DateTime<Utc>,
    /// Message text
    pub message: String,
}

#[derive(Debug)]
struct Inner {
    capacity: usize,
    entries: VecDeque<ActivityEntry>,
}

/// Shared, bounded, clearable activity list
#[derive(Debug, Clone)]
pub struct ActivityLog {
    inner: Arc<Mutex<Inner>>,
}

impl ActivityLog {
    /// Create a log keeping at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                capacity,
                entries: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            })),
        }
    }

    /// Append a line, evicting the oldest one when full
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "roomlens::activity", "{}", message);

        let mut inner = self.inner.lock();
        if inner.entries.len() == inner.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(ActivityEntry {
            at: Utc::now(),
            message,
        });
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Copy of the entries, oldest first
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.inner.lock().entries.iter().cloned().collect()
    }

    /// Messages only, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Maximum number of entries kept
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
