//! Track registry
//!
//! Maps [`TrackId`] to [`TrackRecord`] and notifies a single observer after
//! every successful mutation. Notification is synchronous: by the time
//! `register`, `update` or `remove` returns, the observer has seen the change.
//!
//! Observers only ever receive shared borrows of the records, so they cannot
//! mutate the registry from inside a notification:
//!
//! ```compile_fail
//! use roomlens_core::{TrackChange, TrackId, TrackRegistry};
//! use std::sync::Arc;
//!
//! let mut registry = TrackRegistry::new();
//! registry.set_observer(Arc::new(|id: &TrackId, _change: &TrackChange<'_>| {
//!     registry.remove(id);
//! }));
//! ```

use crate::error::RoomLensError;
use crate::track::{TrackId, TrackRecord};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A mutation applied to the registry
#[derive(Debug, Clone, Copy)]
pub enum TrackChange<'a> {
    /// A record was inserted
    Registered(&'a TrackRecord),
    /// A record was rewritten
    Updated {
        /// Record before the mutation
        old: &'a TrackRecord,
        /// Record after the mutation
        new: &'a TrackRecord,
    },
    /// A record was deleted
    Removed(&'a TrackRecord),
}

impl<'a> TrackChange<'a> {
    /// The record as it is after the change, `None` for removals
    pub fn current(&self) -> Option<&'a TrackRecord> {
        match self {
            TrackChange::Registered(record) => Some(record),
            TrackChange::Updated { new, .. } => Some(new),
            TrackChange::Removed(_) => None,
        }
    }

    /// Short name of the change kind
    pub fn kind(&self) -> &'static str {
        match self {
            TrackChange::Registered(_) => "registered",
            TrackChange::Updated { .. } => "updated",
            TrackChange::Removed(_) => "removed",
        }
    }
}

/// Receives every registry mutation
pub trait TrackObserver: Send + Sync {
    /// Called synchronously after `id` changed
    fn on_track_changed(&self, id: &TrackId, change: &TrackChange<'_>);
}

impl<F> TrackObserver for F
where
    F: Fn(&TrackId, &TrackChange<'_>) + Send + Sync,
{
    fn on_track_changed(&self, id: &TrackId, change: &TrackChange<'_>) {
        self(id, change)
    }
}

/// Mapping from track identity to track record
#[derive(Default)]
pub struct TrackRegistry {
    records: BTreeMap<TrackId, TrackRecord>,
    observer: Option<Arc<dyn TrackObserver>>,
}

impl fmt::Debug for TrackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackRegistry")
            .field("records", &self.records)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl TrackRegistry {
    /// Create an empty registry without observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry notifying `observer`
    pub fn with_observer(observer: Arc<dyn TrackObserver>) -> Self {
        Self {
            records: BTreeMap::new(),
            observer: Some(observer),
        }
    }

    /// Replace the observer
    pub fn set_observer(&mut self, observer: Arc<dyn TrackObserver>) {
        self.observer = Some(observer);
    }

    /// Insert a record, failing if the id is already present
    pub fn register(&mut self, id: TrackId, record: TrackRecord) -> Result<&TrackRecord, RoomLensError> {
        if self.records.contains_key(&id) {
            return Err(RoomLensError::DuplicateTrack {
                track_id: id.to_string(),
            });
        }
        debug!("Registering {} track {}", record.class_name(), id);
        let record = self.records.entry(id.clone()).or_insert(record);
        if let Some(observer) = &self.observer {
            observer.on_track_changed(&id, &TrackChange::Registered(record));
        }
        Ok(&*record)
    }

    /// Apply an infallible mutation
    pub fn update<F>(&mut self, id: &TrackId, mutate: F) -> Result<&TrackRecord, RoomLensError>
    where
        F: FnOnce(&mut TrackRecord),
    {
        self.try_update(id, |record| {
            mutate(record);
            Ok(())
        })
    }

    /// Apply a mutation that may reject the change.
    ///
    /// The mutation runs on a copy; if it fails, or the id is absent, the
    /// registry is left untouched and the observer is not called.
    pub fn try_update<F>(&mut self, id: &TrackId, mutate: F) -> Result<&TrackRecord, RoomLensError>
    where
        F: FnOnce(&mut TrackRecord) -> Result<(), RoomLensError>,
    {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| RoomLensError::UnknownTrack {
                track_id: id.to_string(),
            })?;

        let mut next = record.clone();
        mutate(&mut next)?;
        debug_assert_eq!(next.id(), id, "mutation must not change the track id");
        let old = std::mem::replace(record, next);

        if let Some(observer) = &self.observer {
            observer.on_track_changed(id, &TrackChange::Updated { old: &old, new: record });
        }
        Ok(&*record)
    }

    /// Delete a record. Removing an absent id is not an error.
    pub fn remove(&mut self, id: &TrackId) -> Option<TrackRecord> {
        let removed = self.records.remove(id)?;
        debug!("Removed {} track {}", removed.class_name(), id);
        if let Some(observer) = &self.observer {
            observer.on_track_changed(id, &TrackChange::Removed(&removed));
        }
        Some(removed)
    }

    /// Get a record
    pub fn get(&self, id: &TrackId) -> Option<&TrackRecord> {
        self.records.get(id)
    }

    /// Check if a record exists
    pub fn contains(&self, id: &TrackId) -> bool {
        self.records.contains_key(id)
    }

    /// Resolve a stats entry to a registered track: by SID first, then by the
    /// bound media-track id.
    pub fn resolve(&self, sid: Option<&str>, media_track_id: Option<&str>) -> Option<TrackId> {
        if let Some(sid) = sid {
            let id = TrackId::new(sid);
            if self.records.contains_key(&id) {
                return Some(id);
            }
        }
        let media_track_id = media_track_id?;
        self.records
            .values()
            .find(|record| {
                record.media_track_id() == Some(media_track_id) || record.id().as_str() == media_track_id
            })
            .map(|record| record.id().clone())
    }

    /// Registered ids in order
    pub fn ids(&self) -> Vec<TrackId> {
        self.records.keys().cloned().collect()
    }

    /// Iterate the records
    pub fn iter(&self) -> impl Iterator<Item = &TrackRecord> {
        self.records.values()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
