//! # RoomLens Diagnostics
//!
//! Debugging and display tools for RoomLens.
//! Provides logging initialisation, the activity log and labeled-stat
//! rendering of track, participant and room records.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod activity_log;
pub mod debug_logger;
pub mod track_details;

// Re-export main types
pub use activity_log::{ActivityEntry, ActivityLog};
pub use debug_logger::DebugLogger;
pub use track_details::{
    participant_state_stat, rate_label, room_stats, Highlight, LabeledStat, TrackDetailsView,
    DEFAULT_EXCLUDED_SETTINGS,
};
