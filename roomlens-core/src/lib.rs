//! # RoomLens Core
//!
//! Data model for inspecting a video room: track records and the registry
//! that owns them, participant and room records, the byte-rate statistics
//! model and the interface of the vendor SDK these are mirrored from.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod participant;
pub mod registry;
pub mod room;
pub mod stats;
pub mod track;
pub mod vendor;

// Re-export main types
pub use error::RoomLensError;
pub use participant::{ConnectionState, ParticipantRecord};
pub use registry::{TrackChange, TrackObserver, TrackRegistry};
pub use room::RoomRecord;
pub use stats::{compute_byte_rate, round_to_tenth, ByteSample, StatsReport, TrackStatSample};
pub use track::{
    LifecycleState, ReadyState, SettingValue, SwitchOffState, TrackId, TrackKind, TrackOrigin,
    TrackRecord, TrackSettings,
};
pub use vendor::{ParticipantSnapshot, RoomSnapshot, StatsSource, TrackSnapshot};
