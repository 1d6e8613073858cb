//! Interface of the vendor video SDK
//!
//! The SDK itself is an external collaborator. Its objects reach RoomLens as
//! plain snapshots taken when a room is joined or a track is subscribed, and
//! its asynchronous statistics call is abstracted by [`StatsSource`].

use crate::error::RoomLensError;
use crate::participant::ConnectionState;
use crate::stats::StatsReport;
use crate::track::{ReadyState, TrackKind, TrackSettings};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Vendor view of a single track at the time it was handed over
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSnapshot {
    /// Track SID for remote tracks, local track id for local tracks
    pub sid: String,
    /// Track name
    #[serde(default)]
    pub name: Option<String>,
    /// Track kind
    pub kind: TrackKind,
    /// Currently bound media-track id
    #[serde(default)]
    pub media_track_id: Option<String>,
    /// Whether media has started
    #[serde(default)]
    pub is_started: bool,
    /// Whether the track is enabled
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    /// Whether the media track is muted
    #[serde(default)]
    pub muted: bool,
    /// Ready state of the media track
    #[serde(default = "default_ready_state")]
    pub ready_state: ReadyState,
    /// Whether the track is switched off (remote only)
    #[serde(default)]
    pub is_switched_off: bool,
    /// Switch-off reason (remote only)
    #[serde(default)]
    pub switch_off_reason: Option<String>,
    /// Media settings snapshot
    #[serde(default)]
    pub settings: TrackSettings,
}

fn default_true() -> bool {
    true
}

fn default_ready_state() -> ReadyState {
    ReadyState::Unknown
}

impl TrackSnapshot {
    /// Minimal snapshot of a track that has not started yet
    pub fn new(sid: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            sid: sid.into(),
            name: None,
            kind,
            media_track_id: None,
            is_started: false,
            is_enabled: true,
            muted: false,
            ready_state: ReadyState::Unknown,
            is_switched_off: false,
            switch_off_reason: None,
            settings: TrackSettings::new(),
        }
    }

    /// Set the track name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark the snapshot as started with a bound media track
    pub fn started(mut self, media_track_id: impl Into<String>) -> Self {
        self.is_started = true;
        self.media_track_id = Some(media_track_id.into());
        self.ready_state = ReadyState::Live;
        self
    }

    /// Check the snapshot carries a usable identity
    pub fn validate(&self, event_type: &str) -> Result<(), RoomLensError> {
        if self.sid.trim().is_empty() {
            return Err(RoomLensError::payload(event_type, "track snapshot without sid"));
        }
        Ok(())
    }
}

/// Vendor view of a remote participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSnapshot {
    /// Participant identity
    pub identity: String,
    /// Participant SID
    pub sid: String,
    /// Connection state
    #[serde(default = "default_connection_state")]
    pub state: ConnectionState,
    /// Currently subscribed tracks
    #[serde(default)]
    pub tracks: Vec<TrackSnapshot>,
}

fn default_connection_state() -> ConnectionState {
    ConnectionState::Connected
}

impl ParticipantSnapshot {
    /// Connected participant without subscribed tracks
    pub fn new(identity: impl Into<String>, sid: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            sid: sid.into(),
            state: ConnectionState::Connected,
            tracks: Vec::new(),
        }
    }

    /// Add a subscribed track
    pub fn with_track(mut self, track: TrackSnapshot) -> Self {
        self.tracks.push(track);
        self
    }

    /// Check the snapshot carries a usable identity
    pub fn validate(&self, event_type: &str) -> Result<(), RoomLensError> {
        if self.sid.trim().is_empty() {
            return Err(RoomLensError::payload(event_type, "participant snapshot without sid"));
        }
        self.tracks
            .iter()
            .try_for_each(|track| track.validate(event_type))
    }
}

/// Vendor view of a joined room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// Room SID
    pub sid: String,
    /// Room name
    #[serde(default)]
    pub name: Option<String>,
    /// Identity of the local participant
    pub local_identity: String,
    /// Room state
    #[serde(default = "default_connection_state")]
    pub state: ConnectionState,
    /// Whether the room is being recorded
    #[serde(default)]
    pub is_recording: bool,
    /// Tracks published by the local participant
    #[serde(default)]
    pub local_tracks: Vec<TrackSnapshot>,
    /// Remote participants already in the room
    #[serde(default)]
    pub participants: Vec<ParticipantSnapshot>,
}

impl RoomSnapshot {
    /// Connected room without tracks or remote participants
    pub fn new(sid: impl Into<String>, local_identity: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            name: None,
            local_identity: local_identity.into(),
            state: ConnectionState::Connected,
            is_recording: false,
            local_tracks: Vec::new(),
            participants: Vec::new(),
        }
    }

    /// Add a published local track
    pub fn with_local_track(mut self, track: TrackSnapshot) -> Self {
        self.local_tracks.push(track);
        self
    }

    /// Add a remote participant
    pub fn with_participant(mut self, participant: ParticipantSnapshot) -> Self {
        self.participants.push(participant);
        self
    }
}

/// Asynchronous aggregate-statistics fetch of a vendor room
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Fetch one report per peer connection
    async fn get_stats(&self) -> Result<Vec<StatsReport>, RoomLensError>;
}
