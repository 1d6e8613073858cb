//! Room records

use crate::participant::{ConnectionState, ParticipantRecord};
use crate::track::TrackId;
use crate::vendor::RoomSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A joined room, its remote participants and its local tracks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    /// Room SID
    pub sid: String,
    /// Room name
    pub name: Option<String>,
    /// Identity of the local participant
    pub local_identity: String,
    /// Room state
    pub state: ConnectionState,
    /// Whether the room is being recorded
    pub is_recording: bool,
    /// Remote participants keyed by SID
    pub participants: BTreeMap<String, ParticipantRecord>,
    /// Tracks published by the local participant
    pub local_tracks: BTreeSet<TrackId>,
}

impl RoomRecord {
    /// Create a record from a room snapshot without participants or tracks
    pub fn from_snapshot(snapshot: &RoomSnapshot) -> Self {
        Self {
            sid: snapshot.sid.clone(),
            name: snapshot.name.clone(),
            local_identity: snapshot.local_identity.clone(),
            state: snapshot.state,
            is_recording: snapshot.is_recording,
            participants: BTreeMap::new(),
            local_tracks: BTreeSet::new(),
        }
    }

    /// Get participant by SID
    pub fn participant(&self, sid: &str) -> Option<&ParticipantRecord> {
        self.participants.get(sid)
    }

    /// Find the participant owning a remote track
    pub fn owner_of(&self, id: &TrackId) -> Option<&ParticipantRecord> {
        self.participants.values().find(|participant| participant.owns(id))
    }

    /// Number of tracks referenced by this room
    pub fn track_count(&self) -> usize {
        self.local_tracks.len()
            + self
                .participants
                .values()
                .map(|participant| participant.tracks.len())
                .sum::<usize>()
    }
}
