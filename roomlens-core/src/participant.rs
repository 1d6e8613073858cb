//! Remote participant records

use crate::track::TrackId;
use crate::vendor::ParticipantSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Connection state shared by participants and rooms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Connected
    Connected,
    /// Reconnecting
    Reconnecting,
    /// Disconnected
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Remote participant and the ids of its subscribed tracks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    /// Participant identity
    pub identity: String,
    /// Participant SID
    pub sid: String,
    /// Connection state
    pub connection_state: ConnectionState,
    /// Remote tracks owned by this participant
    pub tracks: BTreeSet<TrackId>,
}

impl ParticipantRecord {
    /// Create a connected participant without tracks
    pub fn new(identity: impl Into<String>, sid: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            sid: sid.into(),
            connection_state: ConnectionState::Connected,
            tracks: BTreeSet::new(),
        }
    }

    /// Create a record from a participant snapshot; tracks are added by the
    /// caller once they are registered
    pub fn from_snapshot(snapshot: &ParticipantSnapshot) -> Self {
        Self {
            identity: snapshot.identity.clone(),
            sid: snapshot.sid.clone(),
            connection_state: snapshot.state,
            tracks: BTreeSet::new(),
        }
    }

    /// Check if the participant owns a track
    pub fn owns(&self, id: &TrackId) -> bool {
        self.tracks.contains(id)
    }
}
