//! Vendor lifecycle events
//!
//! Every event the vendor SDK emits for a joined room is modelled by one of
//! three tagged enums, one per entity class, wrapped in [`VendorEvent`]. The
//! JSON form is flat: `entity` selects the class and `type` the event.
//!
//! ```json
//! {"entity": "track", "type": "switchedOff", "trackSid": "MT1", "reason": "network-congestion"}
//! ```

use roomlens_core::{ParticipantSnapshot, RoomLensError, TrackId, TrackSettings, TrackSnapshot};
use serde::{Deserialize, Serialize};

/// Events emitted by a single track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TrackEvent {
    /// Media started flowing; the media track may have been rebound
    Started {
        /// Track SID or local track id
        track_sid: TrackId,
        /// Newly bound media-track id
        #[serde(default)]
        media_track_id: Option<String>,
        /// Settings of the media track
        #[serde(default)]
        settings: TrackSettings,
    },
    /// Track was stopped
    Stopped {
        /// Track SID or local track id
        track_sid: TrackId,
    },
    /// Track was enabled
    Enabled {
        /// Track SID or local track id
        track_sid: TrackId,
    },
    /// Track was disabled
    Disabled {
        /// Track SID or local track id
        track_sid: TrackId,
    },
    /// Media track was muted
    Muted {
        /// Track SID or local track id
        track_sid: TrackId,
    },
    /// Media track was unmuted
    Unmuted {
        /// Track SID or local track id
        track_sid: TrackId,
    },
    /// Video dimensions changed
    DimensionsChanged {
        /// Track SID or local track id
        track_sid: TrackId,
        /// Settings after the change
        #[serde(default)]
        settings: TrackSettings,
    },
    /// Remote track media was paused by the network layer
    SwitchedOff {
        /// Track SID
        track_sid: TrackId,
        /// Reason reported by the vendor
        #[serde(default)]
        reason: Option<String>,
    },
    /// Remote track media resumed
    SwitchedOn {
        /// Track SID
        track_sid: TrackId,
    },
}

impl TrackEvent {
    /// Vendor name of the event
    pub fn event_type(&self) -> &'static str {
        match self {
            TrackEvent::Started { .. } => "started",
            TrackEvent::Stopped { .. } => "stopped",
            TrackEvent::Enabled { .. } => "enabled",
            TrackEvent::Disabled { .. } => "disabled",
            TrackEvent::Muted { .. } => "muted",
            TrackEvent::Unmuted { .. } => "unmuted",
            TrackEvent::DimensionsChanged { .. } => "dimensionsChanged",
            TrackEvent::SwitchedOff { .. } => "switchedOff",
            TrackEvent::SwitchedOn { .. } => "switchedOn",
        }
    }

    /// Track the event refers to
    pub fn track_sid(&self) -> &TrackId {
        match self {
            TrackEvent::Started { track_sid, .. }
            | TrackEvent::Stopped { track_sid }
            | TrackEvent::Enabled { track_sid }
            | TrackEvent::Disabled { track_sid }
            | TrackEvent::Muted { track_sid }
            | TrackEvent::Unmuted { track_sid }
            | TrackEvent::DimensionsChanged { track_sid, .. }
            | TrackEvent::SwitchedOff { track_sid, .. }
            | TrackEvent::SwitchedOn { track_sid } => track_sid,
        }
    }
}

/// Events emitted by a remote participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ParticipantEvent {
    /// A published track was subscribed
    TrackSubscribed {
        /// Owning participant
        participant_sid: String,
        /// The subscribed track
        track: TrackSnapshot,
    },
    /// A track was unsubscribed
    TrackUnsubscribed {
        /// Owning participant
        participant_sid: String,
        /// Track SID
        track_sid: TrackId,
    },
    /// A track was unpublished
    TrackUnpublished {
        /// Owning participant
        participant_sid: String,
        /// Track SID
        track_sid: TrackId,
    },
    /// Participant signaling connection is recovering
    Reconnecting {
        /// Participant SID
        participant_sid: String,
    },
    /// Participant signaling connection recovered
    Reconnected {
        /// Participant SID
        participant_sid: String,
    },
}

impl ParticipantEvent {
    /// Vendor name of the event
    pub fn event_type(&self) -> &'static str {
        match self {
            ParticipantEvent::TrackSubscribed { .. } => "trackSubscribed",
            ParticipantEvent::TrackUnsubscribed { .. } => "trackUnsubscribed",
            ParticipantEvent::TrackUnpublished { .. } => "trackUnpublished",
            ParticipantEvent::Reconnecting { .. } => "reconnecting",
            ParticipantEvent::Reconnected { .. } => "reconnected",
        }
    }

    /// Participant the event refers to
    pub fn participant_sid(&self) -> &str {
        match self {
            ParticipantEvent::TrackSubscribed { participant_sid, .. }
            | ParticipantEvent::TrackUnsubscribed { participant_sid, .. }
            | ParticipantEvent::TrackUnpublished { participant_sid, .. }
            | ParticipantEvent::Reconnecting { participant_sid }
            | ParticipantEvent::Reconnected { participant_sid } => participant_sid,
        }
    }
}

/// Events emitted by a joined room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RoomEvent {
    /// A remote participant joined
    ParticipantConnected {
        /// The participant and the tracks it is already subscribed to
        participant: ParticipantSnapshot,
    },
    /// A remote participant left
    ParticipantDisconnected {
        /// Participant SID
        participant_sid: String,
    },
    /// The local participant published a track
    LocalTrackPublished {
        /// The published track
        track: TrackSnapshot,
    },
    /// The local participant unpublished a track
    LocalTrackUnpublished {
        /// Local track id
        track_sid: TrackId,
    },
    /// Room signaling connection is recovering
    Reconnecting,
    /// Room signaling connection recovered
    Reconnected,
    /// Recording started
    RecordingStarted,
    /// Recording stopped
    RecordingStopped,
    /// The vendor closed the room connection
    Disconnected {
        /// Error reported with the disconnect
        #[serde(default)]
        reason: Option<String>,
    },
}

impl RoomEvent {
    /// Vendor name of the event
    pub fn event_type(&self) -> &'static str {
        match self {
            RoomEvent::ParticipantConnected { .. } => "participantConnected",
            RoomEvent::ParticipantDisconnected { .. } => "participantDisconnected",
            RoomEvent::LocalTrackPublished { .. } => "localTrackPublished",
            RoomEvent::LocalTrackUnpublished { .. } => "localTrackUnpublished",
            RoomEvent::Reconnecting => "reconnecting",
            RoomEvent::Reconnected => "reconnected",
            RoomEvent::RecordingStarted => "recordingStarted",
            RoomEvent::RecordingStopped => "recordingStopped",
            RoomEvent::Disconnected { .. } => "disconnected",
        }
    }
}

/// Any event the vendor SDK emits for a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "lowercase")]
pub enum VendorEvent {
    /// Track event
    Track(TrackEvent),
    /// Participant event
    Participant(ParticipantEvent),
    /// Room event
    Room(RoomEvent),
}

impl VendorEvent {
    /// Parse the flat JSON form of an event.
    ///
    /// Malformed payloads are reported as [`RoomLensError::VendorEventPayload`]
    /// carrying the `type` field when one could be read.
    pub fn from_json(payload: &str) -> Result<Self, RoomLensError> {
        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| RoomLensError::payload("unknown", e.to_string()))?;
        let event_type = value
            .get("type")
            .and_then(|value| value.as_str())
            .unwrap_or("unknown")
            .to_string();
        serde_json::from_value(value).map_err(|e| RoomLensError::payload(event_type, e.to_string()))
    }

    /// Vendor name of the event
    pub fn event_type(&self) -> &'static str {
        match self {
            VendorEvent::Track(event) => event.event_type(),
            VendorEvent::Participant(event) => event.event_type(),
            VendorEvent::Room(event) => event.event_type(),
        }
    }

    /// Check if this is a track event
    pub fn is_track_event(&self) -> bool {
        matches!(self, VendorEvent::Track(_))
    }

    /// Check if this is a participant event
    pub fn is_participant_event(&self) -> bool {
        matches!(self, VendorEvent::Participant(_))
    }

    /// Check if this is a room event
    pub fn is_room_event(&self) -> bool {
        matches!(self, VendorEvent::Room(_))
    }

    /// Check if the event ends the room session
    pub fn is_disconnect(&self) -> bool {
        matches!(self, VendorEvent::Room(RoomEvent::Disconnected { .. }))
    }
}

impl From<TrackEvent> for VendorEvent {
    fn from(event: TrackEvent) -> Self {
        VendorEvent::Track(event)
    }
}

impl From<ParticipantEvent> for VendorEvent {
    fn from(event: ParticipantEvent) -> Self {
        VendorEvent::Participant(event)
    }
}

impl From<RoomEvent> for VendorEvent {
    fn from(event: RoomEvent) -> Self {
        VendorEvent::Room(event)
    }
}
