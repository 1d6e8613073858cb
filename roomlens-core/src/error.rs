//! Error types for RoomLens

use thiserror::Error;

/// Main error type for RoomLens operations
#[derive(Error, Debug)]
pub enum RoomLensError {
    /// Initialization error
    #[error("Initialization failed: {reason}")]
    Initialization {
        /// Reason for initialization failure
        reason: String,
    },

    /// Missing configuration error
    #[error("Missing required configuration: {field}")]
    MissingConfiguration {
        /// Missing configuration field
        field: String,
    },

    /// A track id was registered twice
    #[error("Track already registered: {track_id}")]
    DuplicateTrack {
        /// Track that was already present
        track_id: String,
    },

    /// An update or removal targeted a track that is not registered
    #[error("Track not found: {track_id}")]
    UnknownTrack {
        /// Track that was not found
        track_id: String,
    },

    /// The periodic aggregate statistics fetch failed
    #[error("Stats fetch failed for room {room_sid}: {reason}")]
    StatsFetch {
        /// Room whose stats could not be fetched
        room_sid: String,
        /// Reason for the failure
        reason: String,
    },

    /// A vendor event carried malformed or unexpected data
    #[error("Malformed {event_type} event: {reason}")]
    VendorEventPayload {
        /// Event type as reported by the vendor
        event_type: String,
        /// What was wrong with the payload
        reason: String,
    },

    /// Room not found
    #[error("Room not found: {room_sid}")]
    RoomNotFound {
        /// Room SID that was not found
        room_sid: String,
    },

    /// Room already joined
    #[error("Room already joined: {room_sid}")]
    RoomAlreadyJoined {
        /// Room SID that is already joined
        room_sid: String,
    },

    /// Participant already exists
    #[error("Participant {participant_sid} already exists in room {room_sid}")]
    ParticipantAlreadyExists {
        /// Room SID
        room_sid: String,
        /// Participant SID that already exists
        participant_sid: String,
    },

    /// Participant not found
    #[error("Participant {participant_sid} not found in room {room_sid}")]
    ParticipantNotFound {
        /// Room SID
        room_sid: String,
        /// Participant SID that was not found
        participant_sid: String,
    },

    /// The supervisor event loop is no longer running
    #[error("Room supervisor is not running")]
    SupervisorClosed,

    /// No access credential could be obtained, so the room cannot be joined
    #[error("Credential issuance failed: {reason}")]
    CredentialIssuance {
        /// Reason for the failure
        reason: String,
    },
}

impl RoomLensError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            RoomLensError::Initialization { .. } => "INITIALIZATION_FAILED",
            RoomLensError::MissingConfiguration { .. } => "MISSING_CONFIGURATION",
            RoomLensError::DuplicateTrack { .. } => "DUPLICATE_TRACK",
            RoomLensError::UnknownTrack { .. } => "UNKNOWN_TRACK",
            RoomLensError::StatsFetch { .. } => "STATS_FETCH_FAILED",
            RoomLensError::VendorEventPayload { .. } => "VENDOR_EVENT_PAYLOAD",
            RoomLensError::RoomNotFound { .. } => "ROOM_NOT_FOUND",
            RoomLensError::RoomAlreadyJoined { .. } => "ROOM_ALREADY_JOINED",
            RoomLensError::ParticipantAlreadyExists { .. } => "PARTICIPANT_ALREADY_EXISTS",
            RoomLensError::ParticipantNotFound { .. } => "PARTICIPANT_NOT_FOUND",
            RoomLensError::SupervisorClosed => "SUPERVISOR_CLOSED",
            RoomLensError::CredentialIssuance { .. } => "CREDENTIAL_ISSUANCE_FAILED",
        }
    }

    /// Whether the component that detects this error recovers from it locally.
    ///
    /// Recoverable errors are logged and dropped; they never reach the
    /// presentation layer.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RoomLensError::DuplicateTrack { .. }
                | RoomLensError::UnknownTrack { .. }
                | RoomLensError::StatsFetch { .. }
                | RoomLensError::VendorEventPayload { .. }
                | RoomLensError::ParticipantAlreadyExists { .. }
                | RoomLensError::ParticipantNotFound { .. }
        )
    }

    /// Build a [`RoomLensError::VendorEventPayload`]
    pub fn payload(event_type: impl Into<String>, reason: impl Into<String>) -> Self {
        RoomLensError::VendorEventPayload {
            event_type: event_type.into(),
            reason: reason.into(),
        }
    }
}
