//! Track records and the values they carry

use crate::error::RoomLensError;
use crate::stats::{compute_byte_rate, ByteSample};
use crate::vendor::TrackSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Stable identity of a track.
///
/// Remote tracks are keyed by their vendor track SID, local tracks by their
/// local track id. The low-level media-track id bound to a track is not part
/// of its identity since it can change across renegotiation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    /// Wrap a vendor-assigned identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Track kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Whether a track is captured here or received from another participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackOrigin {
    /// Captured on this peer
    Local,
    /// Received from a remote participant
    Remote,
}

impl fmt::Display for TrackOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackOrigin::Local => write!(f, "local"),
            TrackOrigin::Remote => write!(f, "remote"),
        }
    }
}

/// Track lifecycle as reported by the vendor SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Instantiated but no media has flowed yet
    Created,
    /// Media has started
    Started,
    /// Track was stopped; no further samples are accepted
    Stopped,
}

/// Ready state of the underlying media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    /// Media track is live
    Live,
    /// Media track has ended
    Ended,
    /// No media track is bound
    Unknown,
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadyState::Live => write!(f, "live"),
            ReadyState::Ended => write!(f, "ended"),
            ReadyState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Scalar value of a single media setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Boolean setting, e.g. `echoCancellation`
    Bool(bool),
    /// Numeric setting, e.g. `frameRate`
    Number(f64),
    /// Textual setting, e.g. `facingMode`
    Text(String),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(value) => write!(f, "{}", value),
            // settings are displayed with at most two decimals
            SettingValue::Number(value) => write!(f, "{}", (value * 100.0).round() / 100.0),
            SettingValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Number(value)
    }
}

impl From<u32> for SettingValue {
    fn from(value: u32) -> Self {
        SettingValue::Number(value as f64)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

/// Snapshot of the last known media constraints and capabilities
pub type TrackSettings = BTreeMap<String, SettingValue>;

/// Bandwidth-adaptation state of a remote track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchOffState {
    /// Whether the network layer has paused the track's media
    pub switched_off: bool,
    /// Reason reported by the vendor, if any
    pub reason: Option<String>,
}

/// Per-track state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    id: TrackId,
    name: Option<String>,
    kind: TrackKind,
    origin: TrackOrigin,
    media_track_id: Option<String>,
    lifecycle_state: LifecycleState,
    enabled: bool,
    muted: bool,
    ready_state: ReadyState,
    /// Present only for remote tracks
    switch_off: Option<SwitchOffState>,
    settings: TrackSettings,
    last_sample: Option<ByteSample>,
    byte_rate: f64,
}

impl TrackRecord {
    /// Create a record for a freshly instantiated local track
    pub fn local(id: TrackId, kind: TrackKind) -> Self {
        Self::new(id, kind, TrackOrigin::Local)
    }

    /// Create a record for a newly subscribed remote track
    pub fn remote(id: TrackId, kind: TrackKind) -> Self {
        Self::new(id, kind, TrackOrigin::Remote)
    }

    fn new(id: TrackId, kind: TrackKind, origin: TrackOrigin) -> Self {
        let switch_off = match origin {
            TrackOrigin::Remote => Some(SwitchOffState::default()),
            TrackOrigin::Local => None,
        };
        Self {
            id,
            name: None,
            kind,
            origin,
            media_track_id: None,
            lifecycle_state: LifecycleState::Created,
            enabled: true,
            muted: false,
            ready_state: ReadyState::Unknown,
            switch_off,
            settings: TrackSettings::new(),
            last_sample: None,
            byte_rate: 0.0,
        }
    }

    /// Build a record from the vendor's view of a track
    pub fn from_snapshot(snapshot: &TrackSnapshot, origin: TrackOrigin) -> Self {
        let mut record = Self::new(TrackId::new(snapshot.sid.clone()), snapshot.kind, origin);
        record.name = snapshot.name.clone();
        record.media_track_id = snapshot.media_track_id.clone();
        record.enabled = snapshot.is_enabled;
        record.muted = snapshot.muted;
        record.ready_state = snapshot.ready_state;
        record.settings = snapshot.settings.clone();
        if snapshot.is_started {
            record.lifecycle_state = LifecycleState::Started;
        }
        if let Some(switch_off) = record.switch_off.as_mut() {
            switch_off.switched_off = snapshot.is_switched_off;
            switch_off.reason = snapshot.switch_off_reason.clone();
        }
        record
    }

    /// Get track ID
    pub fn id(&self) -> &TrackId {
        &self.id
    }

    /// Get the vendor track name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Get track kind
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Get track origin
    pub fn origin(&self) -> TrackOrigin {
        self.origin
    }

    /// Media-track id currently bound to this track
    pub fn media_track_id(&self) -> Option<&str> {
        self.media_track_id.as_deref()
    }

    /// Get lifecycle state
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle_state
    }

    /// Check if the track is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check if the media track is muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Get ready state
    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    /// Switch-off state, `None` for local tracks
    pub fn switch_off(&self) -> Option<&SwitchOffState> {
        self.switch_off.as_ref()
    }

    /// Get settings snapshot
    pub fn settings(&self) -> &TrackSettings {
        &self.settings
    }

    /// Last accepted byte sample
    pub fn last_sample(&self) -> Option<ByteSample> {
        self.last_sample
    }

    /// Byte counter of the last accepted sample, 0 before the first one
    pub fn last_bytes_transferred(&self) -> u64 {
        self.last_sample.map_or(0, |sample| sample.bytes)
    }

    /// Timestamp of the last accepted sample, 0 before the first one
    pub fn last_sample_timestamp_ms(&self) -> u64 {
        self.last_sample.map_or(0, |sample| sample.timestamp_ms)
    }

    /// Last computed transfer rate in bytes per millisecond
    pub fn byte_rate(&self) -> f64 {
        self.byte_rate
    }

    /// Vendor class name used for display
    pub fn class_name(&self) -> &'static str {
        match (self.origin, self.kind) {
            (TrackOrigin::Local, TrackKind::Audio) => "LocalAudioTrack",
            (TrackOrigin::Local, TrackKind::Video) => "LocalVideoTrack",
            (TrackOrigin::Remote, TrackKind::Audio) => "RemoteAudioTrack",
            (TrackOrigin::Remote, TrackKind::Video) => "RemoteVideoTrack",
        }
    }

    /// Check if the track accepts byte samples
    pub fn accepts_samples(&self) -> bool {
        self.lifecycle_state != LifecycleState::Stopped
    }

    /// Mark the track started, rebinding its media track and settings
    pub fn mark_started(&mut self, media_track_id: Option<String>, settings: TrackSettings) {
        debug!("🔄 Track {} started", self.id);
        self.lifecycle_state = LifecycleState::Started;
        self.ready_state = ReadyState::Live;
        if media_track_id.is_some() {
            self.media_track_id = media_track_id;
        }
        self.settings = settings;
    }

    /// Mark the track stopped
    pub fn mark_stopped(&mut self) {
        debug!("🔄 Track {} stopped", self.id);
        self.lifecycle_state = LifecycleState::Stopped;
        self.ready_state = ReadyState::Ended;
    }

    /// Set the enabled flag
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Set the media-level muted flag
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Replace the settings snapshot
    pub fn set_settings(&mut self, settings: TrackSettings) {
        self.settings = settings;
    }

    /// Update the switch-off state of a remote track
    pub fn set_switched_off(
        &mut self,
        switched_off: bool,
        reason: Option<String>,
    ) -> Result<(), RoomLensError> {
        let event_type = if switched_off { "switchedOff" } else { "switchedOn" };
        let state = self.switch_off.as_mut().ok_or_else(|| {
            RoomLensError::payload(event_type, format!("local track {} cannot be switched off", self.id))
        })?;
        state.switched_off = switched_off;
        state.reason = if switched_off { reason } else { None };
        Ok(())
    }

    /// Feed a byte sample, returning the new rate or `None` once stopped
    pub fn record_sample(&mut self, sample: ByteSample) -> Option<f64> {
        if !self.accepts_samples() {
            return None;
        }
        let rate = compute_byte_rate(self.last_sample, sample);
        self.last_sample = Some(sample);
        self.byte_rate = rate;
        Some(rate)
    }
}
