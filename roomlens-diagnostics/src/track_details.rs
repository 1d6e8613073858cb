//! Labeled-stat rendering of track, participant and room records
//!
//! A [`TrackDetailsView`] remembers the text it last rendered for each label
//! so that re-applying a record only yields the stats that changed.

use roomlens_core::{ConnectionState, LifecycleState, ReadyState, RoomRecord, TrackOrigin, TrackRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Settings that are never displayed
pub const DEFAULT_EXCLUDED_SETTINGS: &[&str] = &["deviceId", "groupId"];

/// Visual emphasis of a stat value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Highlight {
    /// Worth a look (yellow)
    Warning,
    /// Broken (red)
    Error,
}

/// A label with its rendered value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledStat {
    /// Stat label
    pub label: String,
    /// Rendered value
    pub value: String,
    /// Emphasis, if any
    pub highlight: Option<Highlight>,
}

impl LabeledStat {
    /// Create a stat without emphasis
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            highlight: None,
        }
    }

    /// Set the emphasis when `condition` holds
    pub fn highlight_if(mut self, condition: bool, highlight: Highlight) -> Self {
        if condition {
            self.highlight = Some(highlight);
        }
        self
    }
}

/// Label of the enabled stat for a track origin
fn enabled_label(origin: TrackOrigin) -> &'static str {
    match origin {
        TrackOrigin::Local => "Track.enabled",
        TrackOrigin::Remote => "enabled",
    }
}

/// Label of the byte-rate stat for a track origin
pub fn rate_label(origin: TrackOrigin) -> &'static str {
    match origin {
        TrackOrigin::Local => "sent kbps",
        TrackOrigin::Remote => "received kbps",
    }
}

/// Diffing renderer for the details of one track
#[derive(Debug, Clone)]
pub struct TrackDetailsView {
    excluded: BTreeSet<String>,
    rendered: BTreeMap<String, String>,
}

impl TrackDetailsView {
    /// Create a view hiding the given setting keys
    pub fn new<I, S>(excluded_settings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: excluded_settings.into_iter().map(Into::into).collect(),
            rendered: BTreeMap::new(),
        }
    }

    /// Full set of stats for `record`, in display order
    pub fn render(&self, record: &TrackRecord) -> Vec<LabeledStat> {
        let mut stats = vec![
            LabeledStat::new("class", record.class_name()),
            LabeledStat::new("readyState", record.ready_state().to_string())
                .highlight_if(record.ready_state() == ReadyState::Ended, Highlight::Error),
            LabeledStat::new(enabled_label(record.origin()), record.is_enabled().to_string())
                .highlight_if(!record.is_enabled(), Highlight::Warning),
        ];

        if let Some(switch_off) = record.switch_off() {
            stats.push(
                LabeledStat::new("isSwitchedOff", switch_off.switched_off.to_string())
                    .highlight_if(switch_off.switched_off, Highlight::Warning),
            );
            stats.push(
                LabeledStat::new(
                    "switchOffReason",
                    switch_off.reason.clone().unwrap_or_else(|| "null".to_string()),
                )
                .highlight_if(switch_off.reason.is_some(), Highlight::Warning),
            );
        }

        let started = record.lifecycle_state() == LifecycleState::Started;
        stats.push(
            LabeledStat::new("muted", record.is_muted().to_string())
                .highlight_if(record.is_muted(), Highlight::Warning),
        );
        stats.push(
            LabeledStat::new("Track.started", started.to_string())
                .highlight_if(!started, Highlight::Warning),
        );
        stats.push(LabeledStat::new(
            rate_label(record.origin()),
            record.byte_rate().to_string(),
        ));

        if record.media_track_id().is_none() && record.settings().is_empty() {
            stats.push(LabeledStat::new("mediaStreamTrack", "none").highlight_if(true, Highlight::Warning));
        }
        for (key, value) in record.settings() {
            if self.excluded.contains(key) {
                continue;
            }
            let text = value.to_string();
            let highlight = text == "true";
            stats.push(LabeledStat::new(key.clone(), text).highlight_if(highlight, Highlight::Warning));
        }
        stats
    }

    /// Render `record` and return only the stats whose text differs from the
    /// previous call
    pub fn apply(&mut self, record: &TrackRecord) -> Vec<LabeledStat> {
        self.render(record)
            .into_iter()
            .filter(|stat| {
                let changed = self.rendered.get(&stat.label) != Some(&stat.value);
                if changed {
                    self.rendered.insert(stat.label.clone(), stat.value.clone());
                }
                changed
            })
            .collect()
    }

    /// Text last rendered for `label`
    pub fn value(&self, label: &str) -> Option<&str> {
        self.rendered.get(label).map(String::as_str)
    }
}

impl Default for TrackDetailsView {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_SETTINGS.iter().copied())
    }
}

/// State stat of a remote participant, labeled with its SID
pub fn participant_state_stat(sid: &str, state: ConnectionState) -> LabeledStat {
    let highlight = match state {
        ConnectionState::Connected => None,
        ConnectionState::Reconnecting => Some(Highlight::Warning),
        ConnectionState::Disconnected => Some(Highlight::Error),
    };
    LabeledStat {
        label: sid.to_string(),
        value: state.to_string(),
        highlight,
    }
}

/// Header stats of a joined room
pub fn room_stats(room: &RoomRecord) -> Vec<LabeledStat> {
    vec![
        LabeledStat::new("localParticipant", room.local_identity.clone()),
        participant_state_stat("room.state", room.state),
        LabeledStat::new("room.isRecording", room.is_recording.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomlens_core::{ByteSample, SettingValue, TrackId, TrackKind, TrackSettings};

    fn stat<'a>(stats: &'a [LabeledStat], label: &str) -> &'a LabeledStat {
        stats
            .iter()
            .find(|stat| stat.label == label)
            .unwrap_or_else(|| panic!("missing stat {}", label))
    }

    fn camera_settings() -> TrackSettings {
        let mut settings = TrackSettings::new();
        settings.insert("deviceId".to_string(), SettingValue::from("abc123"));
        settings.insert("groupId".to_string(), SettingValue::from("g1"));
        settings.insert("frameRate".to_string(), SettingValue::from(29.97003));
        settings.insert("width".to_string(), SettingValue::from(640u32));
        settings
    }

    #[test]
    fn test_render_local_track() {
        let mut record = TrackRecord::local(TrackId::new("cam"), TrackKind::Video);
        record.mark_started(Some("ms-1".to_string()), camera_settings());
        let stats = TrackDetailsView::default().render(&record);

        assert_eq!(stat(&stats, "class").value, "LocalVideoTrack");
        assert_eq!(stat(&stats, "readyState").value, "live");
        assert_eq!(stat(&stats, "Track.started").highlight, None);
        assert_eq!(stat(&stats, "sent kbps").value, "0");
        assert_eq!(stat(&stats, "Track.enabled").value, "true");
        assert!(stats.iter().all(|stat| stat.label != "enabled"));
        assert_eq!(stat(&stats, "frameRate").value, "29.97");
        assert!(stats.iter().all(|stat| stat.label != "deviceId" && stat.label != "groupId"));
        assert!(stats.iter().all(|stat| stat.label != "isSwitchedOff"));
    }

    #[test]
    fn test_render_highlights() {
        let mut record = TrackRecord::remote(TrackId::new("MT1"), TrackKind::Audio);
        record.set_enabled(false);
        record.set_muted(true);
        record
            .set_switched_off(true, Some("network-congestion".to_string()))
            .unwrap();
        record.mark_stopped();
        let stats = TrackDetailsView::default().render(&record);

        assert_eq!(stat(&stats, "readyState").highlight, Some(Highlight::Error));
        assert_eq!(stat(&stats, "enabled").highlight, Some(Highlight::Warning));
        assert_eq!(stat(&stats, "muted").highlight, Some(Highlight::Warning));
        assert_eq!(stat(&stats, "isSwitchedOff").highlight, Some(Highlight::Warning));
        assert_eq!(stat(&stats, "switchOffReason").value, "network-congestion");
        assert_eq!(stat(&stats, "Track.started").highlight, Some(Highlight::Warning));
        assert_eq!(stat(&stats, "mediaStreamTrack").value, "none");
    }

    #[test]
    fn test_apply_returns_only_changes() {
        let mut view = TrackDetailsView::default();
        let mut record = TrackRecord::remote(TrackId::new("MT1"), TrackKind::Video);
        let first = view.apply(&record);
        assert_eq!(first.len(), view.render(&record).len());
        assert!(view.apply(&record).is_empty());

        record.record_sample(ByteSample::new(1000, 0));
        record.record_sample(ByteSample::new(1500, 1000));
        let changed = view.apply(&record);
        assert_eq!(changed, vec![LabeledStat::new("received kbps", "0.5")]);
        assert_eq!(view.value("received kbps"), Some("0.5"));
    }

    #[test]
    fn test_participant_and_room_stats() {
        assert_eq!(participant_state_stat("PA1", ConnectionState::Connected).highlight, None);
        assert_eq!(
            participant_state_stat("PA1", ConnectionState::Reconnecting).highlight,
            Some(Highlight::Warning)
        );
        assert_eq!(
            participant_state_stat("PA1", ConnectionState::Disconnected).highlight,
            Some(Highlight::Error)
        );

        let snapshot = roomlens_core::RoomSnapshot::new("RM1", "alice");
        let room = RoomRecord::from_snapshot(&snapshot);
        let stats = room_stats(&room);
        assert_eq!(stats[0].value, "alice");
        assert_eq!(stats[1].label, "room.state");
        assert_eq!(stats[1].value, "connected");
        assert_eq!(stats[2].value, "false");
    }
}
