//! Presentation observers
//!
//! Records are authoritative; everything that displays them subscribes through
//! [`PresentationObserver`]. Callbacks run synchronously on the supervisor
//! task right after the mutation they describe, so they must not block.

use parking_lot::Mutex;
use roomlens_core::{
    ConnectionState, ParticipantRecord, RoomRecord, TrackChange, TrackId, TrackObserver, TrackOrigin, TrackRecord,
};
use roomlens_diagnostics::{participant_state_stat, room_stats, ActivityLog, LabeledStat, TrackDetailsView};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A participant-level mutation
#[derive(Debug, Clone, Copy)]
pub enum ParticipantChange<'a> {
    /// Participant joined the room
    Connected(&'a ParticipantRecord),
    /// Participant connection state changed or its track set changed
    Updated(&'a ParticipantRecord),
    /// Participant left; its tracks have already been removed
    Disconnected(&'a ParticipantRecord),
}

impl<'a> ParticipantChange<'a> {
    /// The participant record carried by the change
    pub fn record(&self) -> &'a ParticipantRecord {
        match self {
            ParticipantChange::Connected(record)
            | ParticipantChange::Updated(record)
            | ParticipantChange::Disconnected(record) => record,
        }
    }
}

/// Receives every record mutation of every room
pub trait PresentationObserver: Send + Sync {
    /// A track record of `room_sid` changed
    fn on_track_changed(&self, _room_sid: &str, _id: &TrackId, _change: &TrackChange<'_>) {}

    /// A participant of `room_sid` changed
    fn on_participant_changed(&self, _room_sid: &str, _change: &ParticipantChange<'_>) {}

    /// Room-level fields changed; also called once on join and once on leave
    /// with state `disconnected`
    fn on_room_changed(&self, _room: &RoomRecord) {}
}

/// Observer ignoring everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PresentationObserver for NoopObserver {}

/// Forwards to several observers in order
#[derive(Default, Clone)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn PresentationObserver>>,
}

impl ObserverSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer
    pub fn with(mut self, observer: Arc<dyn PresentationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Number of observers
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl PresentationObserver for ObserverSet {
    fn on_track_changed(&self, room_sid: &str, id: &TrackId, change: &TrackChange<'_>) {
        for observer in &self.observers {
            observer.on_track_changed(room_sid, id, change);
        }
    }

    fn on_participant_changed(&self, room_sid: &str, change: &ParticipantChange<'_>) {
        for observer in &self.observers {
            observer.on_participant_changed(room_sid, change);
        }
    }

    fn on_room_changed(&self, room: &RoomRecord) {
        for observer in &self.observers {
            observer.on_room_changed(room);
        }
    }
}

/// Adapts a presentation observer to the track registry of one room
pub struct RoomScopedObserver {
    room_sid: String,
    inner: Arc<dyn PresentationObserver>,
}

impl RoomScopedObserver {
    /// Scope `inner` to `room_sid`
    pub fn new(room_sid: impl Into<String>, inner: Arc<dyn PresentationObserver>) -> Self {
        Self {
            room_sid: room_sid.into(),
            inner,
        }
    }
}

impl TrackObserver for RoomScopedObserver {
    fn on_track_changed(&self, id: &TrackId, change: &TrackChange<'_>) {
        self.inner.on_track_changed(&self.room_sid, id, change);
    }
}

type TrackKey = (String, TrackId);

#[derive(Debug, Default)]
struct RenderState {
    records: BTreeMap<TrackKey, TrackRecord>,
    views: BTreeMap<TrackKey, RenderedTrack>,
    detached: BTreeSet<TrackKey>,
    rooms: BTreeMap<String, RenderedRoom>,
}

#[derive(Debug)]
struct RenderedRoom {
    state: ConnectionState,
    is_recording: bool,
    header: Vec<LabeledStat>,
    participants: BTreeMap<String, LabeledStat>,
}

#[derive(Debug)]
struct RenderedTrack {
    view: TrackDetailsView,
    stats: Vec<LabeledStat>,
}

/// Keeps one [`TrackDetailsView`] per rendered track and writes lifecycle
/// lines into the activity log
pub struct RenderingObserver {
    activity: ActivityLog,
    excluded_settings: Vec<String>,
    auto_attach: bool,
    state: Mutex<RenderState>,
}

impl RenderingObserver {
    /// Create a renderer logging into `activity`.
    ///
    /// Remote tracks get a details view as soon as they are subscribed when
    /// `auto_attach` is set, otherwise only once [`attach`](Self::attach)ed.
    pub fn new(activity: ActivityLog, excluded_settings: Vec<String>, auto_attach: bool) -> Self {
        Self {
            activity,
            excluded_settings,
            auto_attach,
            state: Mutex::new(RenderState::default()),
        }
    }

    fn rendered(&self, record: &TrackRecord) -> RenderedTrack {
        let mut view = TrackDetailsView::new(self.excluded_settings.iter().cloned());
        view.apply(record);
        let stats = view.render(record);
        RenderedTrack { view, stats }
    }

    /// Start rendering a registered track. Returns `false` if the track is
    /// not known in `room_sid`.
    pub fn attach(&self, room_sid: &str, id: &TrackId) -> bool {
        let key = (room_sid.to_string(), id.clone());
        let mut state = self.state.lock();
        let Some(record) = state.records.get(&key) else {
            return false;
        };
        let rendered = self.rendered(record);
        state.detached.remove(&key);
        state.views.entry(key).or_insert(rendered);
        true
    }

    /// Stop rendering a track
    pub fn detach(&self, room_sid: &str, id: &TrackId) {
        let key = (room_sid.to_string(), id.clone());
        let mut state = self.state.lock();
        state.views.remove(&key);
        state.detached.insert(key);
    }

    /// Full stat list last rendered for a track
    pub fn details(&self, room_sid: &str, id: &TrackId) -> Option<Vec<LabeledStat>> {
        self.state
            .lock()
            .views
            .get(&(room_sid.to_string(), id.clone()))
            .map(|rendered| rendered.stats.clone())
    }

    /// Room header followed by one state stat per remote participant
    pub fn room_details(&self, room_sid: &str) -> Option<Vec<LabeledStat>> {
        let state = self.state.lock();
        let room = state.rooms.get(room_sid)?;
        Some(
            room.header
                .iter()
                .chain(room.participants.values())
                .cloned()
                .collect(),
        )
    }

    /// Number of tracks currently rendered
    pub fn rendered_tracks(&self) -> usize {
        self.state.lock().views.len()
    }

    /// The activity log written to
    pub fn activity_log(&self) -> &ActivityLog {
        &self.activity
    }
}

impl PresentationObserver for RenderingObserver {
    fn on_track_changed(&self, room_sid: &str, id: &TrackId, change: &TrackChange<'_>) {
        let key = (room_sid.to_string(), id.clone());
        let mut state = self.state.lock();

        match change {
            TrackChange::Registered(record) => {
                let label = record.name().unwrap_or(id.as_str());
                match record.origin() {
                    TrackOrigin::Local => self.activity.log(format!("Published {}:{}", record.kind(), label)),
                    TrackOrigin::Remote => {
                        self.activity.log(format!("Subscribed to {}:{}", record.kind(), label))
                    }
                }
                let attach = (record.origin() == TrackOrigin::Local || self.auto_attach)
                    && !state.detached.contains(&key);
                if attach {
                    let rendered = self.rendered(record);
                    state.views.insert(key.clone(), rendered);
                }
                state.records.insert(key, (*record).clone());
            }
            TrackChange::Updated { new, .. } => {
                state.records.insert(key.clone(), (*new).clone());
                if let Some(rendered) = state.views.get_mut(&key) {
                    rendered.view.apply(new);
                    rendered.stats = rendered.view.render(new);
                }
            }
            TrackChange::Removed(record) => {
                let label = record.name().unwrap_or(id.as_str());
                match record.origin() {
                    TrackOrigin::Local => self.activity.log(format!("Unpublished {}:{}", record.kind(), label)),
                    TrackOrigin::Remote => {
                        self.activity.log(format!("Unsubscribed from {}:{}", record.kind(), label))
                    }
                }
                state.records.remove(&key);
                state.views.remove(&key);
                state.detached.remove(&key);
            }
        }
    }

    fn on_participant_changed(&self, room_sid: &str, change: &ParticipantChange<'_>) {
        let record = change.record();
        if let Some(room) = self.state.lock().rooms.get_mut(room_sid) {
            match change {
                ParticipantChange::Disconnected(_) => {
                    room.participants.remove(&record.sid);
                }
                _ => {
                    room.participants.insert(
                        record.sid.clone(),
                        participant_state_stat(&record.sid, record.connection_state),
                    );
                }
            }
        }
        match change {
            ParticipantChange::Connected(_) => self
                .activity
                .log(format!("Participant {} connected to {}", record.identity, room_sid)),
            ParticipantChange::Updated(_) => self.activity.log(format!(
                "Participant {} is {}",
                record.identity, record.connection_state
            )),
            ParticipantChange::Disconnected(_) => self
                .activity
                .log(format!("Participant {} disconnected from {}", record.identity, room_sid)),
        }
    }

    fn on_room_changed(&self, room: &RoomRecord) {
        let mut state = self.state.lock();
        let previous = state
            .rooms
            .get(&room.sid)
            .map(|rendered| (rendered.state, rendered.is_recording));

        match previous {
            None => self
                .activity
                .log(format!("Joined {} as \"{}\"", room.sid, room.local_identity)),
            Some((_, was_recording)) if was_recording != room.is_recording => {
                if room.is_recording {
                    self.activity.log("recordingStarted");
                } else {
                    self.activity.log("recordingStopped");
                }
            }
            Some((previous_state, _)) if previous_state != room.state => {
                if room.state != ConnectionState::Disconnected {
                    self.activity.log(format!("Room {} is {}", room.sid, room.state));
                }
            }
            Some(_) => {}
        }

        if room.state == ConnectionState::Disconnected {
            self.activity
                .log(format!("Left {} as \"{}\"", room.sid, room.local_identity));
            state.rooms.remove(&room.sid);
            state.records.retain(|(sid, _), _| sid != &room.sid);
            state.views.retain(|(sid, _), _| sid != &room.sid);
            state.detached.retain(|(sid, _)| sid != &room.sid);
        } else {
            let rendered = state.rooms.entry(room.sid.clone()).or_insert_with(|| RenderedRoom {
                state: room.state,
                is_recording: room.is_recording,
                header: Vec::new(),
                participants: BTreeMap::new(),
            });
            rendered.state = room.state;
            rendered.is_recording = room.is_recording;
            rendered.header = room_stats(room);
        }
    }
}
