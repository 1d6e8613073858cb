//! Event reconciler
//!
//! Owns the records of one joined room and translates vendor events into
//! registry, participant and room mutations. Every mutation is followed by a
//! synchronous presentation callback. Failures are logged and dropped here;
//! nothing a vendor event does can fail the caller.

use crate::event::{ParticipantEvent, RoomEvent, TrackEvent, VendorEvent};
use crate::presentation::{ParticipantChange, PresentationObserver, RoomScopedObserver};
use roomlens_core::{
    ConnectionState, ParticipantRecord, ParticipantSnapshot, RoomLensError, RoomRecord, RoomSnapshot,
    TrackId, TrackOrigin, TrackRecord, TrackRegistry, TrackSnapshot,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the caller has to do after an event was reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Nothing further
    Applied,
    /// The event was invalid for the current state and dropped
    Dropped,
    /// The vendor ended the session; the room must be torn down
    Disconnected,
}

/// Records of one room plus the rules that mutate them
pub struct EventReconciler {
    record: RoomRecord,
    registry: TrackRegistry,
    observer: Arc<dyn PresentationObserver>,
}

impl std::fmt::Debug for EventReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReconciler")
            .field("record", &self.record)
            .field("registry", &self.registry)
            .finish()
    }
}

impl EventReconciler {
    /// Build the records of a freshly joined room.
    ///
    /// The room observer is notified first, then the local tracks and the
    /// participants already present are seeded as if they had just been
    /// published and connected.
    pub fn new(snapshot: &RoomSnapshot, observer: Arc<dyn PresentationObserver>) -> Self {
        let registry = TrackRegistry::with_observer(Arc::new(RoomScopedObserver::new(
            snapshot.sid.clone(),
            observer.clone(),
        )));
        let mut reconciler = Self {
            record: RoomRecord::from_snapshot(snapshot),
            registry,
            observer,
        };
        reconciler.observer.on_room_changed(&reconciler.record);

        for track in &snapshot.local_tracks {
            if let Err(e) = reconciler.publish_local(track) {
                warn!("Dropping local track of room {}: {}", snapshot.sid, e);
            }
        }
        for participant in &snapshot.participants {
            if let Err(e) = reconciler.connect_participant(participant) {
                warn!("Dropping participant of room {}: {}", snapshot.sid, e);
            }
        }
        reconciler
    }

    /// Room SID
    pub fn room_sid(&self) -> &str {
        &self.record.sid
    }

    /// Room record
    pub fn record(&self) -> &RoomRecord {
        &self.record
    }

    /// Track registry of the room
    pub fn registry(&self) -> &TrackRegistry {
        &self.registry
    }

    /// Mutable track registry, used to feed byte samples
    pub fn registry_mut(&mut self) -> &mut TrackRegistry {
        &mut self.registry
    }

    /// Apply one vendor event
    pub fn reconcile(&mut self, event: VendorEvent) -> Reconciled {
        let event_type = event.event_type();
        debug!("📡 Reconciling {} event in room {}", event_type, self.record.sid);

        let result = match event {
            VendorEvent::Track(event) => self.reconcile_track(event).map(|_| Reconciled::Applied),
            VendorEvent::Participant(event) => self.reconcile_participant(event).map(|_| Reconciled::Applied),
            VendorEvent::Room(event) => self.reconcile_room(event),
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_recoverable() => {
                warn!(
                    code = e.error_code(),
                    "Dropped {} event in room {}: {}", event_type, self.record.sid, e
                );
                Reconciled::Dropped
            }
            Err(e) => {
                warn!("Unexpected failure handling {} event: {}", event_type, e);
                Reconciled::Dropped
            }
        }
    }

    fn reconcile_track(&mut self, event: TrackEvent) -> Result<(), RoomLensError> {
        let sid = event.track_sid().as_str();
        let id = self
            .registry
            .resolve(Some(sid), Some(sid))
            .ok_or_else(|| RoomLensError::UnknownTrack {
                track_id: sid.to_string(),
            })?;

        match event {
            TrackEvent::Started {
                media_track_id,
                settings,
                ..
            } => self
                .registry
                .update(&id, |record| record.mark_started(media_track_id, settings))?,
            TrackEvent::Stopped { .. } => self.registry.update(&id, |record| record.mark_stopped())?,
            TrackEvent::Enabled { .. } => self.registry.update(&id, |record| record.set_enabled(true))?,
            TrackEvent::Disabled { .. } => self.registry.update(&id, |record| record.set_enabled(false))?,
            TrackEvent::Muted { .. } => self.registry.update(&id, |record| record.set_muted(true))?,
            TrackEvent::Unmuted { .. } => self.registry.update(&id, |record| record.set_muted(false))?,
            TrackEvent::DimensionsChanged { settings, .. } => {
                self.registry.update(&id, |record| record.set_settings(settings))?
            }
            TrackEvent::SwitchedOff { reason, .. } => self
                .registry
                .try_update(&id, |record| record.set_switched_off(true, reason))?,
            TrackEvent::SwitchedOn { .. } => self
                .registry
                .try_update(&id, |record| record.set_switched_off(false, None))?,
        };
        Ok(())
    }

    fn reconcile_participant(&mut self, event: ParticipantEvent) -> Result<(), RoomLensError> {
        let event_type = event.event_type();
        let participant_sid = event.participant_sid().to_string();
        if !self.record.participants.contains_key(&participant_sid) {
            return Err(RoomLensError::ParticipantNotFound {
                room_sid: self.record.sid.clone(),
                participant_sid,
            });
        }

        match event {
            ParticipantEvent::TrackSubscribed { track, .. } => {
                track.validate(event_type)?;
                self.subscribe(&participant_sid, &track)?;
            }
            ParticipantEvent::TrackUnsubscribed { track_sid, .. }
            | ParticipantEvent::TrackUnpublished { track_sid, .. } => {
                self.retire_remote(&participant_sid, &track_sid)?;
            }
            ParticipantEvent::Reconnecting { .. } => {
                self.set_participant_state(&participant_sid, ConnectionState::Reconnecting)
            }
            ParticipantEvent::Reconnected { .. } => {
                self.set_participant_state(&participant_sid, ConnectionState::Connected)
            }
        }
        Ok(())
    }

    fn reconcile_room(&mut self, event: RoomEvent) -> Result<Reconciled, RoomLensError> {
        let event_type = event.event_type();
        match event {
            RoomEvent::ParticipantConnected { participant } => {
                participant.validate(event_type)?;
                self.connect_participant(&participant)?;
            }
            RoomEvent::ParticipantDisconnected { participant_sid } => {
                self.disconnect_participant(&participant_sid)?;
            }
            RoomEvent::LocalTrackPublished { track } => {
                track.validate(event_type)?;
                self.publish_local(&track)?;
            }
            RoomEvent::LocalTrackUnpublished { track_sid } => {
                if !self.record.local_tracks.remove(&track_sid) {
                    return Err(RoomLensError::UnknownTrack {
                        track_id: track_sid.to_string(),
                    });
                }
                self.registry.remove(&track_sid);
            }
            RoomEvent::Reconnecting => self.set_room_state(ConnectionState::Reconnecting),
            RoomEvent::Reconnected => self.set_room_state(ConnectionState::Connected),
            RoomEvent::RecordingStarted => self.set_recording(true),
            RoomEvent::RecordingStopped => self.set_recording(false),
            RoomEvent::Disconnected { reason } => {
                match reason {
                    Some(reason) => info!("Room {} disconnected: {}", self.record.sid, reason),
                    None => info!("Room {} disconnected", self.record.sid),
                }
                return Ok(Reconciled::Disconnected);
            }
        }
        Ok(Reconciled::Applied)
    }

    fn publish_local(&mut self, track: &TrackSnapshot) -> Result<(), RoomLensError> {
        let record = TrackRecord::from_snapshot(track, TrackOrigin::Local);
        let id = record.id().clone();
        self.registry.register(id.clone(), record)?;
        self.record.local_tracks.insert(id);
        Ok(())
    }

    fn connect_participant(&mut self, snapshot: &ParticipantSnapshot) -> Result<(), RoomLensError> {
        if self.record.participants.contains_key(&snapshot.sid) {
            return Err(RoomLensError::ParticipantAlreadyExists {
                room_sid: self.record.sid.clone(),
                participant_sid: snapshot.sid.clone(),
            });
        }
        info!("👤 Participant {} joined room {}", snapshot.identity, self.record.sid);
        let participant = ParticipantRecord::from_snapshot(snapshot);
        self.observer
            .on_participant_changed(&self.record.sid, &ParticipantChange::Connected(&participant));
        self.record.participants.insert(snapshot.sid.clone(), participant);

        for track in &snapshot.tracks {
            if let Err(e) = self.subscribe(&snapshot.sid, track) {
                warn!("Dropping track of participant {}: {}", snapshot.sid, e);
            }
        }
        Ok(())
    }

    fn subscribe(&mut self, participant_sid: &str, track: &TrackSnapshot) -> Result<(), RoomLensError> {
        let record = TrackRecord::from_snapshot(track, TrackOrigin::Remote);
        let id = record.id().clone();
        self.registry.register(id.clone(), record)?;
        if let Some(participant) = self.record.participants.get_mut(participant_sid) {
            participant.tracks.insert(id);
            self.observer
                .on_participant_changed(&self.record.sid, &ParticipantChange::Updated(participant));
        }
        Ok(())
    }

    /// Only the owning participant can retire a remote track.
    fn retire_remote(&mut self, participant_sid: &str, id: &TrackId) -> Result<(), RoomLensError> {
        let participant = match self.record.participants.get_mut(participant_sid) {
            Some(participant) if participant.tracks.contains(id) => {
                participant.tracks.remove(id);
                participant
            }
            _ => {
                return Err(RoomLensError::UnknownTrack {
                    track_id: id.to_string(),
                })
            }
        };
        self.registry.remove(id);
        self.observer
            .on_participant_changed(&self.record.sid, &ParticipantChange::Updated(participant));
        Ok(())
    }

    fn set_participant_state(&mut self, participant_sid: &str, state: ConnectionState) {
        if let Some(participant) = self.record.participants.get_mut(participant_sid) {
            participant.connection_state = state;
            self.observer
                .on_participant_changed(&self.record.sid, &ParticipantChange::Updated(participant));
        }
    }

    fn disconnect_participant(&mut self, participant_sid: &str) -> Result<(), RoomLensError> {
        let mut participant =
            self.record
                .participants
                .remove(participant_sid)
                .ok_or_else(|| RoomLensError::ParticipantNotFound {
                    room_sid: self.record.sid.clone(),
                    participant_sid: participant_sid.to_string(),
                })?;
        for id in std::mem::take(&mut participant.tracks) {
            self.registry.remove(&id);
        }
        participant.connection_state = ConnectionState::Disconnected;
        info!("👤 Participant {} left room {}", participant.identity, self.record.sid);
        self.observer
            .on_participant_changed(&self.record.sid, &ParticipantChange::Disconnected(&participant));
        Ok(())
    }

    fn set_room_state(&mut self, state: ConnectionState) {
        self.record.state = state;
        self.observer.on_room_changed(&self.record);
    }

    fn set_recording(&mut self, is_recording: bool) {
        self.record.is_recording = is_recording;
        self.observer.on_room_changed(&self.record);
    }

    /// Remove every participant and track, then report the room as
    /// disconnected. Calling it twice only notifies once per record.
    pub fn teardown(&mut self) {
        let participants: Vec<String> = self.record.participants.keys().cloned().collect();
        for participant_sid in participants {
            if let Err(e) = self.disconnect_participant(&participant_sid) {
                debug!("Teardown skipped participant: {}", e);
            }
        }
        for id in std::mem::take(&mut self.record.local_tracks) {
            self.registry.remove(&id);
        }
        for id in self.registry.ids() {
            self.registry.remove(&id);
        }
        if self.record.state != ConnectionState::Disconnected {
            self.record.state = ConnectionState::Disconnected;
            self.observer.on_room_changed(&self.record);
        }
    }
}
