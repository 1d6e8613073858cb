//! Room/participant supervisor
//!
//! A single task owns every joined room. Callers talk to it through a
//! [`SupervisorHandle`]; sampler tasks post their reports into the same
//! command channel, so all record mutation is serialized on the loop and no
//! lock guards a registry.
//!
//! Each room carries a generation number. Leaving a room aborts its sampler
//! and forgets the generation, so a report that was already queued when the
//! room was left is recognised as stale and dropped.

use crate::config::RoomConfig;
use crate::event::VendorEvent;
use crate::presentation::PresentationObserver;
use crate::reconciler::{EventReconciler, Reconciled};
use crate::sampler::{apply_reports, SamplerHandle, StatsSampler};
use roomlens_core::{RoomLensError, RoomRecord, RoomSnapshot, StatsReport, StatsSource, TrackRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Point-in-time copy of a joined room
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomView {
    /// Room record
    pub record: RoomRecord,
    /// Every registered track, ordered by id
    pub tracks: Vec<TrackRecord>,
    /// Whether a sampler task is polling the room
    pub sampler_active: bool,
    /// Generation of the room's current session
    pub generation: u64,
}

impl RoomView {
    /// Number of remote participants
    pub fn participant_count(&self) -> usize {
        self.record.participants.len()
    }

    /// Number of registered tracks
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

/// Messages processed by the supervisor loop
pub enum SupervisorCommand {
    /// Join a room
    Join {
        /// Vendor state at join time
        snapshot: RoomSnapshot,
        /// Per-room settings
        config: RoomConfig,
        /// Statistics source, if the room is sampled
        stats_source: Option<Arc<dyn StatsSource>>,
        /// Reply channel
        reply: oneshot::Sender<Result<RoomView, RoomLensError>>,
    },
    /// Leave a room
    Leave {
        /// Room SID
        room_sid: String,
        /// Replies whether the room was joined
        reply: oneshot::Sender<bool>,
    },
    /// Reconcile a vendor event
    Dispatch {
        /// Room SID
        room_sid: String,
        /// The event
        event: VendorEvent,
    },
    /// Reconcile a vendor event given in its JSON form
    DispatchJson {
        /// Room SID
        room_sid: String,
        /// Raw payload
        payload: String,
    },
    /// Reports fetched by a sampler task
    StatsSampled {
        /// Room SID
        room_sid: String,
        /// Generation the sampler was started with
        generation: u64,
        /// Fetched reports
        reports: Vec<StatsReport>,
    },
    /// Copy a room's state
    Snapshot {
        /// Room SID
        room_sid: String,
        /// Reply channel
        reply: oneshot::Sender<Option<RoomView>>,
    },
    /// List joined rooms
    Rooms {
        /// Reply channel
        reply: oneshot::Sender<Vec<String>>,
    },
    /// Leave every room and stop the loop
    Shutdown {
        /// Acknowledged once every room is torn down
        reply: oneshot::Sender<()>,
    },
}

impl SupervisorCommand {
    /// Short name of the command
    pub fn name(&self) -> &'static str {
        match self {
            SupervisorCommand::Join { .. } => "join",
            SupervisorCommand::Leave { .. } => "leave",
            SupervisorCommand::Dispatch { .. } => "dispatch",
            SupervisorCommand::DispatchJson { .. } => "dispatch_json",
            SupervisorCommand::StatsSampled { .. } => "stats_sampled",
            SupervisorCommand::Snapshot { .. } => "snapshot",
            SupervisorCommand::Rooms { .. } => "rooms",
            SupervisorCommand::Shutdown { .. } => "shutdown",
        }
    }
}

struct ActiveRoom {
    reconciler: EventReconciler,
    sampler: Option<SamplerHandle>,
    generation: u64,
}

impl ActiveRoom {
    fn view(&self) -> RoomView {
        RoomView {
            record: self.reconciler.record().clone(),
            tracks: self.reconciler.registry().iter().cloned().collect(),
            sampler_active: self.sampler.as_ref().is_some_and(SamplerHandle::is_active),
            generation: self.generation,
        }
    }
}

/// Owner of every joined room
pub struct RoomSupervisor {
    rooms: BTreeMap<String, ActiveRoom>,
    observer: Arc<dyn PresentationObserver>,
    commands: mpsc::UnboundedSender<SupervisorCommand>,
    default_interval: Duration,
    next_generation: u64,
}

impl RoomSupervisor {
    /// Create a supervisor and the receiving end of its command channel.
    ///
    /// The supervisor can be driven directly through its methods, or moved
    /// onto a task with [`run`](Self::run).
    pub fn new(
        observer: Arc<dyn PresentationObserver>,
        default_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SupervisorCommand>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let supervisor = Self {
            rooms: BTreeMap::new(),
            observer,
            commands,
            default_interval,
            next_generation: 1,
        };
        (supervisor, receiver)
    }

    /// Spawn the supervisor loop
    pub fn spawn(
        observer: Arc<dyn PresentationObserver>,
        default_interval: Duration,
    ) -> (SupervisorHandle, JoinHandle<()>) {
        let (supervisor, receiver) = Self::new(observer, default_interval);
        let handle = supervisor.handle();
        let task = tokio::spawn(supervisor.run(receiver));
        (handle, task)
    }

    /// Handle sending into this supervisor's command channel
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            commands: self.commands.clone(),
        }
    }

    /// Process commands until shutdown
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SupervisorCommand>) {
        info!("🔄 Room supervisor started");
        while let Some(command) = commands.recv().await {
            if self.handle_command(command).is_break() {
                break;
            }
        }
        self.shutdown();
        info!("Room supervisor stopped");
    }

    /// Process one command
    pub fn handle_command(&mut self, command: SupervisorCommand) -> ControlFlow<()> {
        debug!("Supervisor command: {}", command.name());
        match command {
            SupervisorCommand::Join {
                snapshot,
                config,
                stats_source,
                reply,
            } => {
                let _ = reply.send(self.join(&snapshot, &config, stats_source));
            }
            SupervisorCommand::Leave { room_sid, reply } => {
                let _ = reply.send(self.leave(&room_sid));
            }
            SupervisorCommand::Dispatch { room_sid, event } => {
                if let Err(e) = self.dispatch(&room_sid, event) {
                    debug!("Dropped event: {}", e);
                }
            }
            SupervisorCommand::DispatchJson { room_sid, payload } => {
                if let Err(e) = self.dispatch_json(&room_sid, &payload) {
                    debug!("Dropped event: {}", e);
                }
            }
            SupervisorCommand::StatsSampled {
                room_sid,
                generation,
                reports,
            } => {
                self.apply_stats(&room_sid, generation, &reports);
            }
            SupervisorCommand::Snapshot { room_sid, reply } => {
                let _ = reply.send(self.snapshot(&room_sid));
            }
            SupervisorCommand::Rooms { reply } => {
                let _ = reply.send(self.rooms());
            }
            SupervisorCommand::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Register a room, seed its records and start its sampler
    pub fn join(
        &mut self,
        snapshot: &RoomSnapshot,
        config: &RoomConfig,
        stats_source: Option<Arc<dyn StatsSource>>,
    ) -> Result<RoomView, RoomLensError> {
        if snapshot.sid.trim().is_empty() {
            return Err(RoomLensError::payload("join", "room snapshot without sid"));
        }
        if self.rooms.contains_key(&snapshot.sid) {
            return Err(RoomLensError::RoomAlreadyJoined {
                room_sid: snapshot.sid.clone(),
            });
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        let reconciler = EventReconciler::new(snapshot, self.observer.clone());
        let sampler = match stats_source {
            Some(source) if config.sample_stats => {
                let period = config.stats_interval.unwrap_or(self.default_interval);
                let sampler = StatsSampler::new(period, self.commands.clone());
                Some(sampler.start(&snapshot.sid, generation, source))
            }
            _ => None,
        };

        let room = ActiveRoom {
            reconciler,
            sampler,
            generation,
        };
        let view = room.view();
        info!(
            "Joined room {} as {} ({} tracks, {} participants)",
            snapshot.sid,
            snapshot.local_identity,
            view.track_count(),
            view.participant_count()
        );
        self.rooms.insert(snapshot.sid.clone(), room);
        Ok(view)
    }

    /// Tear a room down. Returns `false` if it was not joined.
    pub fn leave(&mut self, room_sid: &str) -> bool {
        let Some(mut room) = self.rooms.remove(room_sid) else {
            debug!("Room {} already left", room_sid);
            return false;
        };
        if let Some(mut sampler) = room.sampler.take() {
            sampler.cancel();
        }
        room.reconciler.teardown();
        info!("Left room {}", room_sid);
        true
    }

    /// Reconcile an event of a joined room
    pub fn dispatch(&mut self, room_sid: &str, event: VendorEvent) -> Result<Reconciled, RoomLensError> {
        let room = self
            .rooms
            .get_mut(room_sid)
            .ok_or_else(|| RoomLensError::RoomNotFound {
                room_sid: room_sid.to_string(),
            })?;
        let outcome = room.reconciler.reconcile(event);
        if outcome == Reconciled::Disconnected {
            self.leave(room_sid);
        }
        Ok(outcome)
    }

    /// Parse and reconcile a JSON event. Malformed payloads are logged and
    /// dropped.
    pub fn dispatch_json(&mut self, room_sid: &str, payload: &str) -> Result<Reconciled, RoomLensError> {
        if !self.rooms.contains_key(room_sid) {
            return Err(RoomLensError::RoomNotFound {
                room_sid: room_sid.to_string(),
            });
        }
        match VendorEvent::from_json(payload) {
            Ok(event) => self.dispatch(room_sid, event),
            Err(e) => {
                warn!(code = e.error_code(), "Dropped event for room {}: {}", room_sid, e);
                Ok(Reconciled::Dropped)
            }
        }
    }

    /// Apply sampled reports if they belong to the room's current
    /// generation. Returns the number of tracks updated.
    pub fn apply_stats(&mut self, room_sid: &str, generation: u64, reports: &[StatsReport]) -> usize {
        match self.rooms.get_mut(room_sid) {
            Some(room) if room.generation == generation => {
                apply_reports(room.reconciler.registry_mut(), reports)
            }
            Some(_) => {
                debug!("Dropping stats of stale generation {} for room {}", generation, room_sid);
                0
            }
            None => {
                debug!("Dropping stats for departed room {}", room_sid);
                0
            }
        }
    }

    /// Copy a room's state
    pub fn snapshot(&self, room_sid: &str) -> Option<RoomView> {
        self.rooms.get(room_sid).map(ActiveRoom::view)
    }

    /// SIDs of the joined rooms
    pub fn rooms(&self) -> Vec<String> {
        self.rooms.keys().cloned().collect()
    }

    /// Leave every room
    pub fn shutdown(&mut self) {
        for room_sid in self.rooms() {
            self.leave(&room_sid);
        }
    }
}

/// Cloneable sender into the supervisor loop
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    commands: mpsc::UnboundedSender<SupervisorCommand>,
}

impl SupervisorHandle {
    fn send(&self, command: SupervisorCommand) -> Result<(), RoomLensError> {
        self.commands
            .send(command)
            .map_err(|_| RoomLensError::SupervisorClosed)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SupervisorCommand,
    ) -> Result<T, RoomLensError> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply))?;
        response.await.map_err(|_| RoomLensError::SupervisorClosed)
    }

    /// Join a room
    pub async fn join(
        &self,
        snapshot: RoomSnapshot,
        config: RoomConfig,
        stats_source: Option<Arc<dyn StatsSource>>,
    ) -> Result<RoomView, RoomLensError> {
        self.request(|reply| SupervisorCommand::Join {
            snapshot,
            config,
            stats_source,
            reply,
        })
        .await?
    }

    /// Leave a room; `false` if it was not joined
    pub async fn leave(&self, room_sid: &str) -> Result<bool, RoomLensError> {
        self.request(|reply| SupervisorCommand::Leave {
            room_sid: room_sid.to_string(),
            reply,
        })
        .await
    }

    /// Queue a vendor event
    pub fn dispatch(&self, room_sid: &str, event: impl Into<VendorEvent>) -> Result<(), RoomLensError> {
        self.send(SupervisorCommand::Dispatch {
            room_sid: room_sid.to_string(),
            event: event.into(),
        })
    }

    /// Queue a vendor event in its JSON form
    pub fn dispatch_json(&self, room_sid: &str, payload: impl Into<String>) -> Result<(), RoomLensError> {
        self.send(SupervisorCommand::DispatchJson {
            room_sid: room_sid.to_string(),
            payload: payload.into(),
        })
    }

    /// Copy a room's state
    pub async fn snapshot(&self, room_sid: &str) -> Result<Option<RoomView>, RoomLensError> {
        self.request(|reply| SupervisorCommand::Snapshot {
            room_sid: room_sid.to_string(),
            reply,
        })
        .await
    }

    /// SIDs of the joined rooms
    pub async fn rooms(&self) -> Result<Vec<String>, RoomLensError> {
        self.request(|reply| SupervisorCommand::Rooms { reply }).await
    }

    /// Leave every room and stop the loop
    pub async fn shutdown(&self) -> Result<(), RoomLensError> {
        self.request(|reply| SupervisorCommand::Shutdown { reply }).await
    }

    /// Check if the loop has stopped
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
