//! # RoomLens - Track Lifecycle and Live Statistics for Video Rooms
//!
//! RoomLens mirrors the state of hosted video rooms: every local and remote
//! track, every remote participant, and the byte rate each track is sending
//! or receiving. The vendor SDK stays the source of truth; RoomLens consumes
//! its events and periodic statistics and keeps typed records in sync.
//!
//! ## Key Features
//!
//! - **Track registry**: one record per track, keyed by its vendor id
//! - **Event reconciliation**: vendor events mutate records on a single task
//! - **Stats sampling**: per-room polling with byte-rate computation
//! - **Presentation hooks**: observers for rendering and activity logging
//! - **Token service**: access tokens and room provisioning (`token` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomlens::{RoomLens, RoomSnapshot, TrackKind, TrackSnapshot};
//! # use std::sync::Arc;
//!
//! # async fn example(source: Arc<dyn roomlens::StatsSource>) -> Result<(), roomlens::RoomLensError> {
//! let lens = RoomLens::init()?;
//!
//! let snapshot = RoomSnapshot::new("RM123", "alice")
//!     .with_local_track(TrackSnapshot::new("MT1", TrackKind::Audio).started("mic"));
//!
//! let room = lens.room(snapshot).stats_source(source).join().await?;
//! let view = room.view().await?;
//! println!("{} tracks", view.track_count());
//!
//! room.leave().await?;
//! lens.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use roomlens_core::{
    compute_byte_rate, round_to_tenth, ByteSample, ConnectionState, LifecycleState, ParticipantRecord,
    ParticipantSnapshot, ReadyState, RoomLensError, RoomRecord, RoomSnapshot, SettingValue, StatsReport,
    StatsSource, SwitchOffState, TrackChange, TrackId, TrackKind, TrackObserver, TrackOrigin, TrackRecord,
    TrackRegistry, TrackSettings, TrackSnapshot, TrackStatSample,
};

pub use roomlens_diagnostics::{
    ActivityEntry, ActivityLog, DebugLogger, Highlight, LabeledStat, TrackDetailsView,
};

#[cfg(feature = "token")]
pub use roomlens_token::{TokenClient, TokenRequest, TokenResponse, Topology};

// Public API modules
pub mod config;
pub mod event;
pub mod presentation;
pub mod reconciler;
pub mod room;
pub mod sampler;
pub mod supervisor;

// Re-export main API types
pub use config::{GlobalConfig, RoomConfig};
pub use event::{ParticipantEvent, RoomEvent, TrackEvent, VendorEvent};
pub use presentation::{
    NoopObserver, ObserverSet, ParticipantChange, PresentationObserver, RenderingObserver,
};
pub use reconciler::{EventReconciler, Reconciled};
pub use room::{RoomBuilder, RoomSession};
pub use sampler::{SamplerHandle, StatsSampler, DEFAULT_STATS_INTERVAL};
pub use supervisor::{RoomSupervisor, RoomView, SupervisorCommand, SupervisorHandle};

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Main entry point for RoomLens
#[derive(Debug, Clone)]
pub struct RoomLens {
    inner: Arc<RoomLensInner>,
}

struct RoomLensInner {
    config: GlobalConfig,
    rendering: Arc<RenderingObserver>,
    supervisor: SupervisorHandle,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for RoomLensInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomLensInner")
            .field("config", &self.config)
            .field("rendered_tracks", &self.rendering.rendered_tracks())
            .field("supervisor", &self.supervisor)
            .finish()
    }
}

impl Drop for RoomLensInner {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

impl RoomLens {
    /// Initialize RoomLens with default settings.
    ///
    /// Must be called from within a Tokio runtime; the supervisor loop is
    /// spawned onto it.
    ///
    /// # Example
    /// ```rust,no_run
    /// use roomlens::RoomLens;
    ///
    /// # async fn example() -> Result<(), roomlens::RoomLensError> {
    /// let lens = RoomLens::init()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn init() -> Result<Self, RoomLensError> {
        Self::init_with(GlobalConfig::default())
    }

    /// Initialize with custom global configuration
    pub fn init_with(config: GlobalConfig) -> Result<Self, RoomLensError> {
        Self::init_with_observer(config, Arc::new(NoopObserver))
    }

    /// Initialize with an additional presentation observer, notified after
    /// the built-in renderer
    pub fn init_with_observer(
        config: GlobalConfig,
        observer: Arc<dyn PresentationObserver>,
    ) -> Result<Self, RoomLensError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| RoomLensError::Initialization {
            reason: format!("No async runtime available: {}", e),
        })?;

        let activity = ActivityLog::new(config.activity_log_capacity);
        let rendering = Arc::new(RenderingObserver::new(
            activity,
            config.excluded_settings.clone(),
            config.auto_attach,
        ));
        let observers = ObserverSet::new().with(rendering.clone()).with(observer);

        let (supervisor, commands) = RoomSupervisor::new(Arc::new(observers), config.stats_interval);
        let handle = supervisor.handle();
        let task = runtime.spawn(supervisor.run(commands));

        Ok(Self {
            inner: Arc::new(RoomLensInner {
                config,
                rendering,
                supervisor: handle,
                task: Mutex::new(Some(task)),
            }),
        })
    }

    /// Global configuration
    pub fn config(&self) -> &GlobalConfig {
        &self.inner.config
    }

    /// Activity log written by the built-in renderer
    pub fn activity_log(&self) -> &ActivityLog {
        self.inner.rendering.activity_log()
    }

    /// Built-in renderer
    pub fn rendering(&self) -> &RenderingObserver {
        &self.inner.rendering
    }

    /// Handle of the supervisor loop
    pub fn supervisor(&self) -> &SupervisorHandle {
        &self.inner.supervisor
    }

    /// Create a room builder for a connected vendor room
    ///
    /// # Example
    /// ```rust,no_run
    /// use roomlens::{RoomLens, RoomSnapshot};
    ///
    /// # async fn example() -> Result<(), roomlens::RoomLensError> {
    /// let lens = RoomLens::init()?;
    /// let room = lens
    ///     .room(RoomSnapshot::new("RM123", "alice"))
    ///     .without_stats()
    ///     .join()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn room(&self, snapshot: RoomSnapshot) -> RoomBuilder {
        RoomBuilder::new(self, snapshot)
    }

    /// SIDs of the joined rooms
    pub async fn rooms(&self) -> Result<Vec<String>, RoomLensError> {
        self.inner.supervisor.rooms().await
    }

    /// Leave every room and stop the supervisor loop
    pub async fn shutdown(&self) -> Result<(), RoomLensError> {
        if self.inner.supervisor.is_closed() {
            return Ok(());
        }
        self.inner.supervisor.shutdown().await?;
        let task = self.inner.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        Ok(())
    }
}
