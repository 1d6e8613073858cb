//! Room joining and the per-room session API

use crate::event::VendorEvent;
use crate::supervisor::{RoomView, SupervisorHandle};
use crate::{RoomConfig, RoomLens};
use roomlens_core::{RoomLensError, RoomSnapshot, StatsSource, TrackId};
use roomlens_diagnostics::LabeledStat;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[cfg(feature = "token")]
use roomlens_token::TokenClient;

/// Fluent builder for room configuration and joining
pub struct RoomBuilder {
    lens: RoomLens,
    snapshot: RoomSnapshot,
    config: RoomConfig,
    stats_source: Option<Arc<dyn StatsSource>>,
    #[cfg(feature = "token")]
    token_client: Option<TokenClient>,
}

impl fmt::Debug for RoomBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomBuilder")
            .field("room_sid", &self.snapshot.sid)
            .field("config", &self.config)
            .field("has_stats_source", &self.stats_source.is_some())
            .finish()
    }
}

impl RoomBuilder {
    pub(crate) fn new(lens: &RoomLens, snapshot: RoomSnapshot) -> Self {
        Self {
            lens: lens.clone(),
            snapshot,
            config: RoomConfig::default(),
            stats_source: None,
            #[cfg(feature = "token")]
            token_client: None,
        }
    }

    /// Poll `source` for the room's aggregate statistics
    pub fn stats_source(mut self, source: Arc<dyn StatsSource>) -> Self {
        self.stats_source = Some(source);
        self
    }

    /// Override the global polling period
    pub fn stats_interval(mut self, period: Duration) -> Self {
        self.config.stats_interval = Some(period);
        self
    }

    /// Do not poll statistics for this room
    pub fn without_stats(mut self) -> Self {
        self.config.sample_stats = false;
        self
    }

    /// Fetch an access token from the token service before joining
    #[cfg(feature = "token")]
    pub fn credentials(mut self, client: TokenClient) -> Self {
        self.token_client = Some(client);
        self
    }

    /// Join the room with current configuration
    pub async fn join(self) -> Result<RoomSession, RoomLensError> {
        if self.config.sample_stats && self.stats_source.is_none() {
            return Err(RoomLensError::MissingConfiguration {
                field: "stats_source".to_string(),
            });
        }

        #[cfg(feature = "token")]
        let access_token = match &self.token_client {
            Some(client) => Some(fetch_token(client, &self.snapshot).await?),
            None => None,
        };
        #[cfg(not(feature = "token"))]
        let access_token = None;

        let supervisor = self.lens.supervisor().clone();
        let view = supervisor
            .join(self.snapshot.clone(), self.config, self.stats_source)
            .await?;
        info!(
            "Session open for {} ({} tracks)",
            view.record.sid,
            view.track_count()
        );

        Ok(RoomSession {
            lens: self.lens,
            sid: self.snapshot.sid,
            local_identity: self.snapshot.local_identity,
            access_token,
        })
    }
}

#[cfg(feature = "token")]
async fn fetch_token(client: &TokenClient, snapshot: &RoomSnapshot) -> Result<String, RoomLensError> {
    let mut request = client.request().clone();
    if request.identity.is_none() {
        request.identity = Some(snapshot.local_identity.clone());
    }
    if request.room_name.is_none() {
        request.room_name = snapshot.name.clone();
    }
    let response = client.fetch_token(&request).await?;
    Ok(response.token)
}

/// A joined room
#[derive(Debug)]
pub struct RoomSession {
    lens: RoomLens,
    sid: String,
    local_identity: String,
    access_token: Option<String>,
}

impl RoomSession {
    /// Room SID
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// Identity of the local participant
    pub fn local_identity(&self) -> &str {
        &self.local_identity
    }

    /// Access token fetched before joining
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Forward a vendor event into the room
    pub fn dispatch(&self, event: impl Into<VendorEvent>) -> Result<(), RoomLensError> {
        self.supervisor().dispatch(&self.sid, event)
    }

    /// Forward a vendor event in its JSON form
    pub fn dispatch_json(&self, payload: impl Into<String>) -> Result<(), RoomLensError> {
        self.supervisor().dispatch_json(&self.sid, payload)
    }

    /// Current state of the room
    pub async fn view(&self) -> Result<RoomView, RoomLensError> {
        self.supervisor()
            .snapshot(&self.sid)
            .await?
            .ok_or_else(|| RoomLensError::RoomNotFound {
                room_sid: self.sid.clone(),
            })
    }

    /// Labeled stats last rendered for a track of this room
    pub fn track_details(&self, id: &TrackId) -> Option<Vec<LabeledStat>> {
        self.lens.rendering().details(&self.sid, id)
    }

    /// Room header and remote participant states last rendered
    pub fn room_details(&self) -> Option<Vec<LabeledStat>> {
        self.lens.rendering().room_details(&self.sid)
    }

    /// Render a track that was not attached automatically. Returns `false`
    /// if no such track is registered in this room.
    pub fn attach(&self, id: &TrackId) -> bool {
        self.lens.rendering().attach(&self.sid, id)
    }

    /// Stop rendering a track
    pub fn detach(&self, id: &TrackId) {
        self.lens.rendering().detach(&self.sid, id);
    }

    /// Leave the room. Returns `false` if it was already torn down, e.g.
    /// by a vendor disconnect.
    pub async fn leave(self) -> Result<bool, RoomLensError> {
        self.supervisor().leave(&self.sid).await
    }

    fn supervisor(&self) -> &SupervisorHandle {
        self.lens.supervisor()
    }
}
