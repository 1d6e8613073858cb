//! Vendor room provisioning
//!
//! Rooms are created, fetched and completed through the vendor REST API,
//! authenticated with the signing key of the requested environment.

use crate::credentials::{CredentialStore, VendorCredentials};
use crate::error::{TokenServiceError, ROOM_EXISTS};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Room topology offered by the vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    /// Routed group room
    Group,
    /// Routed group room for up to four participants
    GroupSmall,
    /// Peer-to-peer room
    PeerToPeer,
    /// Go room
    Go,
}

impl Topology {
    /// Vendor name of the topology
    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::Group => "group",
            Topology::GroupSmall => "group-small",
            Topology::PeerToPeer => "peer-to-peer",
            Topology::Go => "go",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topology {
    type Err = TokenServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "group" => Ok(Topology::Group),
            "group-small" => Ok(Topology::GroupSmall),
            "peer-to-peer" => Ok(Topology::PeerToPeer),
            "go" => Ok(Topology::Go),
            other => Err(TokenServiceError::InvalidRequest {
                reason: format!("unknown topology '{}'", other),
            }),
        }
    }
}

/// A vendor room as returned by the REST API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomResource {
    /// Room SID
    pub sid: String,
    /// Unique room name
    #[serde(default, alias = "unique_name")]
    pub unique_name: Option<String>,
    /// Room status, e.g. `in-progress` or `completed`
    #[serde(default)]
    pub status: Option<String>,
    /// Room topology
    #[serde(default, rename = "type")]
    pub room_type: Option<String>,
    /// Owning account
    #[serde(default, alias = "account_sid")]
    pub account_sid: Option<String>,
    /// Participant limit
    #[serde(default, alias = "max_participants")]
    pub max_participants: Option<u32>,
    /// Creation time
    #[serde(default, alias = "date_created")]
    pub date_created: Option<String>,
    /// Resource URL
    #[serde(default)]
    pub url: Option<String>,
}

/// Parameters of a room creation
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRoom {
    /// Unique name of the room
    pub unique_name: Option<String>,
    /// Requested topology
    pub topology: Topology,
    /// Additional vendor room options, merged into the request
    pub options: Map<String, Value>,
}

impl CreateRoom {
    /// Create parameters without extra options
    pub fn new(unique_name: Option<String>, topology: Topology) -> Self {
        Self {
            unique_name,
            topology,
            options: Map::new(),
        }
    }

    /// Form fields sent to the vendor. Extra options override the defaults
    /// and arrays become repeated fields.
    pub fn form(&self) -> Vec<(String, String)> {
        let mut fields: Vec<(String, String)> = vec![("Type".to_string(), self.topology.to_string())];
        if let Some(name) = &self.unique_name {
            fields.push(("UniqueName".to_string(), name.clone()));
        }
        for (key, value) in &self.options {
            fields.retain(|(existing, _)| existing != key);
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    fields.extend(items.iter().map(|item| (key.clone(), form_value(item))));
                }
                other => fields.push((key.clone(), form_value(other))),
            }
        }
        fields
    }
}

fn form_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Parse the `extraRoomOptions` query parameter, which must be a JSON object
pub fn parse_room_options(raw: Option<&str>) -> Result<Map<String, Value>, TokenServiceError> {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(options)) => Ok(options),
        Ok(_) => Err(TokenServiceError::InvalidRequest {
            reason: "extraRoomOptions must be a JSON object".to_string(),
        }),
        Err(e) => Err(TokenServiceError::InvalidRequest {
            reason: format!("extraRoomOptions is not valid JSON: {}", e),
        }),
    }
}

/// Room operations of the vendor REST API
#[async_trait]
pub trait RoomService: Send + Sync {
    /// Create a room
    async fn create_room(&self, environment: &str, request: &CreateRoom) -> Result<RoomResource, TokenServiceError>;

    /// Fetch a room by SID or unique name
    async fn fetch_room(&self, environment: &str, room: &str) -> Result<RoomResource, TokenServiceError>;

    /// Mark a room completed, disconnecting every participant
    async fn complete_room(&self, environment: &str, room: &str) -> Result<RoomResource, TokenServiceError>;
}

/// Create a room, or fetch it if a room with the same unique name is
/// already in progress
pub async fn get_or_create_room(
    service: &dyn RoomService,
    environment: &str,
    request: &CreateRoom,
) -> Result<RoomResource, TokenServiceError> {
    match service.create_room(environment, request).await {
        Ok(room) => Ok(room),
        Err(e) if e.vendor_code() == Some(ROOM_EXISTS) => match &request.unique_name {
            Some(name) => {
                debug!("Room {} already exists, fetching it", name);
                service.fetch_room(environment, name).await
            }
            None => Err(e),
        },
        Err(e) => Err(e),
    }
}

/// Base URL of the vendor REST API for an environment
pub fn rest_base_url(environment: &str) -> String {
    if environment == "prod" {
        "https://video.twilio.com".to_string()
    } else {
        format!("https://video.{}.twilio.com", environment)
    }
}

#[derive(Debug, Deserialize)]
struct VendorErrorBody {
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    message: Option<String>,
}

/// [`RoomService`] over the vendor REST API
#[derive(Debug, Clone)]
pub struct RestRoomService {
    http: reqwest::Client,
    credentials: Arc<CredentialStore>,
    base_url: Option<String>,
}

impl RestRoomService {
    /// Service using the public vendor endpoints
    pub fn new(credentials: Arc<CredentialStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            base_url: None,
        }
    }

    /// Send every request to `base_url` regardless of environment
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    fn rooms_url(&self, environment: &str) -> String {
        let base = self
            .base_url
            .clone()
            .unwrap_or_else(|| rest_base_url(environment));
        format!("{}/v1/Rooms", base)
    }

    /// Rooms URL with `room` appended as a single escaped path segment
    fn room_url(&self, environment: &str, room: &str) -> Result<reqwest::Url, TokenServiceError> {
        let invalid = |reason: String| TokenServiceError::InvalidRequest { reason };
        let mut url = reqwest::Url::parse(&self.rooms_url(environment))
            .map_err(|e| invalid(format!("invalid vendor URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| invalid("vendor URL cannot take a room name".to_string()))?
            .push(room);
        Ok(url)
    }

    fn account(&self, environment: &str) -> Result<&VendorCredentials, TokenServiceError> {
        self.credentials.get(environment)
    }

    async fn read_room(response: reqwest::Response) -> Result<RoomResource, TokenServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body = response.text().await.unwrap_or_default();
        let vendor = serde_json::from_str::<VendorErrorBody>(&body).ok();
        let code = vendor.as_ref().and_then(|error| error.code);
        let message = vendor.and_then(|error| error.message).unwrap_or(body);
        Err(TokenServiceError::Vendor {
            code,
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RoomService for RestRoomService {
    async fn create_room(&self, environment: &str, request: &CreateRoom) -> Result<RoomResource, TokenServiceError> {
        let account = self.account(environment)?;
        info!(
            "Creating {} room {:?} for account {}",
            request.topology, request.unique_name, account.account_sid
        );
        let response = self
            .http
            .post(self.rooms_url(environment))
            .basic_auth(&account.signing_key_sid, Some(&account.signing_key_secret))
            .form(&request.form())
            .send()
            .await?;
        Self::read_room(response).await
    }

    async fn fetch_room(&self, environment: &str, room: &str) -> Result<RoomResource, TokenServiceError> {
        let account = self.account(environment)?;
        let response = self
            .http
            .get(self.room_url(environment, room)?)
            .basic_auth(&account.signing_key_sid, Some(&account.signing_key_secret))
            .send()
            .await?;
        Self::read_room(response).await
    }

    async fn complete_room(&self, environment: &str, room: &str) -> Result<RoomResource, TokenServiceError> {
        let account = self.account(environment)?;
        info!("Completing room {} in {}", room, environment);
        let response = self
            .http
            .post(self.room_url(environment, room)?)
            .basic_auth(&account.signing_key_sid, Some(&account.signing_key_secret))
            .form(&[("Status", "completed")])
            .send()
            .await?;
        Self::read_room(response).await
    }
}
