//! Client side of the token service
//!
//! Used before joining a room. Every failure surfaces as
//! [`RoomLensError::CredentialIssuance`] so the caller can report the
//! inability to join without inspecting transport details.

use crate::error::ErrorBody;
use crate::rooms::Topology;
use roomlens_core::RoomLensError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Parameters of a token request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    /// Participant identity; the service picks one when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Room to restrict the token to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
    /// Vendor environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Ensure the room with this topology before issuing the token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology: Option<Topology>,
}

impl TokenRequest {
    /// Request a token for `identity`
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            ..Default::default()
        }
    }

    /// Restrict the token to a room
    pub fn room(mut self, room_name: impl Into<String>) -> Self {
        self.room_name = Some(room_name.into());
        self
    }

    /// Select the vendor environment
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Ensure the room exists with `topology`
    pub fn topology(mut self, topology: Topology) -> Self {
        self.topology = Some(topology);
        self
    }
}

/// Token issued by the service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Identity the token was issued to
    pub identity: String,
    /// Signed access token
    pub token: String,
    /// SID of the ensured room
    #[serde(default)]
    pub sid: Option<String>,
    /// Unique name of the ensured room
    #[serde(default)]
    pub unique_name: Option<String>,
    /// Status of the ensured room
    #[serde(default)]
    pub status: Option<String>,
}

/// HTTP client of the token service
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    base_url: String,
    request: TokenRequest,
}

impl TokenClient {
    /// Client of the service at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request: TokenRequest::default(),
        }
    }

    /// Default request sent by [`TokenClient::fetch`]
    pub fn with_request(mut self, request: TokenRequest) -> Self {
        self.request = request;
        self
    }

    /// Default request
    pub fn request(&self) -> &TokenRequest {
        &self.request
    }

    /// Fetch a token using the default request
    pub async fn fetch(&self) -> Result<TokenResponse, RoomLensError> {
        self.fetch_token(&self.request).await
    }

    /// Fetch a token from `GET /token`
    pub async fn fetch_token(&self, request: &TokenRequest) -> Result<TokenResponse, RoomLensError> {
        let url = format!("{}/token", self.base_url);
        debug!("Fetching token from {}", url);

        let response = self
            .http
            .get(&url)
            .query(request)
            .send()
            .await
            .map_err(|e| issuance_failed(format!("token service unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let reason = match response.json::<ErrorBody>().await {
                Ok(body) => format!("{} ({})", body.error, body.code),
                Err(_) => format!("token service returned HTTP {}", status.as_u16()),
            };
            return Err(issuance_failed(reason));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| issuance_failed(format!("malformed token response: {}", e)))
    }
}

fn issuance_failed(reason: String) -> RoomLensError {
    warn!("Credential issuance failed: {}", reason);
    RoomLensError::CredentialIssuance { reason }
}
