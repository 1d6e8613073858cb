//! HTTP routes of the token service
//!
//! - `GET /token` issues an access token, ensuring the room first when a
//!   topology is given
//! - `GET /getOrCreateRoom` ensures a room and returns it with a token
//! - `GET /completeRoom` marks a room completed

use crate::access_token::AccessToken;
use crate::config::TokenServerConfig;
use crate::credentials::CredentialStore;
use crate::error::{TokenServiceError, ROOM_CREATE_FAILED};
use crate::identity::random_identity;
use crate::rooms::{get_or_create_room, parse_room_options, CreateRoom, RestRoomService, RoomResource, RoomService};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Vendor credentials per environment
    pub credentials: Arc<CredentialStore>,
    /// Vendor room operations
    pub rooms: Arc<dyn RoomService>,
    /// Server configuration
    pub config: Arc<TokenServerConfig>,
}

impl AppState {
    /// Create handler state
    pub fn new(credentials: Arc<CredentialStore>, rooms: Arc<dyn RoomService>, config: TokenServerConfig) -> Self {
        Self {
            credentials,
            rooms,
            config: Arc::new(config),
        }
    }

    fn environment(&self, requested: Option<String>) -> String {
        non_empty(requested).unwrap_or_else(|| self.config.default_environment.clone())
    }

    fn issue_token(&self, environment: &str, identity: &str, room: Option<String>) -> Result<String, TokenServiceError> {
        let credentials = self.credentials.get(environment)?;
        AccessToken::new(credentials, identity)
            .with_room(room)
            .with_ttl(self.config.max_token_ttl)?
            .to_jwt()
    }
}

/// Query of `GET /token`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenQuery {
    /// Participant identity; a random one is generated when absent
    pub identity: Option<String>,
    /// Vendor environment
    pub environment: Option<String>,
    /// Topology of the room to ensure
    pub topology: Option<String>,
    /// Room to restrict the token to
    pub room_name: Option<String>,
    /// JSON object of extra room options
    pub extra_room_options: Option<String>,
}

/// Query of `GET /getOrCreateRoom`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomQuery {
    /// Unique room name
    pub room_name: Option<String>,
    /// Room topology
    pub topology: Option<String>,
    /// Vendor environment
    pub environment: Option<String>,
    /// JSON object of extra room options
    pub extra_room_options: Option<String>,
}

/// Query of `GET /completeRoom`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRoomQuery {
    /// Room SID or unique name
    pub room_name: Option<String>,
    /// Vendor environment
    pub environment: Option<String>,
}

/// Build the router with permissive CORS and request tracing
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/token", get(token))
        .route("/getOrCreateRoom", get(get_or_create))
        .route("/completeRoom", get(complete))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn create_request(
    room_name: Option<String>,
    topology: &str,
    extra_room_options: Option<&str>,
) -> Result<CreateRoom, TokenServiceError> {
    let mut request = CreateRoom::new(room_name, topology.parse()?);
    request.options = parse_room_options(extra_room_options)?;
    Ok(request)
}

fn room_with_token(room: &RoomResource, identity: &str, token: String) -> Result<Value, TokenServiceError> {
    let mut body = serde_json::to_value(room).map_err(|e| TokenServiceError::InvalidRequest {
        reason: format!("unserializable room: {}", e),
    })?;
    if let Value::Object(fields) = &mut body {
        fields.insert("token".to_string(), Value::String(token));
        fields.insert("identity".to_string(), Value::String(identity.to_string()));
    }
    Ok(body)
}

async fn token(State(state): State<AppState>, Query(query): Query<TokenQuery>) -> Result<Json<Value>, TokenServiceError> {
    let environment = state.environment(query.environment);
    let identity = non_empty(query.identity).unwrap_or_else(random_identity);
    let room_name = non_empty(query.room_name);
    debug!("Token requested for {} in {}", identity, environment);

    let Some(topology) = non_empty(query.topology) else {
        let token = state.issue_token(&environment, &identity, None)?;
        return Ok(Json(json!({ "identity": identity, "token": token })));
    };

    let request = create_request(room_name.clone(), &topology, query.extra_room_options.as_deref())?;
    match get_or_create_room(state.rooms.as_ref(), &environment, &request).await {
        Ok(room) => {
            let token = state.issue_token(&environment, &identity, room_name)?;
            Ok(Json(room_with_token(&room, &identity, token)?))
        }
        Err(e) if e.vendor_code() == Some(ROOM_CREATE_FAILED) => {
            warn!("Room creation refused, issuing token anyway: {}", e);
            let token = state.issue_token(&environment, &identity, room_name)?;
            Ok(Json(json!({ "identity": identity, "token": token })))
        }
        Err(e) => Err(e),
    }
}

async fn get_or_create(
    State(state): State<AppState>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<Value>, TokenServiceError> {
    let environment = state.environment(query.environment);
    let room_name = non_empty(query.room_name);
    let topology = non_empty(query.topology).ok_or_else(|| TokenServiceError::InvalidRequest {
        reason: "topology is required".to_string(),
    })?;

    let request = create_request(room_name.clone(), &topology, query.extra_room_options.as_deref())?;
    let room = get_or_create_room(state.rooms.as_ref(), &environment, &request).await?;
    let identity = random_identity();
    let token = state.issue_token(&environment, &identity, room_name)?;
    Ok(Json(room_with_token(&room, &identity, token)?))
}

async fn complete(
    State(state): State<AppState>,
    Query(query): Query<CompleteRoomQuery>,
) -> Result<Json<RoomResource>, TokenServiceError> {
    let environment = state.environment(query.environment);
    let room_name = non_empty(query.room_name).ok_or_else(|| TokenServiceError::InvalidRequest {
        reason: "roomName is required".to_string(),
    })?;
    Ok(Json(state.rooms.complete_room(&environment, &room_name).await?))
}

/// Token service bound to a TCP address
#[derive(Clone)]
pub struct TokenServer {
    state: AppState,
}

impl TokenServer {
    /// Load the credentials file named by `config` and use the vendor REST API
    pub fn new(config: TokenServerConfig) -> Result<Self, TokenServiceError> {
        config.validate()?;
        let credentials = Arc::new(CredentialStore::load(&config.credentials_path)?);
        info!("Loaded credentials for {:?}", credentials.environments());
        let rooms = Arc::new(RestRoomService::new(credentials.clone()));
        Ok(Self::with_state(AppState::new(credentials, rooms, config)))
    }

    /// Serve prepared handler state
    pub fn with_state(state: AppState) -> Self {
        Self { state }
    }

    /// Handler state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Bind the configured address and serve until the process ends
    pub async fn serve(&self) -> Result<(), TokenServiceError> {
        let listener = self.bind().await?;
        self.serve_on(listener, std::future::pending()).await
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener, TokenServiceError> {
        let address = self.state.config.bind_addr;
        TcpListener::bind(address)
            .await
            .map_err(|source| TokenServiceError::ServerStartFailed { address, source })
    }

    /// Serve on an already bound listener until `shutdown` completes
    pub async fn serve_on<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), TokenServiceError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = listener
            .local_addr()
            .unwrap_or(self.state.config.bind_addr);
        info!("Token server listening on {}", address);
        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| TokenServiceError::ServerStartFailed { address, source })?;
        info!("Token server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("room".to_string())).as_deref(), Some("room"));
    }

    #[test]
    fn test_room_with_token_merges_fields() {
        let room = RoomResource {
            sid: "RM1".to_string(),
            unique_name: Some("standup".to_string()),
            status: Some("in-progress".to_string()),
            room_type: Some("group".to_string()),
            account_sid: None,
            max_participants: None,
            date_created: None,
            url: None,
        };
        let body = room_with_token(&room, "alice", "jwt".to_string()).unwrap();
        assert_eq!(body["sid"], "RM1");
        assert_eq!(body["uniqueName"], "standup");
        assert_eq!(body["token"], "jwt");
        assert_eq!(body["identity"], "alice");
    }

    #[test]
    fn test_create_request_rejects_bad_input() {
        assert!(create_request(None, "mesh", None).is_err());
        assert!(create_request(None, "group", Some("nope")).is_err());
        let request = create_request(Some("r".to_string()), "go", Some(r#"{"MaxParticipants": 2}"#)).unwrap();
        assert_eq!(request.options["MaxParticipants"], 2);
    }
}
