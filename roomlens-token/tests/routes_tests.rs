//! Route tests for the token service, driven through `tower::ServiceExt::oneshot`
//! against an in-memory room service

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use roomlens_token::access_token::AccessTokenClaims;
use roomlens_token::{
    router, AppState, CreateRoom, CredentialStore, RoomResource, RoomService, TokenServerConfig,
    TokenServiceError, Topology, VendorCredentials, ROOM_CREATE_FAILED, ROOM_EXISTS,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

#[derive(Default)]
struct FakeRooms {
    create_error: Mutex<Option<(Option<u32>, u16)>>,
    created: Mutex<Vec<CreateRoom>>,
    fetched: Mutex<Vec<String>>,
    completed: Mutex<Vec<(String, String)>>,
}

impl FakeRooms {
    fn failing_with(code: u32, status: u16) -> Self {
        let rooms = Self::default();
        *rooms.create_error.lock().unwrap() = Some((Some(code), status));
        rooms
    }

    fn room(sid: &str, name: Option<&str>, status: &str) -> RoomResource {
        RoomResource {
            sid: sid.to_string(),
            unique_name: name.map(str::to_string),
            status: Some(status.to_string()),
            room_type: Some("group".to_string()),
            account_sid: Some("AC123".to_string()),
            max_participants: None,
            date_created: None,
            url: None,
        }
    }
}

#[async_trait]
impl RoomService for FakeRooms {
    async fn create_room(&self, _environment: &str, request: &CreateRoom) -> Result<RoomResource, TokenServiceError> {
        self.created.lock().unwrap().push(request.clone());
        if let Some((code, status)) = *self.create_error.lock().unwrap() {
            return Err(TokenServiceError::Vendor {
                code,
                status,
                message: "refused".to_string(),
            });
        }
        Ok(Self::room("RMcreated", request.unique_name.as_deref(), "in-progress"))
    }

    async fn fetch_room(&self, _environment: &str, room: &str) -> Result<RoomResource, TokenServiceError> {
        self.fetched.lock().unwrap().push(room.to_string());
        Ok(Self::room("RMexisting", Some(room), "in-progress"))
    }

    async fn complete_room(&self, environment: &str, room: &str) -> Result<RoomResource, TokenServiceError> {
        self.completed
            .lock()
            .unwrap()
            .push((environment.to_string(), room.to_string()));
        Ok(Self::room("RMexisting", Some(room), "completed"))
    }
}

fn credentials() -> Arc<CredentialStore> {
    Arc::new(
        CredentialStore::new()
            .with("prod", VendorCredentials::new("AC123", "SK123", "prod-secret"))
            .with("stage", VendorCredentials::new("AC456", "SK456", "stage-secret")),
    )
}

fn app(rooms: Arc<FakeRooms>) -> axum::Router {
    router(AppState::new(credentials(), rooms, TokenServerConfig::default()))
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn claims(token: &Value, secret: &[u8]) -> AccessTokenClaims {
    decode::<AccessTokenClaims>(
        token.as_str().unwrap(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    )
    .unwrap()
    .claims
}

#[tokio::test]
async fn test_token_without_topology() {
    let rooms = Arc::new(FakeRooms::default());
    let (status, body) = get(app(rooms.clone()), "/token?identity=alice&roomName=standup").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identity"], "alice");
    let claims = claims(&body["token"], b"prod-secret");
    assert_eq!(claims.grants.identity, "alice");
    assert_eq!(claims.grants.video.room, None);
    assert_eq!(claims.iss, "SK123");
    assert!(rooms.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_token_generates_identity() {
    let (status, body) = get(app(Arc::new(FakeRooms::default())), "/token").await;

    assert_eq!(status, StatusCode::OK);
    let identity = body["identity"].as_str().unwrap();
    assert!(!identity.is_empty());
    assert_eq!(claims(&body["token"], b"prod-secret").grants.identity, identity);
}

#[tokio::test]
async fn test_token_uses_requested_environment() {
    let (status, body) = get(app(Arc::new(FakeRooms::default())), "/token?identity=bob&environment=stage").await;

    assert_eq!(status, StatusCode::OK);
    let claims = claims(&body["token"], b"stage-secret");
    assert_eq!(claims.sub, "AC456");
}

#[tokio::test]
async fn test_token_with_topology_creates_room() {
    let rooms = Arc::new(FakeRooms::default());
    let (status, body) = get(
        app(rooms.clone()),
        "/token?identity=alice&roomName=standup&topology=group-small&extraRoomOptions=%7B%22MaxParticipants%22%3A4%7D",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sid"], "RMcreated");
    assert_eq!(body["uniqueName"], "standup");
    assert_eq!(body["identity"], "alice");
    assert_eq!(
        claims(&body["token"], b"prod-secret").grants.video.room.as_deref(),
        Some("standup")
    );

    let created = rooms.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].topology, Topology::GroupSmall);
    assert_eq!(created[0].options["MaxParticipants"], 4);
}

#[tokio::test]
async fn test_existing_room_is_fetched() {
    let rooms = Arc::new(FakeRooms::failing_with(ROOM_EXISTS, 400));
    let (status, body) = get(app(rooms.clone()), "/token?identity=alice&roomName=standup&topology=group").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sid"], "RMexisting");
    assert_eq!(*rooms.fetched.lock().unwrap(), vec!["standup".to_string()]);
}

#[tokio::test]
async fn test_refused_room_still_issues_token() {
    let rooms = Arc::new(FakeRooms::failing_with(ROOM_CREATE_FAILED, 400));
    let (status, body) = get(app(rooms), "/token?identity=alice&roomName=standup&topology=go").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identity"], "alice");
    assert!(body["token"].is_string());
    assert!(body.get("sid").is_none());
}

#[tokio::test]
async fn test_vendor_failure_is_reported() {
    let rooms = Arc::new(FakeRooms::failing_with(20003, 401));
    let (status, body) = get(app(rooms), "/token?identity=alice&roomName=standup&topology=group").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "VENDOR_ERROR");
    assert_eq!(body["status"], 502);
}

#[tokio::test]
async fn test_invalid_extra_options_rejected() {
    let rooms = Arc::new(FakeRooms::default());
    let (status, body) = get(
        app(rooms.clone()),
        "/token?roomName=standup&topology=group&extraRoomOptions=not-json",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
    assert!(rooms.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_environment_rejected() {
    let (status, body) = get(app(Arc::new(FakeRooms::default())), "/token?environment=dev").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UNKNOWN_ENVIRONMENT");
}

#[tokio::test]
async fn test_get_or_create_room() {
    let rooms = Arc::new(FakeRooms::default());
    let (status, body) = get(app(rooms.clone()), "/getOrCreateRoom?roomName=standup&topology=peer-to-peer").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sid"], "RMcreated");
    assert!(body["token"].is_string());
    assert_eq!(rooms.created.lock().unwrap()[0].topology, Topology::PeerToPeer);

    let (status, _) = get(app(rooms), "/getOrCreateRoom?roomName=standup").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_complete_room() {
    let rooms = Arc::new(FakeRooms::default());
    let (status, body) = get(app(rooms.clone()), "/completeRoom?roomName=standup&environment=stage").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(
        *rooms.completed.lock().unwrap(),
        vec![("stage".to_string(), "standup".to_string())]
    );

    let (status, body) = get(app(rooms), "/completeRoom").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
}
