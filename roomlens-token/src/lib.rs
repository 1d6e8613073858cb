//! # RoomLens Token
//!
//! Credential-issuing HTTP service for RoomLens.
//! Mints short-lived vendor access tokens, creates and completes rooms through
//! the vendor REST API, and provides the client used to fetch tokens before
//! joining a room.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod access_token;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod rooms;
pub mod server;

// Re-export main types
pub use access_token::{AccessToken, MAX_TOKEN_TTL_SECS};
pub use client::{TokenClient, TokenRequest, TokenResponse};
pub use config::TokenServerConfig;
pub use credentials::{CredentialStore, VendorCredentials};
pub use error::{ErrorBody, TokenServiceError, ROOM_CREATE_FAILED, ROOM_EXISTS};
pub use identity::random_identity;
pub use rooms::{get_or_create_room, parse_room_options, CreateRoom, RestRoomService, RoomResource, RoomService, Topology};
pub use server::{router, AppState, TokenServer};
