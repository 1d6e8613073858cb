//! Error types for the token service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Vendor error code returned when a room with the same unique name exists
pub const ROOM_EXISTS: u32 = 53113;

/// Vendor error code returned when room creation is refused
pub const ROOM_CREATE_FAILED: u32 = 53100;

/// Errors of the token service
#[derive(Error, Debug)]
pub enum TokenServiceError {
    /// No credentials are configured for the environment
    #[error("No credentials for environment '{environment}'")]
    UnknownEnvironment {
        /// Requested environment
        environment: String,
    },

    /// Credentials could not be loaded
    #[error("Failed to load credentials: {reason}")]
    Credentials {
        /// Reason for the failure
        reason: String,
    },

    /// A request parameter is missing or malformed
    #[error("Invalid request: {reason}")]
    InvalidRequest {
        /// What was wrong
        reason: String,
    },

    /// Token lifetime outside of the allowed range
    #[error("Invalid token lifetime {ttl_secs}s (allowed 1..={max_secs}s)")]
    InvalidTtl {
        /// Requested lifetime
        ttl_secs: u64,
        /// Upper bound
        max_secs: u64,
    },

    /// Token could not be signed
    #[error("Failed to sign access token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// The vendor REST API rejected a request
    #[error("Vendor error {code:?} (HTTP {status}): {message}")]
    Vendor {
        /// Vendor error code, if one was returned
        code: Option<u32>,
        /// HTTP status of the vendor response
        status: u16,
        /// Vendor message
        message: String,
    },

    /// The vendor REST API could not be reached
    #[error("Vendor request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The HTTP service could not start
    #[error("Failed to start token server on {address}: {source}")]
    ServerStartFailed {
        /// Bind address
        address: std::net::SocketAddr,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl TokenServiceError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            TokenServiceError::UnknownEnvironment { .. } => "UNKNOWN_ENVIRONMENT",
            TokenServiceError::Credentials { .. } => "CREDENTIALS_UNAVAILABLE",
            TokenServiceError::InvalidRequest { .. } => "INVALID_REQUEST",
            TokenServiceError::InvalidTtl { .. } => "INVALID_TTL",
            TokenServiceError::Signing(_) => "TOKEN_SIGNING_FAILED",
            TokenServiceError::Vendor { .. } => "VENDOR_ERROR",
            TokenServiceError::Transport(_) => "VENDOR_UNREACHABLE",
            TokenServiceError::ServerStartFailed { .. } => "SERVER_START_FAILED",
        }
    }

    /// Vendor error code carried by the error
    pub fn vendor_code(&self) -> Option<u32> {
        match self {
            TokenServiceError::Vendor { code, .. } => *code,
            _ => None,
        }
    }

    /// HTTP status reported to clients
    pub fn status(&self) -> StatusCode {
        match self {
            TokenServiceError::UnknownEnvironment { .. } | TokenServiceError::InvalidRequest { .. } => {
                StatusCode::BAD_REQUEST
            }
            TokenServiceError::Vendor { status: 404, .. } => StatusCode::NOT_FOUND,
            TokenServiceError::Vendor { .. } | TokenServiceError::Transport(_) => StatusCode::BAD_GATEWAY,
            TokenServiceError::Credentials { .. }
            | TokenServiceError::InvalidTtl { .. }
            | TokenServiceError::Signing(_)
            | TokenServiceError::ServerStartFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Message
    pub error: String,
    /// Stable error code
    pub code: String,
    /// HTTP status
    pub status: u16,
}

impl IntoResponse for TokenServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Token service error: {}", self);
        }
        let body = Json(ErrorBody {
            error: self.to_string(),
            code: self.error_code().to_string(),
            status: status.as_u16(),
        });
        (status, body).into_response()
    }
}
