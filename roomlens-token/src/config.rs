//! Token server configuration

use crate::access_token::MAX_TOKEN_TTL_SECS;
use crate::error::TokenServiceError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Token server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenServerConfig {
    /// Address the HTTP service binds to
    pub bind_addr: SocketAddr,
    /// JSON file with the vendor credentials of every environment
    pub credentials_path: PathBuf,
    /// Environment used when a request names none
    pub default_environment: String,
    /// Lifetime of issued tokens in seconds
    pub max_token_ttl: u64,
}

impl TokenServerConfig {
    /// Check the configuration for values the server cannot run with
    pub fn validate(&self) -> Result<(), TokenServiceError> {
        if self.default_environment.trim().is_empty() {
            return Err(TokenServiceError::InvalidRequest {
                reason: "default environment must not be empty".to_string(),
            });
        }
        if self.max_token_ttl == 0 || self.max_token_ttl > MAX_TOKEN_TTL_SECS {
            return Err(TokenServiceError::InvalidTtl {
                ttl_secs: self.max_token_ttl,
                max_secs: MAX_TOKEN_TTL_SECS,
            });
        }
        Ok(())
    }
}

impl Default for TokenServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3002)),
            credentials_path: PathBuf::from("credentials.json"),
            default_environment: "prod".to_string(),
            max_token_ttl: MAX_TOKEN_TTL_SECS,
        }
    }
}
