//! Vendor access tokens
//!
//! An access token is an HS256 JWT signed with the API signing-key secret.
//! It names the signing key as issuer and the account as subject, and grants
//! video access to one identity, optionally restricted to a single room.

use crate::credentials::VendorCredentials;
use crate::error::TokenServiceError;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// Longest session a participant may spend in a room (4 hours)
pub const MAX_TOKEN_TTL_SECS: u64 = 14_400;

/// Content type the vendor expects in the JWT header
pub const TOKEN_CONTENT_TYPE: &str = "twilio-fpa;v=1";

/// Video capability grant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoGrant {
    /// Room the token is restricted to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

/// Grants section of the claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grants {
    /// Participant identity
    pub identity: String,
    /// Video grant
    pub video: VideoGrant,
}

/// JWT claims of an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Token id, `<signing key sid>-<issued at>`
    pub jti: String,
    /// Signing key SID
    pub iss: String,
    /// Account SID
    pub sub: String,
    /// Issued at, seconds since the epoch
    pub iat: i64,
    /// Expiry, seconds since the epoch
    pub exp: i64,
    /// Granted capabilities
    pub grants: Grants,
}

/// Builder of a signed access token
#[derive(Debug, Clone)]
pub struct AccessToken {
    credentials: VendorCredentials,
    identity: String,
    room: Option<String>,
    ttl_secs: u64,
}

impl AccessToken {
    /// Token for `identity` with the maximum lifetime and no room restriction
    pub fn new(credentials: &VendorCredentials, identity: impl Into<String>) -> Self {
        Self {
            credentials: credentials.clone(),
            identity: identity.into(),
            room: None,
            ttl_secs: MAX_TOKEN_TTL_SECS,
        }
    }

    /// Restrict the grant to a room
    pub fn with_room(mut self, room: Option<String>) -> Self {
        self.room = room.filter(|room| !room.is_empty());
        self
    }

    /// Set the lifetime; zero and anything above [`MAX_TOKEN_TTL_SECS`] are
    /// rejected
    pub fn with_ttl(mut self, ttl_secs: u64) -> Result<Self, TokenServiceError> {
        if ttl_secs == 0 || ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(TokenServiceError::InvalidTtl {
                ttl_secs,
                max_secs: MAX_TOKEN_TTL_SECS,
            });
        }
        self.ttl_secs = ttl_secs;
        Ok(self)
    }

    /// Identity the token is issued to
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Claims of a token issued at `issued_at`
    pub fn claims_at(&self, issued_at: i64) -> AccessTokenClaims {
        AccessTokenClaims {
            jti: format!("{}-{}", self.credentials.signing_key_sid, issued_at),
            iss: self.credentials.signing_key_sid.clone(),
            sub: self.credentials.account_sid.clone(),
            iat: issued_at,
            exp: issued_at + self.ttl_secs as i64,
            grants: Grants {
                identity: self.identity.clone(),
                video: VideoGrant {
                    room: self.room.clone(),
                },
            },
        }
    }

    /// Sign a token issued at `issued_at`
    pub fn to_jwt_at(&self, issued_at: i64) -> Result<String, TokenServiceError> {
        let mut header = Header::new(Algorithm::HS256);
        header.cty = Some(TOKEN_CONTENT_TYPE.to_string());
        let key = EncodingKey::from_secret(self.credentials.signing_key_secret.as_bytes());
        Ok(encode(&header, &self.claims_at(issued_at), &key)?)
    }

    /// Sign a token issued now
    pub fn to_jwt(&self) -> Result<String, TokenServiceError> {
        self.to_jwt_at(chrono::Utc::now().timestamp())
    }
}
