//! Vendor account credentials, keyed by environment
//!
//! The credentials file maps an environment name to one account:
//!
//! ```json
//! {
//!   "prod": {
//!     "accountSid": "AC...",
//!     "signingKeySid": "SK...",
//!     "signingKeySecret": "...",
//!     "authToken": "..."
//!   }
//! }
//! ```

use crate::error::TokenServiceError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Credentials of one vendor account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorCredentials {
    /// Account SID
    pub account_sid: String,
    /// API signing key SID
    pub signing_key_sid: String,
    /// API signing key secret
    pub signing_key_secret: String,
    /// Account auth token
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl VendorCredentials {
    /// Create credentials without auth token
    pub fn new(
        account_sid: impl Into<String>,
        signing_key_sid: impl Into<String>,
        signing_key_secret: impl Into<String>,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            signing_key_sid: signing_key_sid.into(),
            signing_key_secret: signing_key_secret.into(),
            auth_token: None,
        }
    }
}

impl fmt::Debug for VendorCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorCredentials")
            .field("account_sid", &self.account_sid)
            .field("signing_key_sid", &self.signing_key_sid)
            .field("signing_key_secret", &"<redacted>")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Credentials of every configured environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialStore {
    environments: BTreeMap<String, VendorCredentials>,
}

impl CredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the JSON credentials document
    pub fn from_json(json: &str) -> Result<Self, TokenServiceError> {
        serde_json::from_str(json).map_err(|e| TokenServiceError::Credentials {
            reason: e.to_string(),
        })
    }

    /// Read and parse a credentials file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TokenServiceError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| TokenServiceError::Credentials {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::from_json(&json)
    }

    /// Add or replace the credentials of an environment
    pub fn with(mut self, environment: impl Into<String>, credentials: VendorCredentials) -> Self {
        self.environments.insert(environment.into(), credentials);
        self
    }

    /// Credentials of an environment
    pub fn get(&self, environment: &str) -> Result<&VendorCredentials, TokenServiceError> {
        self.environments
            .get(environment)
            .ok_or_else(|| TokenServiceError::UnknownEnvironment {
                environment: environment.to_string(),
            })
    }

    /// Configured environment names
    pub fn environments(&self) -> Vec<&str> {
        self.environments.keys().map(String::as_str).collect()
    }

    /// Check if no environment is configured
    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}
