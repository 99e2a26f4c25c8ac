//! Token-exchange results from the identity provider.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Raw body of a successful token-endpoint response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_expires_in() -> u64 {
    900
}

fn default_token_type() -> String {
    "Bearer".to_owned()
}

/// Materialized result of a token exchange. Immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    pub token_type: String,
    pub scope: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TokenInfo {
    pub fn from_response(response: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        let expires_at = issued_at + Duration::seconds(response.expires_in as i64);
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
            token_type: response.token_type,
            scope: response.scope,
            issued_at,
            expires_at,
        }
    }

    /// The wire form of this token info, for re-emission to callers.
    pub fn to_response(&self) -> TokenResponse {
        TokenResponse {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_in: self.expires_in,
            token_type: self.token_type.clone(),
            scope: self.scope.clone(),
        }
    }
}
