//! Validated JWT claims and the normalized user record derived from them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Roles granting administrative access.
pub const ADMIN_ROLES: &[&str] = &["super-admin", "makerspace-admin", "admin"];

/// Claims payload of a validated access token.
///
/// # Fields
///
/// | Field | JWT claim | Meaning |
/// |-------|-----------|---------|
/// | `sub` | `sub` | subject (user id) |
/// | `iat` / `exp` / `nbf` | standard | seconds since epoch |
/// | `iss` / `aud` | standard | issuer and audience(s) |
/// | `realm_access.roles` | provider | realm role names |
/// | `makerspace_id` | custom | tenant the user belongs to |
///
/// Claims the gateway does not recognize are preserved in `extra` so
/// downstream services can read provider-specific additions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: Audience,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realm_access: Option<RealmAccess>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub makerspace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// The `aud` claim: a single audience or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::One(aud) => aud == audience,
            Self::Many(auds) => auds.iter().any(|a| a == audience),
        }
    }
}

impl JwtClaims {
    pub fn roles(&self) -> &[String] {
        self.realm_access
            .as_ref()
            .map(|ra| ra.roles.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles().iter().any(|r| r == role)
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_any_role(ADMIN_ROLES)
    }

    /// Normalized user record for downstream handlers.
    pub fn user_info(&self) -> UserInfo {
        UserInfo {
            id: self.sub.clone(),
            keycloak_id: self.sub.clone(),
            email: self.email.clone(),
            username: self.preferred_username.clone(),
            first_name: self.given_name.clone(),
            last_name: self.family_name.clone(),
            roles: self.roles().to_vec(),
            groups: self.groups.clone(),
            email_verified: self.email_verified,
            makerspace_id: self.makerspace_id.clone(),
            provider_id: self.provider_id.clone(),
        }
    }
}

/// User information extracted from a validated token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub keycloak_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: Vec<String>,
    pub groups: Vec<String>,
    pub email_verified: bool,
    pub makerspace_id: Option<String>,
    pub provider_id: Option<String>,
}
