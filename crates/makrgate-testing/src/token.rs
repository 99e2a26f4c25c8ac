use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::keys::{OTHER_RSA_PRIVATE_PEM, RSA_PRIVATE_PEM};

/// Issuer the gateway under test expects.
pub const TEST_ISSUER: &str = "https://idp.example/realms/r1";

/// Primary audience the gateway under test expects.
pub const TEST_AUDIENCE: &str = "api";

/// Builder for crafting JWTs with arbitrary claims and algorithms.
pub struct TokenBuilder {
    header: Header,
    claims: Map<String, Value>,
}

impl TokenBuilder {
    /// A token that passes validation: RS256, issued a minute ago with a
    /// fifteen-minute lifetime, test issuer/audience, random subject.
    pub fn valid() -> Self {
        let now = Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("sub".to_owned(), json!(format!("u-{}", Uuid::new_v4())));
        claims.insert("iat".to_owned(), json!(now - 60));
        claims.insert("exp".to_owned(), json!(now + 840));
        claims.insert("iss".to_owned(), json!(TEST_ISSUER));
        claims.insert("aud".to_owned(), json!(TEST_AUDIENCE));
        Self {
            header: Header::new(Algorithm::RS256),
            claims,
        }
    }

    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_owned(), value);
        self
    }

    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    pub fn kid(mut self, kid: &str) -> Self {
        self.header.kid = Some(kid.to_owned());
        self
    }

    pub fn subject(&self) -> String {
        self.claims["sub"].as_str().unwrap_or_default().to_owned()
    }

    /// Sign with the fixture key the gateway trusts.
    pub fn sign(&self) -> String {
        self.sign_with(&EncodingKey::from_rsa_pem(RSA_PRIVATE_PEM.as_bytes()).unwrap())
    }

    /// Sign with the mismatched fixture key.
    pub fn sign_with_wrong_key(&self) -> String {
        self.sign_with(&EncodingKey::from_rsa_pem(OTHER_RSA_PRIVATE_PEM.as_bytes()).unwrap())
    }

    pub fn sign_with(&self, key: &EncodingKey) -> String {
        encode(&self.header, &self.claims, key).unwrap()
    }

    /// Sign with HS256 instead of RS256 (algorithm-downgrade shapes).
    pub fn sign_hs256(&self, secret: &[u8]) -> String {
        let mut header = self.header.clone();
        header.alg = Algorithm::HS256;
        encode(&header, &self.claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }
}

/// Assemble a token from arbitrary header and payload JSON, with an
/// empty signature. For shapes `encode` refuses to produce, such as
/// `alg: "none"`.
pub fn raw_token(header: &Value, claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).expect("header serializes"));
    let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).expect("claims serialize"));
    format!("{header}.{claims}.")
}
