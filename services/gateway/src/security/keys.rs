use jsonwebtoken::DecodingKey;

use makrgate_auth_types::event::SecurityEventKind;

/// Provides the verification key for a token, given the `kid` from its
/// header. Key-set retrieval and rotation live outside the gateway;
/// implementations are injected at startup.
pub trait KeyProvider: Send + Sync {
    fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, KeyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("no verification key for key id")]
    NotFound,
    #[error("key set fetch failed")]
    Fetch,
    #[error("key provider unreachable")]
    Network,
}

impl KeyError {
    /// The security-event classification of this key failure.
    pub fn event_kind(&self) -> SecurityEventKind {
        match self {
            Self::NotFound => SecurityEventKind::KeyNotFound,
            Self::Fetch => SecurityEventKind::JwksFetchError,
            Self::Network => SecurityEventKind::NetworkError,
        }
    }
}

/// Key provider backed by a single PEM-encoded RSA public key. Ignores
/// `kid`: the provider signs everything with one realm key.
pub struct StaticKeyProvider {
    key: DecodingKey,
}

impl StaticKeyProvider {
    pub fn from_rsa_pem(pem: &[u8]) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self {
            key: DecodingKey::from_rsa_pem(pem)?,
        })
    }
}

impl KeyProvider for StaticKeyProvider {
    fn decoding_key(&self, _kid: Option<&str>) -> Result<DecodingKey, KeyError> {
        Ok(self.key.clone())
    }
}
