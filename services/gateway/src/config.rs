/// Gateway configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the identity provider (e.g. "https://auth.example.com").
    pub keycloak_url: String,
    /// Identity-provider realm name.
    pub realm: String,
    /// Primary audience expected in access tokens.
    pub audience: String,
    /// OAuth client id used for refresh and revocation calls.
    pub client_id: String,
    /// OAuth client secret used for refresh and revocation calls.
    pub client_secret: String,
    /// PEM-encoded RSA public key used to verify token signatures.
    pub public_key_pem: String,
    /// Deployment environment; "production" suppresses internal error
    /// details in responses. Env var: `ENVIRONMENT`.
    pub environment: String,
    /// TCP port to listen on (default 8080). Env var: `GATEWAY_PORT`.
    pub gateway_port: u16,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            keycloak_url: std::env::var("KEYCLOAK_URL").expect("KEYCLOAK_URL"),
            realm: std::env::var("KEYCLOAK_REALM").expect("KEYCLOAK_REALM"),
            audience: std::env::var("JWT_AUDIENCE").expect("JWT_AUDIENCE"),
            client_id: std::env::var("KEYCLOAK_CLIENT_ID").expect("KEYCLOAK_CLIENT_ID"),
            client_secret: std::env::var("KEYCLOAK_CLIENT_SECRET").expect("KEYCLOAK_CLIENT_SECRET"),
            public_key_pem: std::env::var("JWT_PUBLIC_KEY_PEM").expect("JWT_PUBLIC_KEY_PEM"),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_owned()),
            gateway_port: std::env::var("GATEWAY_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
        }
    }

    /// Expected token issuer, derived from the provider URL and realm.
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.keycloak_url, self.realm)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
