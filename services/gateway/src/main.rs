use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tracing::info;

use makrgate_core::clock::{Clock, SystemClock};
use makrgate_core::envelope::EnvelopeConfig;
use makrgate_core::tracing::init_tracing;

use makrgate_gateway::config::GatewayConfig;
use makrgate_gateway::refresh::TokenRefreshClient;
use makrgate_gateway::router::build_router;
use makrgate_gateway::security::keys::StaticKeyProvider;
use makrgate_gateway::security::monitor::SecurityMonitor;
use makrgate_gateway::security::validator::JwtValidator;
use makrgate_gateway::state::AppState;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = GatewayConfig::from_env();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let keys = StaticKeyProvider::from_rsa_pem(config.public_key_pem.as_bytes())
        .expect("invalid JWT_PUBLIC_KEY_PEM");

    let state = AppState {
        validator: Arc::new(JwtValidator::new(
            config.issuer(),
            config.audience.clone(),
            clock.clone(),
        )),
        security: Arc::new(SecurityMonitor::new(clock.clone())),
        refresh: Arc::new(TokenRefreshClient::new(
            &config.keycloak_url,
            &config.realm,
            config.client_id.clone(),
            config.client_secret.clone(),
            clock.clone(),
        )),
        keys: Arc::new(keys),
        clock,
    };

    let envelope = EnvelopeConfig {
        production: config.is_production(),
    };
    // Business routes are mounted by downstream deployments; the bare
    // gateway serves health and token endpoints only.
    let router = build_router(state, envelope, Router::new());

    let addr = format!("0.0.0.0:{}", config.gateway_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("gateway listening on {addr}");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server error");
}
