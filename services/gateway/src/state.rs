use std::sync::Arc;

use makrgate_core::clock::Clock;

use crate::refresh::TokenRefreshClient;
use crate::security::keys::KeyProvider;
use crate::security::monitor::SecurityMonitor;
use crate::security::validator::JwtValidator;

/// Shared application state passed to every handler via axum `State`.
///
/// All services are constructed once in `main` (tests substitute their
/// own) and shared through `Arc`s; nothing here is a global.
#[derive(Clone)]
pub struct AppState {
    pub validator: Arc<JwtValidator>,
    pub security: Arc<SecurityMonitor>,
    pub refresh: Arc<TokenRefreshClient>,
    pub keys: Arc<dyn KeyProvider>,
    pub clock: Arc<dyn Clock>,
}
