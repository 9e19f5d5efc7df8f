//! Application state management
//!
//! Shared state passed to all request handlers via Axum's state
//! extraction. Everything expensive (token keys, the store connection,
//! the HTTP client in the notifier) is created once here; all fields
//! clone as Arc increments.

use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::notify::Notifier;
use crate::services::AuthService;
use crate::store::CredentialStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Orchestrator for every credential flow
    pub auth: AuthService,
    /// Storage backend, kept for the readiness probe
    pub store: Arc<dyn CredentialStore>,
    /// Application configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Build the state from a selected store and loaded configuration.
    /// Token keys are derived once here, not per request.
    pub fn new(store: Arc<dyn CredentialStore>, config: AppConfig) -> Self {
        let tokens = TokenService::new(&config.jwt.secret, config.jwt.expiry_days);
        let notifier = Arc::new(Notifier::new(config.email.clone()));
        let auth = AuthService::new(Arc::clone(&store), tokens, notifier);

        Self {
            auth,
            store,
            config: Arc::new(config),
        }
    }
}
