//! Application state management

use std::sync::Arc;

use crate::auth::JwtVerifier;
use crate::config::Config;
use crate::sync::SyncService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    sync: SyncService,
    verifier: Option<Arc<JwtVerifier>>,
}

impl AppState {
    /// Create a new application state
    ///
    /// A bearer token verifier is built when `JWT_SECRET` is configured.
    pub fn new(config: Config, sync: SyncService) -> Self {
        let verifier = config
            .auth
            .jwt_secret
            .as_ref()
            .map(|secret| Arc::new(JwtVerifier::new(secret.as_bytes())));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                sync,
                verifier,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the sync service
    pub fn sync(&self) -> &SyncService {
        &self.inner.sync
    }

    /// Token verifier for the push path, if auth is enabled
    pub fn verifier(&self) -> Option<Arc<JwtVerifier>> {
        self.inner.verifier.clone()
    }
}
