//! Token management for API authentication.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;

use crate::client::config::AuthConfig;

/// Resolves the bearer credential for outgoing requests.
///
/// Wraps the configured [`AuthConfig`] and is shared across all calls made
/// by one client. A dynamic provider is invoked on every call with no
/// caching, so each HTTP attempt (including retries) observes the current
/// token.
///
/// # Thread Safety
///
/// `TokenManager` is cheaply cloneable and safe to share across tasks; it
/// uses internal locking only to support [`set_token`](Self::set_token).
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<RwLock<AuthConfig>>,
}

impl TokenManager {
    /// Create a manager for the given authentication mode.
    pub fn new(auth: AuthConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(auth)),
        }
    }

    /// Resolve the current token, or `None` when unconfigured.
    ///
    /// Static mode returns the stored token verbatim; dynamic mode awaits
    /// the provider. The caller omits the Authorization header entirely on
    /// `None` rather than sending an empty sentinel.
    pub async fn get_token(&self) -> Option<String> {
        // Clone the mode out so a slow provider never holds the lock.
        let mode = self.inner.read().await.clone();
        match mode {
            AuthConfig::None => None,
            AuthConfig::Static(token) => Some(token.expose_secret().to_string()),
            AuthConfig::Dynamic(provider) => Some(provider().await),
        }
    }

    /// Replace the configured mode with a static token.
    ///
    /// Escape hatch for manual token rotation without rebuilding the
    /// client; a previously configured dynamic provider is dropped.
    pub async fn set_token(&self, token: impl Into<String>) {
        let mut mode = self.inner.write().await;
        *mode = AuthConfig::Static(SecretString::from(token.into()));
    }

    /// Returns `true` if any authentication mode is configured.
    pub async fn has_auth(&self) -> bool {
        self.inner.read().await.is_configured()
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager").finish_non_exhaustive()
    }
}
