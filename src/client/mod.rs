//! The PokeForge client and its request/pagination plumbing.

pub mod config;
pub mod http;
pub mod paginated;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::TokenManager;
use crate::{Error, Result};

pub use config::{AuthConfig, ClientConfig, ConfigOverrides, RetryConfig, TokenFuture, TokenProvider};
pub use http::{QueryValue, RequestDescriptor};
pub use paginated::{create_page, ListResponse, Page, PageFetcher, PageFuture, PageInfo, PageStream};

use http::ClientInner;

/// The PokeForge API client.
///
/// Owns the request pipeline (authentication, timeout, retry, error
/// mapping) that endpoint wrappers call into with a [`RequestDescriptor`].
/// Cheap to clone; all clones share one transport and token manager.
///
/// # Example
///
/// ```no_run
/// use pokeforge_rs::{AuthConfig, ClientConfig, PokeForgeClient, RequestDescriptor};
///
/// # async fn example() -> pokeforge_rs::Result<()> {
/// let client = PokeForgeClient::new(
///     ClientConfig::default().with_auth(AuthConfig::static_token("jwt-token")),
/// )?;
///
/// let card: Option<serde_json::Value> = client
///     .request(RequestDescriptor::get("/Cards/card-uuid"))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct PokeForgeClient {
    inner: Arc<ClientInner>,
}

impl PokeForgeClient {
    /// Build a client from a configuration.
    ///
    /// Validates the base URL, strips any trailing slash, and builds a
    /// transport unless the configuration injects one. An injected
    /// transport is adopted as-is and never torn down by this client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)?;

        let http = match &config.transport {
            Some(transport) => transport.clone(),
            None => reqwest::Client::builder()
                .user_agent(&config.user_agent)
                .build()
                .map_err(|e| Error::Config(format!("failed to build transport: {e}")))?,
        };
        let tokens = TokenManager::new(config.auth.clone());

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                tokens,
                config,
            }),
        })
    }

    /// Build a sibling client with partial configuration overrides.
    ///
    /// The original client and its in-flight requests are unaffected;
    /// useful for credential rotation.
    pub fn with_overrides(&self, overrides: ConfigOverrides) -> Result<Self> {
        Self::new(self.inner.config.derive(overrides))
    }

    /// Execute one logical call described by `descriptor`.
    ///
    /// Resolves `Ok(None)` for 204 or non-JSON success responses and
    /// `Ok(Some)` for parsed JSON bodies.
    pub async fn request<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<Option<T>> {
        self.inner.execute(&descriptor).await
    }

    /// GET a path with query parameters.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, QueryValue)>,
    ) -> Result<Option<T>> {
        let mut descriptor = RequestDescriptor::get(path);
        descriptor.query = query;
        self.request(descriptor).await
    }

    /// POST a JSON body to a path.
    pub async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>> {
        self.request(RequestDescriptor::post(path).json_body(body)?)
            .await
    }

    /// PUT a JSON body to a path.
    pub async fn put<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>> {
        self.request(RequestDescriptor::put(path).json_body(body)?)
            .await
    }

    /// DELETE a path.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        self.request(RequestDescriptor::delete(path)).await
    }

    /// Replace the authentication mode with a static token.
    pub async fn set_token(&self, token: impl Into<String>) {
        self.inner.tokens.set_token(token).await;
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Hit the health endpoint; errors if the API is unreachable.
    pub async fn health(&self) -> Result<()> {
        self.request::<serde_json::Value>(RequestDescriptor::get("/health"))
            .await
            .map(|_| ())
    }
}

impl Clone for PokeForgeClient {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl std::fmt::Debug for PokeForgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PokeForgeClient")
            .field("config", &self.inner.config)
            .finish()
    }
}
