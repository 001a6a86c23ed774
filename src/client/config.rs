//! Client configuration options.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::Error;

/// Boxed future returned by a dynamic token provider.
pub type TokenFuture = Pin<Box<dyn Future<Output = String> + Send>>;

/// Callback that resolves a fresh bearer token on every invocation.
pub type TokenProvider = Arc<dyn Fn() -> TokenFuture + Send + Sync>;

/// Authentication configuration.
///
/// Modeled as an explicit sum type so a static token and a dynamic provider
/// can never both be set at once.
#[derive(Clone, Default)]
pub enum AuthConfig {
    /// No authentication; requests carry no Authorization header.
    #[default]
    None,
    /// Fixed bearer token attached to every request.
    Static(SecretString),
    /// Callback invoked per HTTP attempt to resolve the current token.
    Dynamic(TokenProvider),
}

impl AuthConfig {
    /// Authenticate with a fixed bearer token.
    pub fn static_token(token: impl Into<String>) -> Self {
        AuthConfig::Static(SecretString::from(token.into()))
    }

    /// Authenticate via a callback invoked on every HTTP attempt.
    ///
    /// The provider runs once per attempt, including retries, so a token
    /// refreshed between attempts is picked up automatically.
    pub fn dynamic<F, Fut>(provider: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        AuthConfig::Dynamic(Arc::new(move || Box::pin(provider()) as TokenFuture))
    }

    /// Returns `true` if any authentication mode is configured.
    pub fn is_configured(&self) -> bool {
        !matches!(self, AuthConfig::None)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthConfig::None => write!(f, "AuthConfig::None"),
            AuthConfig::Static(_) => write!(f, "AuthConfig::Static([REDACTED])"),
            AuthConfig::Dynamic(_) => write!(f, "AuthConfig::Dynamic(<provider>)"),
        }
    }
}

/// Configuration for retry backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Base delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any computed delay.
    pub max_delay: Duration,
    /// Double the delay on each subsequent retry.
    pub exponential: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            exponential: true,
        }
    }
}

impl RetryConfig {
    /// Set the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Use a constant delay instead of exponential backoff.
    pub fn constant(mut self) -> Self {
        self.exponential = false;
        self
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based).
    ///
    /// Exponential mode yields `min(base * 2^(attempt-1), max)`; constant
    /// mode yields `base`. The result never exceeds `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.base_delay.min(self.max_delay);
        }
        let base_ms = self.base_delay.as_millis() as u64;
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(base_ms.saturating_mul(factor)).min(self.max_delay)
    }

    /// Delay before the next retry, honoring a server-provided rate-limit
    /// hint when the prior failure carried one.
    pub fn delay_after(&self, attempt: u32, last_error: Option<&Error>) -> Duration {
        if let Some(Error::RateLimit {
            retry_after: Some(hint),
            ..
        }) = last_error
        {
            return (*hint).min(self.max_delay);
        }
        self.delay_for_attempt(attempt)
    }
}

/// Configuration for the PokeForge client.
///
/// Immutable once a client is constructed from it; use
/// [`ClientConfig::derive`] to produce an adjusted copy.
///
/// # Example
///
/// ```
/// use pokeforge_rs::{AuthConfig, ClientConfig};
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_auth(AuthConfig::static_token("jwt-token"))
///     .with_timeout(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API; a trailing slash is stripped at client build.
    pub base_url: String,
    /// Authentication mode.
    pub auth: AuthConfig,
    /// Default per-request deadline.
    pub timeout: Duration,
    /// Additional attempts after the first (429/5xx and transport failures).
    pub max_retries: u32,
    /// Backoff policy between attempts.
    pub retry: RetryConfig,
    /// Externally-owned transport; the client builds its own when absent.
    pub transport: Option<reqwest::Client>,
    /// User-Agent header value.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.pokeforge.gg".to_string(),
            auth: AuthConfig::None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry: RetryConfig::default(),
            transport: None,
            user_agent: format!("pokeforge-rs/{} (Rust)", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the authentication mode.
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Set the default request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the retry backoff policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Use an externally-owned `reqwest` client as the transport.
    pub fn with_transport(mut self, transport: reqwest::Client) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the User-Agent header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Produce a new configuration by overlaying partial overrides.
    ///
    /// The original is left untouched, so clients built from it keep their
    /// behavior; this supports credential rotation without affecting
    /// in-flight requests.
    pub fn derive(&self, overrides: ConfigOverrides) -> ClientConfig {
        ClientConfig {
            base_url: overrides.base_url.unwrap_or_else(|| self.base_url.clone()),
            auth: overrides.auth.unwrap_or_else(|| self.auth.clone()),
            timeout: overrides.timeout.unwrap_or(self.timeout),
            max_retries: overrides.max_retries.unwrap_or(self.max_retries),
            retry: overrides.retry.unwrap_or_else(|| self.retry.clone()),
            transport: overrides.transport.or_else(|| self.transport.clone()),
            user_agent: overrides
                .user_agent
                .unwrap_or_else(|| self.user_agent.clone()),
        }
    }
}

/// Partial configuration overlay for [`ClientConfig::derive`].
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    /// Replacement base URL.
    pub base_url: Option<String>,
    /// Replacement authentication mode.
    pub auth: Option<AuthConfig>,
    /// Replacement default deadline.
    pub timeout: Option<Duration>,
    /// Replacement retry count.
    pub max_retries: Option<u32>,
    /// Replacement backoff policy.
    pub retry: Option<RetryConfig>,
    /// Replacement transport.
    pub transport: Option<reqwest::Client>,
    /// Replacement User-Agent.
    pub user_agent: Option<String>,
}
