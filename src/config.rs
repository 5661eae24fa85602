//! Gateway configuration with reference defaults and environment loading.

// self
use crate::{
	_prelude::*,
	auth::{ClientCredentials, TokenManager},
	error::ConfigError,
	provider::UpstreamDescriptor,
	query::BoundingBox,
};

/// OAuth client identifier.
pub const ENV_CLIENT_ID: &str = "OPENSKY_CLIENT_ID";
/// OAuth client secret.
pub const ENV_CLIENT_SECRET: &str = "OPENSKY_CLIENT_SECRET";
/// `true`/`false`: serve anonymously when no token can be obtained.
pub const ENV_ANONYMOUS_FALLBACK: &str = "OPENSKY_ANONYMOUS_FALLBACK";
/// Cache time-to-live in whole seconds.
pub const ENV_CACHE_TTL_SECS: &str = "OPENSKY_CACHE_TTL_SECS";
/// Token endpoint override.
pub const ENV_TOKEN_URL: &str = "OPENSKY_TOKEN_URL";
/// States endpoint override.
pub const ENV_STATES_URL: &str = "OPENSKY_STATES_URL";

/// Everything a [`Gateway`](crate::gateway::Gateway) needs besides its collaborators.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
	/// Upstream endpoints and client-auth method.
	pub descriptor: UpstreamDescriptor,
	/// Client credentials; `None` leaves the token manager unconfigured.
	pub credentials: Option<ClientCredentials>,
	/// Fall back to unauthenticated requests when no token can be obtained.
	pub anonymous_fallback: bool,
	/// Refresh tokens this long before they expire.
	pub refresh_buffer: Duration,
	/// Lifetime assumed when the token endpoint omits `expires_in`.
	pub default_token_lifetime: Duration,
	/// Response cache time-to-live.
	pub cache_ttl: Duration,
	/// Maximum number of cached responses; `None` is unbounded.
	pub cache_capacity: Option<usize>,
	/// Retries after a rejected token before giving up.
	pub max_auth_retries: u32,
	/// Timeout for states requests.
	pub request_timeout: Duration,
	/// Timeout for token requests.
	pub token_timeout: Duration,
	/// Region served by [`Query::DefaultRegion`](crate::query::Query::DefaultRegion).
	pub default_region: BoundingBox,
	/// Result limit applied when a query carries none.
	pub default_limit: Option<usize>,
}
impl GatewayConfig {
	/// Reference cache time-to-live.
	pub const DEFAULT_CACHE_TTL: Duration = Duration::seconds(45);
	/// Reference cache capacity.
	pub const DEFAULT_CACHE_CAPACITY: usize = 1_024;
	/// Reference retry budget for rejected tokens.
	pub const DEFAULT_MAX_AUTH_RETRIES: u32 = 2;
	/// Reference states request timeout.
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(30);
	/// Reference token request timeout.
	pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::seconds(10);
	/// Reference result limit.
	pub const DEFAULT_LIMIT: usize = 50;

	/// Reference configuration for `descriptor` without credentials.
	pub fn new(descriptor: UpstreamDescriptor) -> Self {
		Self {
			descriptor,
			credentials: None,
			anonymous_fallback: true,
			refresh_buffer: TokenManager::DEFAULT_REFRESH_BUFFER,
			default_token_lifetime: TokenManager::DEFAULT_TOKEN_LIFETIME,
			cache_ttl: Self::DEFAULT_CACHE_TTL,
			cache_capacity: Some(Self::DEFAULT_CACHE_CAPACITY),
			max_auth_retries: Self::DEFAULT_MAX_AUTH_RETRIES,
			request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
			token_timeout: Self::DEFAULT_TOKEN_TIMEOUT,
			default_region: BoundingBox::DEFAULT_REGION,
			default_limit: Some(Self::DEFAULT_LIMIT),
		}
	}

	/// Reference configuration for the public OpenSky deployment.
	pub fn opensky() -> Result<Self, ConfigError> {
		Ok(Self::new(UpstreamDescriptor::opensky()?))
	}

	/// Loads the configuration from process environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Loads the configuration through `lookup`, starting from the OpenSky defaults.
	///
	/// Blank credential values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
		let mut descriptor = UpstreamDescriptor::opensky()?;

		if let Some(url) = read(ENV_TOKEN_URL) {
			descriptor.endpoints.token = parse_url(ENV_TOKEN_URL, &url)?;
		}
		if let Some(url) = read(ENV_STATES_URL) {
			descriptor.endpoints.states = parse_url(ENV_STATES_URL, &url)?;
		}

		let descriptor = UpstreamDescriptor::builder()
			.token_endpoint(descriptor.endpoints.token)
			.states_endpoint(descriptor.endpoints.states)
			.client_auth_method(descriptor.client_auth_method)
			.build()?;
		let mut config = Self::new(descriptor).with_credentials(ClientCredentials::from_parts(
			lookup(ENV_CLIENT_ID),
			lookup(ENV_CLIENT_SECRET),
		));

		if let Some(raw) = read(ENV_ANONYMOUS_FALLBACK) {
			config.anonymous_fallback = parse_bool(ENV_ANONYMOUS_FALLBACK, &raw)?;
		}
		if let Some(raw) = read(ENV_CACHE_TTL_SECS) {
			config.cache_ttl = parse_secs(ENV_CACHE_TTL_SECS, &raw)?;
		}

		Ok(config)
	}

	/// Sets or clears the client credentials.
	pub fn with_credentials(mut self, credentials: Option<ClientCredentials>) -> Self {
		self.credentials = credentials;

		self
	}

	/// Enables or disables the anonymous fallback.
	pub fn with_anonymous_fallback(mut self, enabled: bool) -> Self {
		self.anonymous_fallback = enabled;

		self
	}

	/// Overrides the token refresh buffer.
	pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
		self.refresh_buffer = buffer;

		self
	}

	/// Overrides the lifetime assumed for tokens without `expires_in`.
	pub fn with_default_token_lifetime(mut self, lifetime: Duration) -> Self {
		self.default_token_lifetime = lifetime;

		self
	}

	/// Overrides the cache time-to-live.
	pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
		self.cache_ttl = ttl;

		self
	}

	/// Overrides the cache capacity.
	pub fn with_cache_capacity(mut self, capacity: Option<usize>) -> Self {
		self.cache_capacity = capacity;

		self
	}

	/// Overrides the retry budget for rejected tokens.
	pub fn with_max_auth_retries(mut self, retries: u32) -> Self {
		self.max_auth_retries = retries;

		self
	}

	/// Overrides the states request timeout.
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Overrides the token request timeout.
	pub fn with_token_timeout(mut self, timeout: Duration) -> Self {
		self.token_timeout = timeout;

		self
	}

	/// Overrides the default region.
	pub fn with_default_region(mut self, region: BoundingBox) -> Self {
		self.default_region = region;

		self
	}

	/// Overrides the default result limit.
	pub fn with_default_limit(mut self, limit: Option<usize>) -> Self {
		self.default_limit = limit;

		self
	}
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw.trim())
		.map_err(|e| ConfigError::InvalidEnv { name, reason: e.to_string() })
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		other => Err(ConfigError::InvalidEnv { name, reason: format!("`{other}` is not a boolean") }),
	}
}

fn parse_secs(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
	let secs = raw
		.trim()
		.parse::<u32>()
		.map_err(|e| ConfigError::InvalidEnv { name, reason: e.to_string() })?;

	if secs == 0 {
		return Err(ConfigError::InvalidEnv { name, reason: "must be at least one second".into() });
	}

	Ok(Duration::seconds(secs.into()))
}
