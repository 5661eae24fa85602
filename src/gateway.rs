//! The gateway: cache, token lifecycle, upstream calls and quota tracking behind one handle.
//!
//! Every piece of shared state lives inside a [`Gateway`] value, so independent gateways
//! (for example one per test) never interfere.

mod common;
mod fetch;

// self
use crate::{
	_prelude::*,
	auth::{TokenIssuer, TokenManager, TokenState},
	cache::ResponseCache,
	config::GatewayConfig,
	cost::CostEstimator,
	error::{ConfigError, ErrorKind},
	http::ReqwestHttpClient,
	oauth::{OAuth2TokenIssuer, ReqwestTransportErrorMapper},
	query::{Query, QueryKey},
	rate_limit::{RateLimitState, RateLimitTracker},
	states::StateSnapshot,
};

/// How upstream requests are authenticated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
	/// Bearer tokens from the client-credentials grant.
	#[serde(rename = "oauth2")]
	OAuth2,
	/// Unauthenticated requests with upstream's anonymous quota.
	Anonymous,
}

/// Where a [`Fetched`] result came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOrigin {
	/// Served from the response cache, including entries stored by a concurrent identical
	/// query this call waited on.
	Cache,
	/// Fetched from upstream by this call.
	Upstream,
}

/// Successful [`Gateway::fetch`] outcome.
#[derive(Clone, Debug)]
pub struct Fetched {
	/// Parsed aircraft states, shared with the cache.
	pub states: Arc<StateSnapshot>,
	/// Rate-limit snapshot taken when the call completed.
	pub rate_limit: RateLimitState,
	/// Whether upstream was contacted.
	pub origin: FetchOrigin,
}

/// Read-only view used by status endpoints.
#[derive(Clone, Debug, Serialize)]
pub struct GatewayStatus {
	/// Configured authentication mode.
	pub auth_mode: AuthMode,
	/// Token manager state.
	pub token: TokenState,
	/// Current quota snapshot.
	pub rate_limit: RateLimitState,
	/// Stored cache entries, expired ones included.
	pub cached_entries: usize,
}

/// Result of [`Gateway::probe`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpstreamHealth {
	/// Upstream answered the probe.
	Operational,
	/// The probe failed.
	Unavailable {
		/// Category of the failure.
		kind: ErrorKind,
		/// Human-readable failure description.
		message: String,
	},
}

/// Resilient access layer in front of the states endpoint.
pub struct Gateway {
	config: GatewayConfig,
	tokens: TokenManager,
	cache: ResponseCache<Arc<StateSnapshot>>,
	rate_limit: RateLimitTracker,
	cost: CostEstimator,
	http: ReqwestHttpClient,
	fetch_flights: Mutex<HashMap<QueryKey, Arc<common::FetchFlight>>>,
}
impl Gateway {
	/// Builds a gateway with reqwest transports honoring the configured timeouts.
	pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
		let http = ReqwestHttpClient::with_timeout(config.request_timeout)?;
		let token_http = ReqwestHttpClient::with_timeout(config.token_timeout)?;

		Self::with_http_clients(config, http, token_http)
	}

	/// Builds a gateway whose states requests go through `http` and whose token exchanges go
	/// through `token_http`.
	///
	/// The configured timeouts are not applied to caller-provided clients.
	pub fn with_http_clients(
		config: GatewayConfig,
		http: ReqwestHttpClient,
		token_http: ReqwestHttpClient,
	) -> Result<Self, ConfigError> {
		let issuer = <OAuth2TokenIssuer<ReqwestHttpClient, ReqwestTransportErrorMapper>>::from_descriptor(
			&config.descriptor,
			token_http,
			ReqwestTransportErrorMapper,
		)?;

		Ok(Self::with_parts(config, http, Arc::new(issuer)))
	}

	/// Builds a gateway from caller-provided transport and token issuer.
	pub fn with_parts(
		config: GatewayConfig,
		http: ReqwestHttpClient,
		issuer: Arc<dyn TokenIssuer>,
	) -> Self {
		let tokens = TokenManager::new(issuer, config.credentials.clone())
			.with_refresh_buffer(config.refresh_buffer)
			.with_default_lifetime(config.default_token_lifetime);
		let cache = ResponseCache::new(config.cache_ttl).with_capacity(config.cache_capacity);
		let cost = CostEstimator::new(config.default_region);

		Self {
			config,
			tokens,
			cache,
			rate_limit: RateLimitTracker::new(),
			cost,
			http,
			fetch_flights: Default::default(),
		}
	}

	/// Active configuration.
	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}

	/// Token manager owned by this gateway.
	pub fn token_manager(&self) -> &TokenManager {
		&self.tokens
	}

	/// Configured authentication mode.
	pub fn auth_mode(&self) -> AuthMode {
		if self.tokens.is_configured() { AuthMode::OAuth2 } else { AuthMode::Anonymous }
	}

	/// Current rate-limit snapshot.
	pub fn snapshot(&self) -> RateLimitState {
		self.rate_limit.snapshot()
	}

	/// Credits upstream charges for `query`.
	pub fn estimate_cost(&self, query: &Query) -> u8 {
		self.cost.estimate(query)
	}

	/// Aggregated status for status endpoints.
	pub fn status(&self) -> GatewayStatus {
		GatewayStatus {
			auth_mode: self.auth_mode(),
			token: self.tokens.state(),
			rate_limit: self.rate_limit.snapshot(),
			cached_entries: self.cache.len(),
		}
	}
}
impl Debug for Gateway {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("config", &self.config)
			.field("tokens", &self.tokens)
			.field("cache", &self.cache)
			.field("rate_limit", &self.rate_limit)
			.finish()
	}
}
