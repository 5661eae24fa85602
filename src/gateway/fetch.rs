//! Fetch orchestration with caching, per-key singleflight and bounded token retry.
//!
//! [`Gateway::fetch`] serves cache hits without touching the token or the network. On a miss
//! the caller takes the per-key guard, re-checks the cache (a concurrent identical query may
//! have filled it meanwhile), obtains a token, and calls upstream. A 401 invalidates the
//! rejected token and retries with a fresh one up to `max_auth_retries` times; every other
//! failure is returned on first occurrence and nothing but a parsed success is cached.
//! Callers that waited on the guard while another call fetched the same key receive that
//! call's failure instead of repeating the upstream request.

// self
use crate::{
	_prelude::*,
	auth::OAuthToken,
	error::{AuthError, ConnectionError},
	gateway::{
		FetchOrigin, Fetched, Gateway, UpstreamHealth,
		common::{self, FetchLease, UpstreamVerdict},
	},
	http::RateLimitHeaders,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	query::{BoundingBox, Query, QueryKey},
	states::StateSnapshot,
};

impl Gateway {
	/// Returns the aircraft states matching `query`.
	pub async fn fetch(&self, query: &Query) -> Result<Fetched> {
		const KIND: FlowKind = FlowKind::Fetch;

		let key = query.key(&self.config.default_region, self.config.default_limit);

		if let Some(fetched) = self.cached(&key) {
			obs::record_flow_outcome(KIND, FlowOutcome::CacheHit);

			return Ok(fetched);
		}

		let span = FlowSpan::new(KIND, "fetch");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let lease = FetchLease::acquire(self, &key);
				let flight = lease.flight();
				let observed = flight.epoch();
				let _singleflight = flight.lock().await;

				if let Some(fetched) = self.cached(&key) {
					return Ok(fetched);
				}
				if let Some(e) = flight.failure_since(observed) {
					tracing::debug!(
						key = key.fingerprint(),
						"Sharing the failure of a concurrent identical fetch."
					);

					return Err(e);
				}

				let result = self.fetch_upstream(&key).await;

				flight.complete(&result);

				result
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(e) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				tracing::debug!(key = key.fingerprint(), kind = %e.kind(), "Fetch failed.");
			},
		}

		result
	}

	/// Runs a minimal-cost query against a 0.1° box to check upstream reachability.
	pub async fn probe(&self) -> UpstreamHealth {
		let query = Query::region(BoundingBox::PROBE_REGION).with_limit(1);

		match self.fetch(&query).await {
			Ok(_) => UpstreamHealth::Operational,
			Err(e) => UpstreamHealth::Unavailable { kind: e.kind(), message: e.to_string() },
		}
	}

	fn cached(&self, key: &QueryKey) -> Option<Fetched> {
		let states = self.cache.get(key)?;

		tracing::debug!(key = key.fingerprint(), "Serving states from cache.");

		Some(Fetched { states, rate_limit: self.rate_limit.snapshot(), origin: FetchOrigin::Cache })
	}

	async fn fetch_upstream(&self, key: &QueryKey) -> Result<Fetched> {
		let mut token = self.authorize().await?;
		let mut attempts = 0_u32;

		loop {
			attempts += 1;

			tracing::debug!(key = key.fingerprint(), attempts, "Requesting states from upstream.");

			let response = self.send(key, token.as_ref()).await?;
			let status = response.status();
			let limits = RateLimitHeaders::from_headers(response.headers());

			match UpstreamVerdict::classify(status) {
				UpstreamVerdict::Success => {
					self.rate_limit.update(limits.remaining, None);

					let body = response.bytes().await.map_err(ConnectionError::from)?;

					return self.store(key, &body);
				},
				UpstreamVerdict::TokenRejected => {
					self.rate_limit.update(limits.remaining, None);

					let Some(rejected) = token.take() else {
						return Err(AuthError::AnonymousRejected.into());
					};

					if attempts > self.config.max_auth_retries {
						tracing::warn!(attempts, "Upstream kept rejecting fresh access tokens.");

						return Err(AuthError::RetriesExhausted { attempts }.into());
					}

					tracing::warn!(attempts, "Upstream rejected the access token; refreshing.");

					token = Some(self.tokens.force_refresh(&rejected).await?);
				},
				UpstreamVerdict::RateLimited => {
					self.rate_limit.update(limits.remaining, limits.retry_after);

					tracing::warn!(
						remaining = limits.remaining,
						retry_after = limits.retry_after.map(|d| d.whole_seconds()),
						"Upstream rate limit exceeded."
					);

					return Err(Error::RateLimit { retry_after: limits.retry_after });
				},
				UpstreamVerdict::ServerFailure => {
					self.rate_limit.update(limits.remaining, None);

					return Err(Error::ExternalServer { status: status.as_u16() });
				},
				UpstreamVerdict::Unexpected => {
					self.rate_limit.update(limits.remaining, None);

					return Err(ConnectionError::UnexpectedStatus { status: status.as_u16() }.into());
				},
			}
		}
	}

	async fn authorize(&self) -> Result<Option<OAuthToken>> {
		match self.tokens.ensure_valid().await {
			Ok(token) => Ok(Some(token)),
			Err(AuthError::Unconfigured) if self.config.anonymous_fallback => {
				tracing::debug!("No client credentials; requesting states anonymously.");

				Ok(None)
			},
			Err(e) if self.config.anonymous_fallback => {
				tracing::warn!(error = %e, "Falling back to anonymous upstream access.");

				Ok(None)
			},
			Err(e) => Err(e.into()),
		}
	}

	async fn send(&self, key: &QueryKey, token: Option<&OAuthToken>) -> Result<reqwest::Response> {
		let mut request = self
			.http
			.get(self.config.descriptor.endpoints.states.clone())
			.query(&key.target().upstream_params());

		if let Some(token) = token {
			request = request.bearer_auth(token.access_token.expose());
		}

		request.send().await.map_err(common::map_send_error)
	}

	fn store(&self, key: &QueryKey, body: &[u8]) -> Result<Fetched> {
		let mut snapshot = StateSnapshot::from_slice(body)?;

		snapshot.truncate(key.limit());

		let states = Arc::new(snapshot);
		let credits = self.cost.estimate_key(key);

		self.cache.put(key.clone(), states.clone());
		self.rate_limit.clear_reset();
		self.rate_limit.record_spent(credits);

		tracing::debug!(
			key = key.fingerprint(),
			aircraft = states.len(),
			credits,
			"Cached upstream states."
		);

		Ok(Fetched { states, rate_limit: self.rate_limit.snapshot(), origin: FetchOrigin::Upstream })
	}
}
