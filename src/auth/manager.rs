//! Token lifecycle ownership with a single-flight refresh protocol.
//!
//! [`TokenManager::ensure_valid`] hands out the cached token while it is fresh and otherwise
//! performs one client-credentials exchange on behalf of every concurrent caller. Callers
//! that arrive while an exchange is in flight wait on the refresh guard; once they acquire
//! it they compare the slot epoch they observed with the current one, and if a refresh
//! finished in between they take its outcome (token or failure) instead of issuing a
//! duplicate request.

// self
use crate::{
	_prelude::*,
	auth::{ClientCredentials, IssuedToken, OAuthToken, TokenIssuer, TokenMetrics, TokenStatus},
	error::AuthError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Observable state of a [`TokenManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
	/// No client credentials; every call fails without contacting the token endpoint.
	Unconfigured,
	/// Credentials present but no token has been requested yet.
	NoToken,
	/// A fresh token is cached.
	Valid,
	/// A token request is in flight.
	Refreshing,
	/// The cached token is inside its refresh buffer or past expiry.
	Expired,
	/// The last token request failed.
	RefreshFailed,
}

#[derive(Default)]
struct TokenSlot {
	current: Option<OAuthToken>,
	failure: Option<AuthError>,
	epoch: u64,
}

/// Owns the access token and serializes refreshes.
pub struct TokenManager {
	issuer: Arc<dyn TokenIssuer>,
	credentials: Option<ClientCredentials>,
	refresh_buffer: Duration,
	default_lifetime: Duration,
	slot: RwLock<TokenSlot>,
	refresh_guard: AsyncMutex<()>,
	metrics: Arc<TokenMetrics>,
}
impl TokenManager {
	/// Refresh this long before the token expires.
	pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::minutes(5);
	/// Lifetime assumed when the token endpoint omits `expires_in`.
	pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::minutes(30);

	/// Creates a manager; `None` credentials leave it permanently unconfigured.
	pub fn new(issuer: Arc<dyn TokenIssuer>, credentials: Option<ClientCredentials>) -> Self {
		Self {
			issuer,
			credentials,
			refresh_buffer: Self::DEFAULT_REFRESH_BUFFER,
			default_lifetime: Self::DEFAULT_TOKEN_LIFETIME,
			slot: Default::default(),
			refresh_guard: AsyncMutex::new(()),
			metrics: Default::default(),
		}
	}

	/// Overrides the refresh buffer (defaults to 5 minutes).
	pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
		self.refresh_buffer = if buffer.is_negative() { Duration::ZERO } else { buffer };

		self
	}

	/// Overrides the lifetime assumed when `expires_in` is missing (defaults to 30 minutes).
	pub fn with_default_lifetime(mut self, lifetime: Duration) -> Self {
		self.default_lifetime = lifetime;

		self
	}

	/// Returns `true` when client credentials were supplied.
	pub fn is_configured(&self) -> bool {
		self.credentials.is_some()
	}

	/// Refresh buffer applied to every token.
	pub fn refresh_buffer(&self) -> Duration {
		self.refresh_buffer
	}

	/// Issuance counters.
	pub fn metrics(&self) -> &TokenMetrics {
		&self.metrics
	}

	/// Current state using the system clock.
	pub fn state(&self) -> TokenState {
		self.state_at(OffsetDateTime::now_utc())
	}

	/// State evaluated at `now`.
	pub fn state_at(&self, now: OffsetDateTime) -> TokenState {
		if self.credentials.is_none() {
			return TokenState::Unconfigured;
		}
		if self.refresh_guard.try_lock().is_none() {
			return TokenState::Refreshing;
		}

		let slot = self.slot.read();

		match (&slot.current, &slot.failure) {
			(Some(token), _) => match token.status_at(now, self.refresh_buffer) {
				TokenStatus::Fresh => TokenState::Valid,
				TokenStatus::RefreshDue | TokenStatus::Expired => TokenState::Expired,
			},
			(None, Some(_)) => TokenState::RefreshFailed,
			(None, None) => TokenState::NoToken,
		}
	}

	/// Returns a token that stays valid for at least the refresh buffer.
	///
	/// Fails with [`AuthError::Unconfigured`] without any network call when no
	/// credentials exist, and with the exchange failure when a refresh fails. A failed
	/// refresh clears the cached token; the next call retries.
	pub async fn ensure_valid(&self) -> Result<OAuthToken, AuthError> {
		let credentials = self.credentials.as_ref().ok_or(AuthError::Unconfigured)?;
		let observed = match self.fresh_or_epoch(OffsetDateTime::now_utc()) {
			Ok(token) => return Ok(token),
			Err(epoch) => epoch,
		};
		let _singleflight = self.refresh_guard.lock().await;

		if let Some(outcome) = self.settled_since(observed, OffsetDateTime::now_utc()) {
			return outcome;
		}

		self.issue(credentials).await
	}

	/// Drops `rejected` (if still current) and obtains a replacement.
	///
	/// Concurrent callers rejecting the same token trigger a single exchange: only the first
	/// invalidation matches, the others wait on the refresh it starts.
	pub async fn force_refresh(&self, rejected: &OAuthToken) -> Result<OAuthToken, AuthError> {
		self.invalidate(rejected);
		self.ensure_valid().await
	}

	/// Clears the cached token when it is the one that was rejected.
	///
	/// Returns `true` when the cached token was dropped.
	pub fn invalidate(&self, rejected: &OAuthToken) -> bool {
		let mut slot = self.slot.write();
		let matches = slot
			.current
			.as_ref()
			.is_some_and(|current| current.access_token == rejected.access_token);

		if matches {
			slot.current = None;
			slot.failure = None;
			slot.epoch += 1;

			tracing::debug!("Invalidated rejected access token.");
		}

		matches
	}

	fn fresh_or_epoch(&self, now: OffsetDateTime) -> Result<OAuthToken, u64> {
		let slot = self.slot.read();

		match slot.current.as_ref() {
			Some(token) if token.is_fresh_at(now, self.refresh_buffer) => Ok(token.clone()),
			_ => Err(slot.epoch),
		}
	}

	fn settled_since(
		&self,
		observed: u64,
		now: OffsetDateTime,
	) -> Option<Result<OAuthToken, AuthError>> {
		let slot = self.slot.read();

		if slot.epoch == observed {
			return None;
		}
		if let Some(token) =
			slot.current.as_ref().filter(|token| token.is_fresh_at(now, self.refresh_buffer))
		{
			return Some(Ok(token.clone()));
		}

		slot.failure.clone().map(Err)
	}

	async fn issue(&self, credentials: &ClientCredentials) -> Result<OAuthToken, AuthError> {
		const KIND: FlowKind = FlowKind::TokenIssue;

		let span = FlowSpan::new(KIND, "ensure_valid");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span
			.instrument(async {
				let issued = self.issuer.issue(credentials).await?;

				self.build_token(issued)
			})
			.await;
		let mut slot = self.slot.write();

		slot.epoch += 1;

		match &result {
			Ok(token) => {
				slot.current = Some(token.clone());
				slot.failure = None;

				self.metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				tracing::info!(
					expires_in = token.expires_in.whole_seconds(),
					"Obtained a new access token."
				);
			},
			Err(err) => {
				slot.current = None;
				slot.failure = Some(err.clone());

				self.metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				tracing::warn!(error = %err, "Access token request failed.");
			},
		}

		result
	}

	fn build_token(&self, issued: IssuedToken) -> Result<OAuthToken, AuthError> {
		let expires_in = issued.expires_in.unwrap_or(self.default_lifetime);

		if !expires_in.is_positive() {
			return Err(AuthError::InvalidExpiry { reason: "the value must be positive" });
		}

		Ok(OAuthToken {
			access_token: issued.access_token,
			obtained_at: OffsetDateTime::now_utc(),
			expires_in,
		})
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("credentials", &self.credentials)
			.field("refresh_buffer", &self.refresh_buffer)
			.field("default_lifetime", &self.default_lifetime)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::auth::IssueFuture;

	struct SequenceIssuer {
		calls: AtomicUsize,
		expires_in: Option<Duration>,
	}
	impl SequenceIssuer {
		fn new(expires_in: Option<Duration>) -> Arc<Self> {
			Arc::new(Self { calls: AtomicUsize::new(0), expires_in })
		}
	}
	impl TokenIssuer for SequenceIssuer {
		fn issue<'a>(&'a self, _credentials: &'a ClientCredentials) -> IssueFuture<'a> {
			let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
			let expires_in = self.expires_in;

			Box::pin(async move { Ok(IssuedToken::new(format!("token-{call}"), expires_in)) })
		}
	}

	fn credentials() -> Option<ClientCredentials> {
		Some(ClientCredentials::new("client", "secret"))
	}

	#[tokio::test]
	async fn unconfigured_manager_never_calls_issuer() {
		let issuer = SequenceIssuer::new(Some(Duration::minutes(30)));
		let manager = TokenManager::new(issuer.clone(), None);
		let err = manager.ensure_valid().await.expect_err("Unconfigured manager should fail.");

		assert!(matches!(err, AuthError::Unconfigured));
		assert_eq!(manager.state(), TokenState::Unconfigured);
		assert_eq!(issuer.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn fresh_token_is_reused() {
		let issuer = SequenceIssuer::new(Some(Duration::minutes(30)));
		let manager = TokenManager::new(issuer.clone(), credentials());

		assert_eq!(manager.state(), TokenState::NoToken);

		let first = manager.ensure_valid().await.expect("First call should issue a token.");
		let second = manager.ensure_valid().await.expect("Second call should reuse the token.");

		assert_eq!(first.access_token.expose(), "token-1");
		assert_eq!(second.access_token.expose(), "token-1");
		assert_eq!(manager.state(), TokenState::Valid);
		assert_eq!(issuer.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn missing_expiry_uses_default_lifetime() {
		let manager = TokenManager::new(SequenceIssuer::new(None), credentials())
			.with_default_lifetime(Duration::minutes(10));
		let token = manager.ensure_valid().await.expect("Token without expiry should be accepted.");

		assert_eq!(token.expires_in, Duration::minutes(10));
	}

	#[tokio::test]
	async fn non_positive_expiry_is_rejected() {
		let manager = TokenManager::new(SequenceIssuer::new(Some(Duration::ZERO)), credentials());
		let err = manager.ensure_valid().await.expect_err("Zero lifetime should be refused.");

		assert!(matches!(err, AuthError::InvalidExpiry { .. }));
		assert_eq!(manager.state(), TokenState::RefreshFailed);
		assert_eq!(manager.metrics().failures(), 1);
	}

	#[tokio::test]
	async fn invalidate_only_drops_matching_token() {
		let issuer = SequenceIssuer::new(Some(Duration::minutes(30)));
		let manager = TokenManager::new(issuer.clone(), credentials());
		let first = manager.ensure_valid().await.expect("Initial token should be issued.");
		let second =
			manager.force_refresh(&first).await.expect("Forced refresh should issue a new token.");

		assert_eq!(second.access_token.expose(), "token-2");
		assert!(!manager.invalidate(&first));

		let third = manager
			.force_refresh(&first)
			.await
			.expect("Stale rejection should reuse the replacement token.");

		assert_eq!(third.access_token.expose(), "token-2");
		assert_eq!(issuer.calls.load(Ordering::SeqCst), 2);
	}
}
