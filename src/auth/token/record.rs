//! Immutable access-token record and its freshness rules.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Freshness of an [`OAuthToken`] at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is usable without contacting the token endpoint.
	Fresh,
	/// Token has not expired yet but is inside the refresh buffer.
	RefreshDue,
	/// Token exceeded its expiry instant.
	Expired,
}

/// Bearer token obtained through the client-credentials grant.
///
/// Records are replaced, never mutated, when the manager refreshes.
#[derive(Clone)]
pub struct OAuthToken {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Instant the token endpoint answered.
	pub obtained_at: OffsetDateTime,
	/// Lifetime granted by the token endpoint.
	pub expires_in: Duration,
}
impl OAuthToken {
	/// Creates a record for a freshly issued token.
	pub fn new(
		access_token: impl Into<String>,
		obtained_at: OffsetDateTime,
		expires_in: Duration,
	) -> Self {
		Self { access_token: TokenSecret::new(access_token), obtained_at, expires_in }
	}

	/// Absolute expiry instant.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.obtained_at + self.expires_in
	}

	/// Instant from which the token should be replaced.
	///
	/// Equals `expires_at - buffer`, except that a lifetime no longer than the buffer
	/// refreshes halfway through instead of immediately.
	pub fn refresh_at(&self, buffer: Duration) -> OffsetDateTime {
		if self.expires_in > buffer {
			self.expires_at() - buffer
		} else {
			self.obtained_at + self.expires_in / 2
		}
	}

	/// Computes the freshness status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime, buffer: Duration) -> TokenStatus {
		if instant >= self.expires_at() {
			return TokenStatus::Expired;
		}
		if instant >= self.refresh_at(buffer) {
			return TokenStatus::RefreshDue;
		}

		TokenStatus::Fresh
	}

	/// Returns `true` if the token can be handed out at the provided instant.
	pub fn is_fresh_at(&self, instant: OffsetDateTime, buffer: Duration) -> bool {
		matches!(self.status_at(instant, buffer), TokenStatus::Fresh)
	}

	/// Value for the `Authorization` header.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.access_token.expose())
	}
}
impl Debug for OAuthToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthToken")
			.field("access_token", &"<redacted>")
			.field("obtained_at", &self.obtained_at)
			.field("expires_in", &self.expires_in)
			.finish()
	}
}
