//! Best-effort mirror of the upstream credit balance.
//!
//! The tracker never makes decisions; the gateway feeds it after every upstream exchange and
//! callers read it through [`RateLimitTracker::snapshot`]. Concurrent updates are
//! last-writer-wins.

// self
use crate::_prelude::*;

/// Point-in-time view of upstream quota.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
	/// Remaining credits as last reported by upstream; `None` until first observed.
	pub remaining: Option<u64>,
	/// Instant after which upstream accepts requests again, set by a 429.
	pub reset_at: Option<OffsetDateTime>,
	/// Instant of the last update carrying quota metadata.
	pub updated_at: Option<OffsetDateTime>,
	/// Locally estimated credits consumed by upstream calls.
	pub credits_spent: u64,
}
impl RateLimitState {
	/// Returns `true` while a reset instant lies in the future or no credits remain.
	pub fn is_limited_at(&self, now: OffsetDateTime) -> bool {
		match self.reset_at {
			Some(reset_at) => now < reset_at,
			None => self.remaining == Some(0),
		}
	}

	/// Time left until the reset instant, if one is pending.
	pub fn retry_after_at(&self, now: OffsetDateTime) -> Option<Duration> {
		self.reset_at.map(|reset_at| reset_at - now).filter(|wait| wait.is_positive())
	}
}

/// Shared, process-local rate-limit observation point.
#[derive(Debug, Default)]
pub struct RateLimitTracker(RwLock<RateLimitState>);
impl RateLimitTracker {
	/// Creates a tracker with unknown quota.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records upstream metadata using the system clock.
	pub fn update(&self, remaining: Option<u64>, retry_after: Option<Duration>) {
		self.update_at(remaining, retry_after, OffsetDateTime::now_utc());
	}

	/// Records upstream metadata observed at `now`; absent fields keep their previous value.
	pub fn update_at(
		&self,
		remaining: Option<u64>,
		retry_after: Option<Duration>,
		now: OffsetDateTime,
	) {
		if remaining.is_none() && retry_after.is_none() {
			return;
		}

		let mut state = self.0.write();

		if let Some(remaining) = remaining {
			state.remaining = Some(remaining);
		}
		if let Some(retry_after) = retry_after {
			state.reset_at = Some(now + retry_after);
		}

		state.updated_at = Some(now);
	}

	/// Clears a pending reset after a successful call.
	pub fn clear_reset(&self) {
		self.0.write().reset_at = None;
	}

	/// Adds `credits` to the locally estimated spend.
	pub fn record_spent(&self, credits: u8) {
		let mut state = self.0.write();

		state.credits_spent = state.credits_spent.saturating_add(u64::from(credits));
	}

	/// Copy of the current state.
	pub fn snapshot(&self) -> RateLimitState {
		*self.0.read()
	}

	/// Returns `true` if upstream is expected to reject requests at `now`.
	pub fn is_limited_at(&self, now: OffsetDateTime) -> bool {
		self.0.read().is_limited_at(now)
	}
}
