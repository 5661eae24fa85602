//! Shared helpers for the fetch path (per-key guards, status classification).

// crates.io
use reqwest::StatusCode;
// self
use crate::{
	_prelude::*,
	error::{ConnectionError, ServerError},
	gateway::Gateway,
	query::QueryKey,
};

/// How the fetch loop reacts to an upstream status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UpstreamVerdict {
	Success,
	TokenRejected,
	RateLimited,
	ServerFailure,
	Unexpected,
}
impl UpstreamVerdict {
	pub(crate) fn classify(status: StatusCode) -> Self {
		match status {
			status if status.is_success() => Self::Success,
			StatusCode::UNAUTHORIZED => Self::TokenRejected,
			StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
			status if status.is_server_error() => Self::ServerFailure,
			_ => Self::Unexpected,
		}
	}
}

/// Per-key singleflight state: the fetch lock plus the outcome of the last completed fetch.
#[derive(Debug, Default)]
pub(crate) struct FetchFlight {
	lock: AsyncMutex<()>,
	slot: Mutex<FlightSlot>,
}
impl FetchFlight {
	/// Current completion counter; compare after locking to detect a finished leader.
	pub(crate) fn epoch(&self) -> u64 {
		self.slot.lock().epoch
	}

	/// Failure recorded by a fetch that completed after `observed`, if any.
	pub(crate) fn failure_since(&self, observed: u64) -> Option<Error> {
		let slot = self.slot.lock();

		if slot.epoch == observed { None } else { slot.failure.clone() }
	}

	/// Publishes the outcome of a finished upstream fetch to the waiters.
	pub(crate) fn complete<T>(&self, result: &Result<T>) {
		let mut slot = self.slot.lock();

		slot.epoch = slot.epoch.wrapping_add(1);
		slot.failure = result.as_ref().err().cloned();
	}

	pub(crate) async fn lock(&self) -> async_lock::MutexGuard<'_, ()> {
		self.lock.lock().await
	}
}

#[derive(Debug, Default)]
struct FlightSlot {
	epoch: u64,
	failure: Option<Error>,
}

/// Singleflight lease for one cache key; unused flights are pruned when the lease drops.
pub(crate) struct FetchLease<'a> {
	flights: &'a Mutex<HashMap<QueryKey, Arc<FetchFlight>>>,
	key: QueryKey,
	flight: Arc<FetchFlight>,
}
impl<'a> FetchLease<'a> {
	/// Returns (and creates on demand) the flight for `key`.
	pub(crate) fn acquire(gateway: &'a Gateway, key: &QueryKey) -> Self {
		let flight = gateway.fetch_flights.lock().entry(key.clone()).or_default().clone();

		Self { flights: &gateway.fetch_flights, key: key.clone(), flight }
	}

	pub(crate) fn flight(&self) -> &FetchFlight {
		&self.flight
	}
}
impl Drop for FetchLease<'_> {
	fn drop(&mut self) {
		let mut flights = self.flights.lock();

		// One reference in the map plus ours: nobody else is waiting.
		if Arc::strong_count(&self.flight) == 2 {
			flights.remove(&self.key);
		}
	}
}

/// Splits request-assembly failures from transport failures.
pub(crate) fn map_send_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		ServerError::RequestBuild { source: Arc::new(err) }.into()
	} else {
		ConnectionError::from(err).into()
	}
}
