//! Transport primitives shared by the token exchange and the states endpoint.
//!
//! The module exposes [`TokenHttpClient`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so callers can plug custom HTTP clients into the token issuer
//! without losing instrumentation. Implementations call [`ResponseMetadataSlot::take`]
//! before dispatching a request and [`ResponseMetadataSlot::store`] once an HTTP status or
//! retry hint is known, so token failures are classified with consistent metadata.
//!
//! [`RateLimitHeaders`] parses the quota headers OpenSky attaches to state responses.

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use reqwest::{
	header::{HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ConfigError};

/// Header carrying the remaining credit balance.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-rate-limit-remaining";
/// Header carrying the number of seconds until the quota resets.
pub const RATE_LIMIT_RETRY_AFTER_HEADER: &str = "x-rate-limit-retry-after-seconds";

/// Abstraction over HTTP transports capable of executing OAuth token exchanges while
/// publishing response metadata to the error mapper.
///
/// Implementations must be `Send + Sync + 'static` so they can be shared behind an
/// [`Arc`], and the handles they return must own whatever state is required so their
/// request futures remain `Send` for the lifetime of the in-flight exchange.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// # Metadata Contract
	///
	/// - Call [`ResponseMetadataSlot::take`] before submitting the HTTP request so stale
	///   information never leaks across attempts.
	/// - Once an HTTP response provides status headers, save them with
	///   [`ResponseMetadataSlot::store`].
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the endpoint, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Quota hints attached to a states response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RateLimitHeaders {
	/// Remaining credit balance, when the header was present and numeric.
	pub remaining: Option<u64>,
	/// Delay until the quota resets.
	pub retry_after: Option<Duration>,
}
impl RateLimitHeaders {
	/// Extracts quota hints from response headers.
	///
	/// `X-Rate-Limit-Retry-After-Seconds` wins over the generic `Retry-After` header.
	/// Unparseable values are dropped with a warning.
	pub fn from_headers(headers: &HeaderMap) -> Self {
		let remaining = headers.get(RATE_LIMIT_REMAINING_HEADER).and_then(|value| {
			let parsed = value.to_str().ok().and_then(|raw| raw.trim().parse::<u64>().ok());

			if parsed.is_none() {
				tracing::warn!(?value, "Ignoring unparseable rate-limit remaining header.");
			}

			parsed
		});
		let retry_after = headers
			.get(RATE_LIMIT_RETRY_AFTER_HEADER)
			.and_then(|value| value.to_str().ok())
			.and_then(parse_delay_seconds)
			.or_else(|| parse_retry_after(headers));

		Self { remaining, retry_after }
	}

	/// Returns `true` when neither hint was present.
	pub fn is_empty(&self) -> bool {
		self.remaining.is_none() && self.retry_after.is_none()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Neither the token endpoint nor the states endpoint is expected to redirect; configure any
/// custom [`ReqwestClient`] to disable redirect following.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client that never follows redirects and aborts requests after `timeout`.
	pub fn with_timeout(timeout: Duration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.redirect(Policy::none())
			.timeout(timeout.unsigned_abs())
			.build()?;

		Ok(Self(client))
	}

	/// Builds an instrumented HTTP client that captures response metadata.
	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot)
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl Debug for ReqwestHttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ReqwestHttpClient(..)")
	}
}

/// Instrumented adapter that implements [`AsyncHttpClient`] for reqwest.
pub(crate) struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle returned by [`ReqwestHttpClient`] that satisfies [`TokenHttpClient`].
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot }))
	}
}
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let retry_after = parse_retry_after(&headers);

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		self.instrumented(slot)
	}
}

fn parse_delay_seconds(raw: &str) -> Option<Duration> {
	let raw = raw.trim();

	if let Ok(secs) = raw.parse::<i64>() {
		return (secs >= 0).then(|| Duration::seconds(secs));
	}

	raw.parse::<f64>()
		.ok()
		.filter(|secs| secs.is_finite() && *secs >= 0.)
		.map(Duration::seconds_f64)
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Some(delay) = parse_delay_seconds(raw) {
		return Some(delay);
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	// self
	use super::*;

	fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
		let mut map = HeaderMap::new();

		for (name, value) in pairs {
			map.insert(*name, HeaderValue::from_static(value));
		}

		map
	}

	#[test]
	fn rate_limit_headers_prefer_opensky_names() {
		let parsed = RateLimitHeaders::from_headers(&headers(&[
			(RATE_LIMIT_REMAINING_HEADER, "0"),
			(RATE_LIMIT_RETRY_AFTER_HEADER, "60"),
			("retry-after", "5"),
		]));

		assert_eq!(parsed.remaining, Some(0));
		assert_eq!(parsed.retry_after, Some(Duration::seconds(60)));
	}

	#[test]
	fn rate_limit_headers_fall_back_to_retry_after() {
		let parsed = RateLimitHeaders::from_headers(&headers(&[("retry-after", "12")]));

		assert_eq!(parsed.remaining, None);
		assert_eq!(parsed.retry_after, Some(Duration::seconds(12)));
	}

	#[test]
	fn garbage_headers_are_ignored() {
		let parsed = RateLimitHeaders::from_headers(&headers(&[
			(RATE_LIMIT_REMAINING_HEADER, "plenty"),
			(RATE_LIMIT_RETRY_AFTER_HEADER, "-3"),
		]));

		assert!(parsed.is_empty());
		assert!(RateLimitHeaders::from_headers(&HeaderMap::new()).is_empty());
	}
}
