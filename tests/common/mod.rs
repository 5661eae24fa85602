//! Shared fixtures for integration tests.

#![allow(dead_code)]

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use httpmock::prelude::*;
use time::Duration;
// self
use airspace_gateway::{
	auth::{ClientCredentials, IssueFuture, IssuedToken, TokenIssuer},
	config::GatewayConfig,
	error::AuthError,
	http::ReqwestHttpClient,
	provider::UpstreamDescriptor,
	reqwest::Client,
	url::Url,
};

pub const CLIENT_ID: &str = "gateway-client";
pub const CLIENT_SECRET: &str = "gateway-secret";
pub const TOKEN_PATH: &str = "/auth/token";
pub const STATES_PATH: &str = "/api/states/all";

/// Two aircraft inside the reference default region.
pub const STATES_BODY: &str = r#"{
	"time": 1735732800,
	"states": [
		["3c6444", "DLH9LF  ", "Germany", 1735732799, 1735732800, -3.5679, 40.4722,
		 10972.8, false, 231.4, 45.2, 0.0, null, 11277.6, "1000", false, 0, 3],
		["34718e", "IBE3456 ", "Spain", 1735732798, 1735732800, -3.7, 40.5,
		 3048.0, false, 150.0, 180.0, -5.0, null, 3100.0, null, false, 0]
	]
}"#;

/// Reqwest transport that trusts the self-signed certificate `httpmock` serves.
pub fn http_client() -> ReqwestHttpClient {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

pub fn token_body(access_token: &str, expires_in: u64) -> String {
	format!(
		"{{\"access_token\":\"{access_token}\",\"token_type\":\"Bearer\",\"expires_in\":{expires_in}}}"
	)
}

pub fn descriptor(server: &MockServer) -> UpstreamDescriptor {
	UpstreamDescriptor::builder()
		.token_endpoint(
			Url::parse(&server.url(TOKEN_PATH)).expect("Mock token endpoint should parse."),
		)
		.states_endpoint(
			Url::parse(&server.url(STATES_PATH)).expect("Mock states endpoint should parse."),
		)
		.build()
		.expect("Mock upstream descriptor should build.")
}

pub fn credentials() -> ClientCredentials {
	ClientCredentials::new(CLIENT_ID, CLIENT_SECRET)
}

pub fn config(server: &MockServer, credentials: Option<ClientCredentials>) -> GatewayConfig {
	GatewayConfig::new(descriptor(server)).with_credentials(credentials)
}

/// Scripted token issuer that counts its calls.
///
/// Call `n` (1-based) returns `token-n`, or fails when `n` is listed in `failing_calls`.
pub struct FakeIssuer {
	calls: AtomicUsize,
	delay: StdDuration,
	expires_in: Option<Duration>,
	failing_calls: Vec<usize>,
}
impl FakeIssuer {
	pub fn new() -> Self {
		Self {
			calls: AtomicUsize::new(0),
			delay: StdDuration::ZERO,
			expires_in: Some(Duration::minutes(30)),
			failing_calls: Vec::new(),
		}
	}

	pub fn with_delay(mut self, delay: StdDuration) -> Self {
		self.delay = delay;

		self
	}

	pub fn with_expires_in(mut self, expires_in: Option<Duration>) -> Self {
		self.expires_in = expires_in;

		self
	}

	pub fn failing_on(mut self, calls: impl IntoIterator<Item = usize>) -> Self {
		self.failing_calls = calls.into_iter().collect();

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn shared(self) -> Arc<Self> {
		Arc::new(self)
	}
}
impl TokenIssuer for FakeIssuer {
	fn issue<'a>(&'a self, _credentials: &'a ClientCredentials) -> IssueFuture<'a> {
		Box::pin(async move {
			let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}
			if self.failing_calls.contains(&call) {
				return Err(AuthError::Rejected {
					reason: format!("scripted failure on call {call}"),
					status: Some(401),
				});
			}

			Ok(IssuedToken::new(format!("token-{call}"), self.expires_in))
		})
	}
}
