//! Fetches aircraft over a region through the gateway against a local mock of the upstream
//! API, showing the cache hit on the repeated query and the tracked credit balance.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use airspace_gateway::{
	auth::ClientCredentials,
	config::GatewayConfig,
	gateway::Gateway,
	http::ReqwestHttpClient,
	provider::UpstreamDescriptor,
	query::{BoundingBox, Query},
	reqwest::Client,
};

const STATES: &str = r#"{"time":1735732800,"states":[
	["3c6444","DLH9LF  ","Germany",1735732799,1735732800,-3.5679,40.4722,10972.8,false,231.4,45.2,0.0,null,11277.6,"1000",false,0]
]}"#;

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":1800}",
			);
		})
		.await;
	let states_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/states/all").header("authorization", "Bearer demo-access");
			then.status(200)
				.header("content-type", "application/json")
				.header("x-rate-limit-remaining", "3996")
				.body(STATES);
		})
		.await;
	let descriptor = UpstreamDescriptor::builder()
		.token_endpoint(Url::parse(&server.url("/token"))?)
		.states_endpoint(Url::parse(&server.url("/states/all"))?)
		.build()?;
	let config = GatewayConfig::new(descriptor)
		.with_credentials(Some(ClientCredentials::new("demo-client", "super-secret")));
	// The mock server presents a self-signed certificate.
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let gateway = Gateway::with_http_clients(config, http_client.clone(), http_client)?;
	let query = Query::region(BoundingBox::new(40., 41., -4., -3.)?).with_limit(10);

	println!("Estimated cost: {} credit(s).", gateway.estimate_cost(&query));

	for _ in 0..2 {
		let fetched = gateway.fetch(&query).await?;

		println!(
			"{} aircraft at {} ({:?}); {:?} credits remaining.",
			fetched.states.len(),
			fetched.states.time,
			fetched.origin,
			fetched.rate_limit.remaining,
		);
	}

	token_mock.assert_async().await;
	states_mock.assert_async().await;

	Ok(())
}
