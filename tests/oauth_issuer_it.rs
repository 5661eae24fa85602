mod common;

// std
use std::{
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	future::Future,
	pin::Pin,
	sync::Arc,
};
// crates.io
use httpmock::prelude::*;
use parking_lot::Mutex;
use time::Duration;
// self
use airspace_gateway::{
	auth::TokenIssuer,
	error::AuthError,
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	oauth::{
		OAuth2TokenIssuer, ReqwestTransportErrorMapper, TransportErrorMapper,
		oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse},
	},
	provider::{ClientAuthMethod, UpstreamDescriptor},
	url::Url,
};
use common::{CLIENT_ID, CLIENT_SECRET, TOKEN_PATH};

#[derive(Debug)]
enum FakeTransportError {
	Throttled,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Throttled => write!(f, "Transport throttled."),
		}
	}
}
impl StdError for FakeTransportError {}

#[derive(Clone, Copy)]
struct FakeHttpClient {
	retry_after: Duration,
}
impl TokenHttpClient for FakeHttpClient {
	type Handle = FakeHttpHandle;
	type TransportError = FakeTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		FakeHttpHandle { slot, retry_after: self.retry_after }
	}
}

struct FakeHttpHandle {
	slot: ResponseMetadataSlot,
	retry_after: Duration,
}
impl<'a> AsyncHttpClient<'a> for FakeHttpHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, _request: HttpRequest) -> Self::Future {
		let slot = self.slot.clone();
		let retry_after = self.retry_after;

		Box::pin(async move {
			assert!(
				slot.take().is_none(),
				"ResponseMetadataSlot must be clear before dispatching a request."
			);
			slot.store(ResponseMetadata { status: Some(429), retry_after: Some(retry_after) });

			Err(HttpClientError::Reqwest(Box::new(FakeTransportError::Throttled)))
		})
	}
}

#[derive(Clone, Default)]
struct RecordingTransportErrorMapper {
	metadata: Arc<Mutex<Vec<Option<ResponseMetadata>>>>,
}
impl TransportErrorMapper<FakeTransportError> for RecordingTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<FakeTransportError>,
	) -> AuthError {
		self.metadata.lock().push(meta.cloned());

		AuthError::TokenEndpoint {
			message: format!("Fake transport error: {err:?}"),
			status: meta.and_then(|value| value.status),
			retry_after: meta.and_then(|value| value.retry_after),
		}
	}
}

fn issuer(server: &MockServer, method: ClientAuthMethod) -> OAuth2TokenIssuer {
	let descriptor = UpstreamDescriptor::builder()
		.token_endpoint(
			Url::parse(&server.url(TOKEN_PATH)).expect("Mock token endpoint should parse."),
		)
		.states_endpoint(
			Url::parse(&server.url(common::STATES_PATH)).expect("Mock states endpoint should parse."),
		)
		.client_auth_method(method)
		.build()
		.expect("Mock upstream descriptor should build.");

	OAuth2TokenIssuer::from_descriptor(
		&descriptor,
		common::http_client(),
		ReqwestTransportErrorMapper,
	)
	.expect("Issuer should build from the mock descriptor.")
}

#[tokio::test]
async fn client_credentials_grant_posts_form_body() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.form_urlencoded_tuple("grant_type", "client_credentials")
				.form_urlencoded_tuple("client_id", CLIENT_ID)
				.form_urlencoded_tuple("client_secret", CLIENT_SECRET);
			then.status(200)
				.header("content-type", "application/json")
				.body(common::token_body("issued-token", 1_800));
		})
		.await;
	let issued = issuer(&server, ClientAuthMethod::ClientSecretPost)
		.issue(&common::credentials())
		.await
		.expect("Token exchange should succeed.");

	assert_eq!(issued.access_token.expose(), "issued-token");
	assert_eq!(issued.expires_in, Some(Duration::seconds(1_800)));

	mock.assert_async().await;
}

#[tokio::test]
async fn basic_auth_sends_credentials_in_header() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.header_exists("authorization")
				.form_urlencoded_tuple("grant_type", "client_credentials");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"basic-token\",\"token_type\":\"bearer\"}");
		})
		.await;
	let issued = issuer(&server, ClientAuthMethod::ClientSecretBasic)
		.issue(&common::credentials())
		.await
		.expect("Token exchange with basic auth should succeed.");

	assert_eq!(issued.access_token.expose(), "basic-token");
	assert_eq!(issued.expires_in, None);

	mock.assert_async().await;
}

#[tokio::test]
async fn invalid_client_is_rejected() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(401).header("content-type", "application/json").body(
				"{\"error\":\"invalid_client\",\"error_description\":\"Invalid client credentials\"}",
			);
		})
		.await;
	let err = issuer(&server, ClientAuthMethod::ClientSecretPost)
		.issue(&common::credentials())
		.await
		.expect_err("Invalid client credentials should be rejected.");

	match err {
		AuthError::Rejected { reason, status } => {
			assert_eq!(reason, "invalid_client: Invalid client credentials");
			assert_eq!(status, Some(401));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}
}

#[tokio::test]
async fn malformed_success_body_is_a_parse_failure() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body("{\"token\":1}");
		})
		.await;
	let err = issuer(&server, ClientAuthMethod::ClientSecretPost)
		.issue(&common::credentials())
		.await
		.expect_err("A body without access_token should fail to parse.");

	assert!(matches!(err, AuthError::TokenResponseParse { status: Some(200), .. }));
}

#[tokio::test]
async fn html_error_page_is_an_endpoint_failure() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(503)
				.header("content-type", "text/html")
				.header("retry-after", "7")
				.body("<html>Service Unavailable</html>");
		})
		.await;
	let err = issuer(&server, ClientAuthMethod::ClientSecretPost)
		.issue(&common::credentials())
		.await
		.expect_err("An HTML error page should fail the exchange.");

	match err {
		AuthError::TokenEndpoint { status, retry_after, .. } => {
			assert_eq!(status, Some(503));
			assert_eq!(retry_after, Some(Duration::seconds(7)));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}
}

#[tokio::test]
async fn fake_transport_metadata_reaches_the_mapper() {
	let descriptor = UpstreamDescriptor::builder()
		.token_endpoint(
			Url::parse("https://mock.example.com/token")
				.expect("Failed to parse mock token endpoint URL."),
		)
		.states_endpoint(
			Url::parse("https://mock.example.com/api/states/all")
				.expect("Failed to parse mock states endpoint URL."),
		)
		.build()
		.expect("Failed to build mock upstream descriptor.");
	let mapper = Arc::new(RecordingTransportErrorMapper::default());
	let issuer = <OAuth2TokenIssuer<FakeHttpClient, RecordingTransportErrorMapper>>::from_descriptor(
		&descriptor,
		FakeHttpClient { retry_after: Duration::seconds(30) },
		mapper.clone(),
	)
	.expect("Issuer should build with a fake transport.");

	for _ in 0..2 {
		let err = issuer
			.issue(&common::credentials())
			.await
			.expect_err("Request should be throttled with HTTP 429.");

		match err {
			AuthError::TokenEndpoint { status, retry_after, .. } => {
				assert_eq!(status, Some(429));
				assert_eq!(retry_after, Some(Duration::seconds(30)));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	let recorded = mapper.metadata.lock().clone();

	assert_eq!(recorded.len(), 2);
	assert!(recorded.iter().all(|meta| meta.as_ref().and_then(|value| value.status) == Some(429)));
}
