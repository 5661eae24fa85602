//! Client-credentials exchange built on the `oauth2` crate.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, HttpClientError, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::{ClientCredentials, IssueFuture, IssuedToken, TokenIssuer},
	error::{AuthError, ConfigError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{ClientAuthMethod, UpstreamDescriptor},
};

/// Maps HTTP transport failures into [`AuthError`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a token failure.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> AuthError;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> AuthError {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
			HttpClientError::Http(inner) => AuthError::transport(inner),
			HttpClientError::Io(inner) => AuthError::transport(inner),
			HttpClientError::Other(message) => AuthError::TokenEndpoint {
				message: format!("HTTP client error: {message}"),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			},
			_ => AuthError::TokenEndpoint {
				message: "unknown HTTP client error".into(),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			},
		}
	}
}

/// [`TokenIssuer`] performing the client-credentials grant against a token endpoint.
pub struct OAuth2TokenIssuer<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: TokenHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	token_url: TokenUrl,
	auth_method: ClientAuthMethod,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> OAuth2TokenIssuer<C, M>
where
	C: TokenHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	/// Builds an issuer for the descriptor's token endpoint.
	pub fn from_descriptor(
		descriptor: &UpstreamDescriptor,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self, ConfigError> {
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;

		Ok(Self {
			token_url,
			auth_method: descriptor.client_auth_method,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}
}
impl<C, M> TokenIssuer for OAuth2TokenIssuer<C, M>
where
	C: TokenHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	fn issue<'a>(&'a self, credentials: &'a ClientCredentials) -> IssueFuture<'a> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let mut client = BasicClient::new(ClientId::new(credentials.client_id().to_owned()))
				.set_client_secret(ClientSecret::new(
					credentials.client_secret().expose().to_owned(),
				))
				.set_token_uri(self.token_url.clone());

			if matches!(self.auth_method, ClientAuthMethod::ClientSecretPost) {
				client = client.set_auth_type(AuthType::RequestBody);
			}

			let response = client
				.exchange_client_credentials()
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;
			let expires_in = match response.expires_in() {
				Some(lifetime) => Some(Duration::seconds(
					i64::try_from(lifetime.as_secs())
						.map_err(|_| AuthError::InvalidExpiry { reason: "the value is out of range" })?,
				)),
				None => None,
			};

			Ok(IssuedToken::new(response.access_token().secret().to_owned(), expires_in))
		})
	}
}
impl<C, M> Debug for OAuth2TokenIssuer<C, M>
where
	C: TokenHttpClient,
	M: TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2TokenIssuer")
			.field("token_url", &self.token_url.as_str())
			.field("auth_method", &self.auth_method)
			.finish()
	}
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> AuthError
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response, meta_ref),
		RequestTokenError::Request(error) => mapper.map_transport_error(meta_ref, error),
		RequestTokenError::Parse(error, _body) => match meta_status(meta_ref) {
			// A non-JSON error page is an endpoint failure, not a malformed token.
			Some(status) if status >= 400 => AuthError::TokenEndpoint {
				message: format!("HTTP {status}"),
				status: Some(status),
				retry_after: meta_retry_after(meta_ref),
			},
			status => AuthError::TokenResponseParse { source: Arc::new(error), status },
		},
		RequestTokenError::Other(message) => AuthError::TokenEndpoint {
			message,
			status: meta_status(meta_ref),
			retry_after: meta_retry_after(meta_ref),
		},
	}
}

fn map_server_response_error(
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> AuthError {
	let reason = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	AuthError::Rejected { reason, status: meta_status(meta) }
}

fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> AuthError {
	if err.is_timeout() {
		return AuthError::TokenEndpoint {
			message: "request timed out".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		};
	}

	AuthError::transport(err)
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn descriptor(method: ClientAuthMethod) -> UpstreamDescriptor {
		UpstreamDescriptor::builder()
			.token_endpoint(
				Url::parse("https://example.com/oauth2/token")
					.expect("Failed to parse token endpoint URL."),
			)
			.states_endpoint(
				Url::parse("https://example.com/api/states/all")
					.expect("Failed to parse states endpoint URL."),
			)
			.client_auth_method(method)
			.build()
			.expect("Failed to build upstream descriptor.")
	}

	#[test]
	fn builds_issuer_for_both_auth_methods() {
		for method in [ClientAuthMethod::ClientSecretBasic, ClientAuthMethod::ClientSecretPost] {
			let issuer =
				<OAuth2TokenIssuer<ReqwestHttpClient, ReqwestTransportErrorMapper>>::from_descriptor(
					&descriptor(method),
					ReqwestHttpClient::default(),
					ReqwestTransportErrorMapper,
				)
				.expect("Issuer should build from a valid descriptor.");

			assert!(format!("{issuer:?}").contains("example.com/oauth2/token"));
		}
	}

	#[test]
	fn parse_failures_with_error_status_become_endpoint_errors() {
		let source = serde_path_to_error::deserialize::<_, u8>(
			&mut serde_json::Deserializer::from_str("\"nope\""),
		)
		.expect_err("A string should not deserialize into u8.");
		let meta = ResponseMetadata { status: Some(503), retry_after: None };
		let err = map_request_error::<ReqwestError, _>(
			Some(meta),
			RequestTokenError::Parse(source, b"<html>".to_vec()),
			&ReqwestTransportErrorMapper,
		);

		assert!(matches!(err, AuthError::TokenEndpoint { status: Some(503), .. }));
	}
}
