//! Token-issuing endpoint contract consumed by the [`TokenManager`](crate::auth::TokenManager).

// self
use crate::{
	_prelude::*,
	auth::{ClientCredentials, TokenSecret},
	error::AuthError,
};

/// Boxed future returned by [`TokenIssuer::issue`].
pub type IssueFuture<'a> = Pin<Box<dyn Future<Output = Result<IssuedToken, AuthError>> + 'a + Send>>;

/// Performs one client-credentials exchange.
///
/// Implementations never retry on their own; the gateway owns retry policy.
pub trait TokenIssuer
where
	Self: Send + Sync,
{
	/// Exchanges `credentials` for a fresh access token.
	fn issue<'a>(&'a self, credentials: &'a ClientCredentials) -> IssueFuture<'a>;
}

/// Raw result of a successful exchange.
#[derive(Clone, Debug)]
pub struct IssuedToken {
	/// Access token returned by the endpoint.
	pub access_token: TokenSecret,
	/// Lifetime reported by the endpoint, if any.
	pub expires_in: Option<Duration>,
}
impl IssuedToken {
	/// Creates a new issued token.
	pub fn new(access_token: impl Into<String>, expires_in: Option<Duration>) -> Self {
		Self { access_token: TokenSecret::new(access_token), expires_in }
	}
}
