//! Upstream descriptor data structures shared by the token manager and the gateway.

/// Builder API for assembling upstream descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::_prelude::*;

/// OpenSky's OpenID Connect token endpoint.
pub const OPENSKY_TOKEN_ENDPOINT: &str =
	"https://auth.opensky-network.org/auth/realms/opensky-network/protocol/openid-connect/token";
/// OpenSky's state-vector endpoint.
pub const OPENSKY_STATES_ENDPOINT: &str = "https://opensky-network.org/api/states/all";

/// Preferred client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	#[default]
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Endpoint set declared by an upstream descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamEndpoints {
	/// Token endpoint used for the client-credentials grant.
	pub token: Url,
	/// State-vector query endpoint.
	pub states: Url,
}

/// Immutable upstream descriptor consumed by the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamDescriptor {
	/// Endpoint definitions exposed by upstream.
	pub endpoints: UpstreamEndpoints,
	/// Preferred client authentication mechanism.
	pub client_auth_method: ClientAuthMethod,
}
impl UpstreamDescriptor {
	/// Creates a new builder.
	pub fn builder() -> UpstreamDescriptorBuilder {
		UpstreamDescriptorBuilder::new()
	}

	/// Descriptor for the public OpenSky Network deployment.
	pub fn opensky() -> Result<Self, crate::error::ConfigError> {
		let token = Url::parse(OPENSKY_TOKEN_ENDPOINT)
			.map_err(|source| crate::error::ConfigError::InvalidDescriptor { source })?;
		let states = Url::parse(OPENSKY_STATES_ENDPOINT)
			.map_err(|source| crate::error::ConfigError::InvalidDescriptor { source })?;

		Ok(Self::builder().token_endpoint(token).states_endpoint(states).build()?)
	}
}
