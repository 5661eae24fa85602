// self
use crate::{
	_prelude::*,
	provider::{ClientAuthMethod, UpstreamDescriptor, UpstreamEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum DescriptorError {
	/// Token endpoint is mandatory.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// States endpoint is mandatory.
	#[error("Missing states endpoint.")]
	MissingStatesEndpoint,
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Builder for [`UpstreamDescriptor`] values.
#[derive(Debug, Default)]
pub struct UpstreamDescriptorBuilder {
	/// Token endpoint used for the client-credentials grant.
	pub token_endpoint: Option<Url>,
	/// State-vector query endpoint.
	pub states_endpoint: Option<Url>,
	/// Preferred client authentication method for the token endpoint.
	pub client_auth_method: ClientAuthMethod,
}
impl UpstreamDescriptorBuilder {
	/// Creates an empty builder.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the states endpoint.
	pub fn states_endpoint(mut self, url: Url) -> Self {
		self.states_endpoint = Some(url);

		self
	}

	/// Overrides the preferred client authentication method.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<UpstreamDescriptor, DescriptorError> {
		let token = self.token_endpoint.ok_or(DescriptorError::MissingTokenEndpoint)?;
		let states = self.states_endpoint.ok_or(DescriptorError::MissingStatesEndpoint)?;
		let descriptor = UpstreamDescriptor {
			endpoints: UpstreamEndpoints { token, states },
			client_auth_method: self.client_auth_method,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl UpstreamDescriptor {
	/// Validates invariants for the descriptor.
	fn validate(&self) -> Result<(), DescriptorError> {
		validate_endpoint("token", &self.endpoints.token)?;
		validate_endpoint("states", &self.endpoints.states)?;

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), DescriptorError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(DescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
		Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	}
}
