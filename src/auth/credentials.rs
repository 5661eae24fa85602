//! OAuth client credentials.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Client identifier + secret pair used for the client-credentials grant.
#[derive(Clone)]
pub struct ClientCredentials {
	client_id: String,
	client_secret: TokenSecret,
}
impl ClientCredentials {
	/// Wraps a client identifier and secret.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self { client_id: client_id.into(), client_secret: TokenSecret::new(client_secret) }
	}

	/// Builds credentials from optional parts, treating missing or blank values as
	/// "not configured".
	pub fn from_parts(client_id: Option<String>, client_secret: Option<String>) -> Option<Self> {
		let client_id = client_id.map(|id| id.trim().to_owned()).filter(|id| !id.is_empty())?;
		let client_secret = client_secret.filter(|secret| !secret.trim().is_empty())?;

		Some(Self::new(client_id, client_secret))
	}

	/// OAuth client identifier.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// OAuth client secret.
	pub fn client_secret(&self) -> &TokenSecret {
		&self.client_secret
	}
}
impl Debug for ClientCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentials")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn blank_parts_mean_unconfigured() {
		assert!(ClientCredentials::from_parts(None, Some("secret".into())).is_none());
		assert!(ClientCredentials::from_parts(Some("  ".into()), Some("secret".into())).is_none());
		assert!(ClientCredentials::from_parts(Some("id".into()), Some(String::new())).is_none());

		let credentials = ClientCredentials::from_parts(Some(" id ".into()), Some("hunter2".into()))
			.expect("Non-blank parts should produce credentials.");

		assert_eq!(credentials.client_id(), "id");
		assert_eq!(credentials.client_secret().expose(), "hunter2");
		assert!(!format!("{credentials:?}").contains("hunter2"));
	}
}
