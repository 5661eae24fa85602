//! Gateway-level error types: the closed set surfaced by [`Gateway::fetch`] plus the
//! construction-time [`ConfigError`].
//!
//! [`Gateway::fetch`]: crate::gateway::Gateway::fetch

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by [`Gateway::fetch`](crate::gateway::Gateway::fetch).
///
/// Every variant maps onto exactly one [`ErrorKind`]; callers that only care about the
/// category should match on [`Error::kind`]. The type is `Clone` so the outcome of one
/// upstream call can be handed to every caller that waited on it.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// A token could not be obtained or refreshed, or the retry budget ran out.
	#[error(transparent)]
	Authentication(#[from] AuthError),
	/// Upstream signaled quota exhaustion.
	#[error("Upstream rate limit exceeded.")]
	RateLimit {
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Network or transport failure while reaching upstream.
	#[error(transparent)]
	Connection(#[from] ConnectionError),
	/// Upstream was reachable but answered with a server-side failure.
	#[error("Upstream server returned HTTP {status}.")]
	ExternalServer {
		/// HTTP status code returned by upstream.
		status: u16,
	},
	/// Internal fault (malformed payload, broken invariant).
	#[error(transparent)]
	Server(#[from] ServerError),
}
impl Error {
	/// Returns the closed-set category of this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Authentication(_) => ErrorKind::Authentication,
			Self::RateLimit { .. } => ErrorKind::RateLimit,
			Self::Connection(_) => ErrorKind::Connection,
			Self::ExternalServer { .. } => ErrorKind::ExternalServer,
			Self::Server(_) => ErrorKind::Server,
		}
	}

	/// Retry-After hint carried by [`Error::RateLimit`].
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::RateLimit { retry_after } => *retry_after,
			_ => None,
		}
	}
}

/// Error categories surfaced to collaborators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
	/// `AUTHENTICATION_ERROR`.
	#[serde(rename = "AUTHENTICATION_ERROR")]
	Authentication,
	/// `RATE_LIMIT`.
	#[serde(rename = "RATE_LIMIT")]
	RateLimit,
	/// `CONNECTION_ERROR`.
	#[serde(rename = "CONNECTION_ERROR")]
	Connection,
	/// `EXTERNAL_SERVER_ERROR`.
	#[serde(rename = "EXTERNAL_SERVER_ERROR")]
	ExternalServer,
	/// `SERVER_ERROR`.
	#[serde(rename = "SERVER_ERROR")]
	Server,
}
impl ErrorKind {
	/// Returns the stable wire label for the category.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Authentication => "AUTHENTICATION_ERROR",
			Self::RateLimit => "RATE_LIMIT",
			Self::Connection => "CONNECTION_ERROR",
			Self::ExternalServer => "EXTERNAL_SERVER_ERROR",
			Self::Server => "SERVER_ERROR",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Token acquisition failures.
///
/// The type is `Clone` so one failed refresh can be handed to every caller that waited on
/// it; underlying sources are shared through [`Arc`].
#[derive(Clone, Debug, ThisError)]
pub enum AuthError {
	/// No client credentials were configured.
	#[error("OAuth client credentials are not configured.")]
	Unconfigured,
	/// Token endpoint rejected the client (bad id/secret, disabled client).
	#[error("Token endpoint rejected the client: {reason}.")]
	Rejected {
		/// Provider-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint answered with something other than a token or an OAuth error.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from the token endpoint, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint returned an unusable `expires_in`.
	#[error("Token endpoint returned an invalid expires_in: {reason}.")]
	InvalidExpiry {
		/// Why the value was refused.
		reason: &'static str,
	},
	/// Network failure while calling the token endpoint.
	#[error("Network error occurred while calling the token endpoint.")]
	Transport {
		/// Transport-specific failure.
		#[source]
		source: SharedError,
	},
	/// Upstream kept rejecting freshly issued tokens.
	#[error("Upstream rejected the access token after {attempts} attempts.")]
	RetriesExhausted {
		/// Number of upstream attempts made.
		attempts: u32,
	},
	/// Upstream rejected an unauthenticated request.
	#[error("Upstream rejected the anonymous request.")]
	AnonymousRejected,
}
impl AuthError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { source: Arc::new(src) }
	}
}

/// Failures reaching the states endpoint.
#[derive(Clone, Debug, ThisError)]
pub enum ConnectionError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the states endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// The states request exceeded its timeout.
	#[error("Request to the states endpoint timed out.")]
	Timeout,
	/// Upstream answered with a status the gateway does not handle.
	#[error("Failed to communicate with the states endpoint (HTTP {status}).")]
	UnexpectedStatus {
		/// HTTP status code returned by upstream.
		status: u16,
	},
}
impl ConnectionError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Arc::new(src) }
	}
}
impl From<ReqwestError> for ConnectionError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

/// Internal faults not attributable to upstream or the caller.
#[derive(Clone, Debug, ThisError)]
pub enum ServerError {
	/// The states payload could not be parsed.
	#[error("States endpoint returned a malformed payload at `{path}`.")]
	MalformedPayload {
		/// JSON path of the failing element; `.` for the document root.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: Arc<serde_json::Error>,
	},
	/// The states request could not be assembled.
	#[error("States request could not be built.")]
	RequestBuild {
		/// Underlying builder failure.
		#[source]
		source: SharedError,
	},
}
impl ServerError {
	/// Wraps a payload parsing failure located at `path`.
	pub fn malformed_payload(path: impl Into<String>, source: serde_json::Error) -> Self {
		Self::MalformedPayload { path: path.into(), source: Arc::new(source) }
	}
}

/// Configuration and validation failures raised while constructing a gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::DescriptorError),
	/// An environment variable holds an unusable value.
	#[error("Environment variable `{name}` is invalid: {reason}.")]
	InvalidEnv {
		/// Variable name.
		name: &'static str,
		/// Why the value was refused.
		reason: String,
	},
	/// The default region is not a valid bounding box.
	#[error(transparent)]
	DefaultRegion(#[from] crate::query::QueryError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
