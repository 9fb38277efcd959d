//! Broker-level error types shared across the secret store, identity provider, and broker.

// self
use crate::{_prelude::*, config::BrokerConfigError, http::Endpoint};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
///
/// None of the variants are retried internally; every failure is terminal for the operation in
/// progress and is surfaced unchanged to the caller.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The local identity token could not be read.
	#[error(transparent)]
	Io(#[from] IdentityReadError),
	/// A remote service rejected the request or returned no usable token.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// A remote service answered with a body that does not match the expected JSON shape.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl Error {
	/// Remote endpoint the failure is attributed to, when one was involved.
	pub fn endpoint(&self) -> Option<Endpoint> {
		match self {
			Self::Auth(AuthError::Status { endpoint, .. })
			| Self::Auth(AuthError::MissingToken { endpoint, .. })
			| Self::Decode(DecodeError { endpoint, .. })
			| Self::Transport(TransportError::Network { endpoint, .. })
			| Self::Transport(TransportError::Io { endpoint, .. })
			| Self::Transport(TransportError::Other { endpoint, .. }) => Some(*endpoint),
			Self::Config(ConfigError::InvalidUrl { endpoint, .. }) => Some(*endpoint),
			_ => None,
		}
	}

	/// HTTP status observed for the failing call, if a response was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Auth(AuthError::Status { status, .. }) => Some(*status),
			Self::Decode(DecodeError { status, .. }) => Some(*status),
			_ => None,
		}
	}
}

/// Failure to load the workload's local identity token.
#[derive(Debug, ThisError)]
pub enum IdentityReadError {
	/// The token file could not be read.
	#[error("Failed to read the local identity token at {}.", .path.display())]
	Read {
		/// Path that was read.
		path: PathBuf,
		/// Underlying filesystem failure.
		#[source]
		source: std::io::Error,
	},
	/// The token file was read but its bytes are not UTF-8.
	#[error("The local identity token at {} is not valid UTF-8.", .path.display())]
	NotUtf8 {
		/// Path that was read.
		path: PathBuf,
		/// Decoding failure, which still owns the raw bytes.
		#[source]
		source: std::string::FromUtf8Error,
	},
}
impl IdentityReadError {
	/// Path of the identity token that failed to load.
	pub fn path(&self) -> &Path {
		match self {
			Self::Read { path, .. } | Self::NotUtf8 { path, .. } => path,
		}
	}
}

/// Authentication and authorization failures reported by the remote services.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// The remote call completed with an unexpected HTTP status.
	#[error("The {endpoint} request failed with HTTP status {status}.")]
	Status {
		/// Endpoint that was called.
		endpoint: Endpoint,
		/// Status code returned by the remote service.
		status: u16,
	},
	/// The response was successful but did not carry a usable token.
	#[error("The {endpoint} response did not carry a usable token: {response}.")]
	MissingToken {
		/// Endpoint that was called.
		endpoint: Endpoint,
		/// Decoded response rendered for diagnostics (secrets stay redacted).
		response: String,
	},
}

/// Response body did not match the expected JSON shape.
#[derive(Debug, ThisError)]
#[error("The {endpoint} response (HTTP {status}) is not valid JSON for the expected shape.")]
pub struct DecodeError {
	/// Endpoint that was called.
	pub endpoint: Endpoint,
	/// Status code attached to the undecodable body.
	pub status: u16,
	/// Structured parsing failure, including the failing JSON path.
	#[source]
	pub source: serde_path_to_error::Error<serde_json::error::Error>,
}

/// Configuration and request-construction failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Encode(#[from] serde_json::Error),
	/// An endpoint URL could not be derived from the configured base URL.
	#[error("The {endpoint} URL is invalid.")]
	InvalidUrl {
		/// Endpoint whose URL failed to parse.
		endpoint: Endpoint,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Broker configuration failed validation.
	#[error(transparent)]
	Invalid(#[from] BrokerConfigError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint that was called.
		endpoint: Endpoint,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the {endpoint} endpoint.")]
	Io {
		/// Endpoint that was called.
		endpoint: Endpoint,
		/// IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Transport reported a failure that carries only a message.
	#[error("HTTP client error occurred while calling the {endpoint} endpoint: {message}.")]
	Other {
		/// Endpoint that was called.
		endpoint: Endpoint,
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: Endpoint,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}
