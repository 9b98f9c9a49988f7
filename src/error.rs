//! Service-level error types shared across the admission gate, handlers, and stream sessions.

// self
use crate::_prelude::*;

/// Service-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical service error exposed by public APIs.
///
/// Verification mismatches are never represented here; they travel as a plain `false`.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Stream transport failure (peer disconnect, send/receive error).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Signature bytes could not be interpreted.
	#[error(transparent)]
	Signature(#[from] SignatureError),

	/// Credential is missing, malformed, or was rejected by the auth policy.
	#[error("Request is unauthenticated: {reason}.")]
	Unauthenticated {
		/// Gate-supplied reason string.
		reason: String,
	},
	/// A message (or the aggregate of a batch) exceeds the configured size limit.
	#[error("Message of {size} bytes exceeds the {limit} byte limit.")]
	MessageTooLarge {
		/// Encoded size of the offending message.
		size: usize,
		/// Configured maximum message size.
		limit: usize,
	},
	/// Request payload is structurally invalid.
	#[error("Invalid argument: {reason}.")]
	InvalidArgument {
		/// Human-readable reason string.
		reason: String,
	},
	/// The method exists but is not offered on the surface that received the call.
	#[error("Method `{method}` is not supported on this surface.")]
	Unimplemented {
		/// Method label.
		method: String,
	},
	/// No method is registered under the requested path.
	#[error("Unknown method path `{path}`.")]
	UnknownMethod {
		/// Requested path.
		path: String,
	},
	/// The call's context was cancelled while the call was in progress.
	#[error("Call was cancelled.")]
	Cancelled,
}
impl Error {
	/// Builds an [`Error::Unauthenticated`] with the provided reason.
	pub fn unauthenticated(reason: impl Into<String>) -> Self {
		Self::Unauthenticated { reason: reason.into() }
	}

	/// Builds an [`Error::InvalidArgument`] with the provided reason.
	pub fn invalid_argument(reason: impl Into<String>) -> Self {
		Self::InvalidArgument { reason: reason.into() }
	}

	/// Returns the RPC status code reported to the peer for this error.
	pub fn code(&self) -> Code {
		match self {
			Self::Config(_) => Code::Internal,
			Self::Transport(_) => Code::Unavailable,
			Self::Signature(_) | Self::InvalidArgument { .. } => Code::InvalidArgument,
			Self::Unauthenticated { .. } => Code::Unauthenticated,
			Self::MessageTooLarge { .. } => Code::ResourceExhausted,
			Self::Unimplemented { .. } => Code::Unimplemented,
			Self::UnknownMethod { .. } => Code::NotFound,
			Self::Cancelled => Code::Cancelled,
		}
	}
}

/// RPC status codes surfaced to callers, numbered as in the gRPC status space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Code {
	/// The call was cancelled by its caller.
	Cancelled,
	/// The request carried an invalid argument.
	InvalidArgument,
	/// The requested method does not exist.
	NotFound,
	/// A size or quota limit was exceeded.
	ResourceExhausted,
	/// The method is not offered on this surface.
	Unimplemented,
	/// Unexpected internal failure.
	Internal,
	/// The transport went away.
	Unavailable,
	/// The caller did not present valid credentials.
	Unauthenticated,
}
impl Code {
	/// Numeric value of the code in the gRPC status space.
	pub const fn as_i32(self) -> i32 {
		match self {
			Code::Cancelled => 1,
			Code::InvalidArgument => 3,
			Code::NotFound => 5,
			Code::ResourceExhausted => 8,
			Code::Unimplemented => 12,
			Code::Internal => 13,
			Code::Unavailable => 14,
			Code::Unauthenticated => 16,
		}
	}

	/// HTTP status used by the JSON gateway for this code.
	pub const fn http_status(self) -> u16 {
		match self {
			Code::Cancelled => 499,
			Code::InvalidArgument => 400,
			Code::NotFound => 404,
			Code::ResourceExhausted => 429,
			Code::Unimplemented => 501,
			Code::Internal => 500,
			Code::Unavailable => 503,
			Code::Unauthenticated => 401,
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Code::Cancelled => "cancelled",
			Code::InvalidArgument => "invalid_argument",
			Code::NotFound => "not_found",
			Code::ResourceExhausted => "resource_exhausted",
			Code::Unimplemented => "unimplemented",
			Code::Internal => "internal",
			Code::Unavailable => "unavailable",
			Code::Unauthenticated => "unauthenticated",
		}
	}
}
impl Display for Code {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Configuration document could not be parsed.
	#[error("Configuration is malformed at `{path}`.")]
	Parse {
		/// Path to the offending field.
		path: String,
		/// Structured parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// Rate budget must admit at least one call per second.
	#[error("Rate limit must be at least one call per second.")]
	ZeroRateLimit,
	/// Burst size must be at least one.
	#[error("Rate limit burst must be at least one.")]
	ZeroBurst,
	/// Maximum message size must be positive.
	#[error("Maximum message size must be positive.")]
	ZeroMessageLimit,
	/// Authentication scheme name is empty or contains whitespace.
	#[error("Authentication scheme `{scheme}` is invalid.")]
	InvalidScheme {
		/// Rejected scheme name.
		scheme: String,
	},
	/// Listen address cannot be parsed.
	#[error("Listen address `{addr}` is invalid.")]
	InvalidAddress {
		/// Rejected address string.
		addr: String,
		/// Underlying parsing failure.
		#[source]
		source: std::net::AddrParseError,
	},
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::Parse { path, source: e.into_inner() }
	}
}

/// Stream transport failures; these abort the affected session only.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Peer went away before the session finished.
	#[error("Peer disconnected.")]
	Disconnected,
	/// Receiving the next stream item failed.
	#[error("Failed to receive the next stream item.")]
	Receive {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// Sending a response to the peer failed.
	#[error("Failed to send a stream response.")]
	Send {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific receive failure.
	pub fn receive(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Receive { source: Box::new(src) }
	}

	/// Wraps a transport-specific send failure.
	pub fn send(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Send { source: Box::new(src) }
	}
}

/// Signature bytes that cannot be interpreted by the signing primitive.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SignatureError {
	/// Signature length does not match the algorithm's fixed size.
	#[error("Signature is {actual} bytes; expected {expected}.")]
	Malformed {
		/// Length of the provided bytes.
		actual: usize,
		/// Length required by the algorithm.
		expected: usize,
	},
}
