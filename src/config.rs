//! Startup parameters for the service and its admission gate.

// std
use std::net::SocketAddr;
// self
use crate::{_prelude::*, error::ConfigError};

/// How rate-limiter instances are shared between call kinds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimiterScope {
	/// One limiter for unary/batch calls and another for stream establishment.
	#[default]
	PerCallKind,
	/// A single limiter shared by every call.
	Global,
}

/// Service configuration with the defaults the service ships with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
	/// Listen address of the RPC endpoint.
	pub rpc_addr: String,
	/// Listen address of the JSON gateway endpoint.
	pub http_addr: String,
	/// Sustained admissions per second for each limiter.
	pub rate_limit_per_second: u32,
	/// Admissions that may be granted back-to-back after an idle period.
	pub rate_limit_burst: u32,
	/// Limiter sharing policy.
	pub limiter_scope: LimiterScope,
	/// Maximum encoded size of a single request message in bytes.
	pub max_message_size: usize,
	/// Authorization scheme expected in front of the bearer credential.
	pub auth_scheme: String,
}
impl ServiceConfig {
	/// Default RPC listen address.
	pub const DEFAULT_RPC_ADDR: &'static str = "[::]:10116";
	/// Default gateway listen address.
	pub const DEFAULT_HTTP_ADDR: &'static str = "[::]:8080";
	/// Default sustained rate budget.
	pub const DEFAULT_RATE_LIMIT: u32 = 120;
	/// Default receive limit, matching common RPC transports.
	pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;
	/// Default authorization scheme.
	pub const DEFAULT_AUTH_SCHEME: &'static str = "bearer";

	/// Parses a JSON configuration document; absent fields keep their defaults.
	pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
		let de = &mut serde_json::Deserializer::from_str(text);
		let config: Self = serde_path_to_error::deserialize(de)?;

		config.validate()?;

		Ok(config)
	}

	/// Overrides the sustained rate budget.
	pub fn with_rate_limit(mut self, per_second: u32) -> Self {
		self.rate_limit_per_second = per_second;

		self
	}

	/// Overrides the burst size.
	pub fn with_burst(mut self, burst: u32) -> Self {
		self.rate_limit_burst = burst;

		self
	}

	/// Overrides the limiter sharing policy.
	pub fn with_limiter_scope(mut self, scope: LimiterScope) -> Self {
		self.limiter_scope = scope;

		self
	}

	/// Overrides the maximum message size.
	pub fn with_max_message_size(mut self, bytes: usize) -> Self {
		self.max_message_size = bytes;

		self
	}

	/// Checks every field for values the service cannot run with.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.rate_limit_per_second == 0 {
			return Err(ConfigError::ZeroRateLimit);
		}
		if self.rate_limit_burst == 0 {
			return Err(ConfigError::ZeroBurst);
		}
		if self.max_message_size == 0 {
			return Err(ConfigError::ZeroMessageLimit);
		}
		if self.auth_scheme.is_empty() || self.auth_scheme.contains(char::is_whitespace) {
			return Err(ConfigError::InvalidScheme { scheme: self.auth_scheme.clone() });
		}

		self.rpc_socket_addr()?;
		self.http_socket_addr()?;

		Ok(())
	}

	/// Parsed RPC listen address.
	pub fn rpc_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
		parse_addr(&self.rpc_addr)
	}

	/// Parsed gateway listen address.
	pub fn http_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
		parse_addr(&self.http_addr)
	}
}
impl Default for ServiceConfig {
	fn default() -> Self {
		Self {
			rpc_addr: Self::DEFAULT_RPC_ADDR.into(),
			http_addr: Self::DEFAULT_HTTP_ADDR.into(),
			rate_limit_per_second: Self::DEFAULT_RATE_LIMIT,
			rate_limit_burst: 1,
			limiter_scope: LimiterScope::default(),
			max_message_size: Self::DEFAULT_MAX_MESSAGE_SIZE,
			auth_scheme: Self::DEFAULT_AUTH_SCHEME.into(),
		}
	}
}

fn parse_addr(addr: &str) -> Result<SocketAddr, ConfigError> {
	SocketAddr::from_str(addr)
		.map_err(|source| ConfigError::InvalidAddress { addr: addr.to_owned(), source })
}
