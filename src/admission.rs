//! Admission gate applied to every inbound call before it reaches application logic.
//!
//! The gate runs the [`Authenticator`] first and only then consumes a rate slot, so rejected
//! calls never spend limiter budget. Calls addressed to a bypass service (the reflection
//! surface by default) skip both checks.

pub mod auth;
pub mod limiter;

pub use auth::*;
pub use limiter::*;

// self
use crate::{
	_prelude::*,
	config::{LimiterScope, ServiceConfig},
	error::ConfigError,
	obs::{self, CallMetrics},
};

/// Service name of the reflection surface that bypasses the gate.
pub const REFLECTION_SERVICE: &str = "grpc.reflection.v1alpha.ServerReflection";

/// Shape of an inbound call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Unary or batch request/response.
	Unary,
	/// Bidirectional stream.
	Streaming,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::Unary => "unary",
			CallKind::Streaming => "streaming",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Identifies the service + method a call targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallInfo {
	/// Fully-qualified service name.
	pub service: &'static str,
	/// Method name within the service.
	pub method: &'static str,
	/// Call shape.
	pub kind: CallKind,
}
impl CallInfo {
	/// Describes a call.
	pub const fn new(service: &'static str, method: &'static str, kind: CallKind) -> Self {
		Self { service, method, kind }
	}
}

/// Call metadata (headers) with case-insensitive keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallMetadata(BTreeMap<String, Vec<String>>);
impl CallMetadata {
	/// Creates empty metadata.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a value under `key` and returns the metadata.
	pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
		self.append(key, value);

		self
	}

	/// Appends a value under `key`.
	pub fn append(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
		self.0.entry(key.as_ref().to_ascii_lowercase()).or_default().push(value.into());
	}

	/// First value stored under `key`.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(&key.to_ascii_lowercase()).and_then(|values| values.first()).map(String::as_str)
	}

	/// Every value stored under `key`, in insertion order.
	pub fn get_all(&self, key: &str) -> &[String] {
		self.0.get(&key.to_ascii_lowercase()).map(Vec::as_slice).unwrap_or_default()
	}

	/// Whether no entries are present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl<K, V> FromIterator<(K, V)> for CallMetadata
where
	K: AsRef<str>,
	V: Into<String>,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
	{
		let mut metadata = Self::new();

		for (key, value) in iter {
			metadata.append(key, value);
		}

		metadata
	}
}

/// Outcome of a successful pass through the gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
	/// The call targets a bypass service; no checks ran.
	Bypassed,
	/// Both checks passed.
	Admitted {
		/// Credential the call presented.
		credential: BearerToken,
		/// Rate slot the call consumed.
		token: RateToken,
	},
}

/// Ordered authentication + rate-limit decision shared by every call.
#[derive(Clone)]
pub struct AdmissionGate {
	authenticator: Authenticator,
	unary: Arc<dyn RateLimit>,
	streaming: Arc<dyn RateLimit>,
	bypass: BTreeSet<&'static str>,
	metrics: Arc<CallMetrics>,
}
impl AdmissionGate {
	/// Creates a gate with separate limiters for unary and streaming calls.
	pub fn new(
		authenticator: Authenticator,
		unary: Arc<dyn RateLimit>,
		streaming: Arc<dyn RateLimit>,
	) -> Self {
		Self {
			authenticator,
			unary,
			streaming,
			bypass: BTreeSet::from([REFLECTION_SERVICE]),
			metrics: Default::default(),
		}
	}

	/// Creates a gate whose single limiter is shared by every call kind.
	pub fn with_shared_limiter(authenticator: Authenticator, limiter: Arc<dyn RateLimit>) -> Self {
		Self::new(authenticator, limiter.clone(), limiter)
	}

	/// Builds the gate described by `config` around the supplied auth policy.
	pub fn from_config(
		config: &ServiceConfig,
		policy: Arc<dyn AuthPolicy>,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		let authenticator = Authenticator::new(config.auth_scheme.clone(), policy);
		let build = || -> Result<Arc<dyn RateLimit>, ConfigError> {
			let bucket = LeakyBucket::per_second(config.rate_limit_per_second)?
				.with_burst(config.rate_limit_burst)?;

			Ok(Arc::new(bucket))
		};
		let gate = match config.limiter_scope {
			LimiterScope::PerCallKind => Self::new(authenticator, build()?, build()?),
			LimiterScope::Global => Self::with_shared_limiter(authenticator, build()?),
		};

		Ok(gate)
	}

	/// Adds another service whose calls skip the gate.
	pub fn with_bypass(mut self, service: &'static str) -> Self {
		self.bypass.insert(service);

		self
	}

	/// Replaces the counters the gate records into.
	pub fn with_metrics(mut self, metrics: Arc<CallMetrics>) -> Self {
		self.metrics = metrics;

		self
	}

	/// Counters recorded by this gate.
	pub fn metrics(&self) -> &Arc<CallMetrics> {
		&self.metrics
	}

	/// Whether calls to `call.service` skip both checks.
	pub fn bypasses(&self, call: &CallInfo) -> bool {
		self.bypass.contains(call.service)
	}

	/// Runs the gate for one call.
	///
	/// Authentication failures return before the limiter is consulted. Rate pressure only delays
	/// the returned future; it never produces an error.
	pub async fn admit(&self, call: &CallInfo, metadata: &CallMetadata) -> Result<Admission> {
		if self.bypasses(call) {
			obs::event!(debug, service = call.service, method = call.method, "admission bypassed");

			return Ok(Admission::Bypassed);
		}

		let credential = match self.authenticator.authenticate(call, metadata).await {
			Ok(credential) => credential,
			Err(e) => {
				self.metrics.record_rejected();
				obs::event!(warn, method = call.method, error = %e, "call rejected by admission gate");

				return Err(e);
			},
		};
		let limiter = match call.kind {
			CallKind::Unary => &self.unary,
			CallKind::Streaming => &self.streaming,
		};
		let token = limiter.acquire().await;

		if token.was_throttled() {
			obs::event!(
				debug,
				method = call.method,
				waited_ms = token.waited.as_millis() as u64,
				"call throttled"
			);
		}

		self.metrics.record_admitted(token.was_throttled());
		obs::record_admission_wait(call.kind, token.waited);

		Ok(Admission::Admitted { credential, token })
	}
}
impl Debug for AdmissionGate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AdmissionGate")
			.field("authenticator", &self.authenticator)
			.field("shared_limiter", &Arc::ptr_eq(&self.unary, &self.streaming))
			.field("bypass", &self.bypass)
			.finish()
	}
}
