//! Service facade binding the admission gate, handlers, and stream sessions into the callable
//! operations of `signservice.SignService`.
//!
//! [`SignService`] is the only entry point external collaborators (RPC transports, the JSON
//! gateway, in-process callers) use. It owns the process [`KeyPair`] and hands it to the
//! primitive by shared, read-only reference.

// crates.io
use ed25519_dalek::VerifyingKey;
// self
use crate::{
	_prelude::*,
	admission::{
		AdmissionGate, ApproveAll, AuthPolicy, CallInfo, CallKind, CallMetadata, REFLECTION_SERVICE,
	},
	config::ServiceConfig,
	error::ConfigError,
	handler::DocumentHandler,
	obs::{self, CallMetrics, CallOutcome, CallSpan},
	session::{
		CancelSignal, SessionSummary, SessionTransport, SignStreamHandler, StreamHandler,
		StreamSession, VerifyStreamHandler,
	},
	signing::{Ed25519Primitive, KeyFingerprint, KeyPair, SigningPrimitive},
	wire::{
		DocSign, DocSignBatch, Document, DocumentBatch, VerifyBatchRequest, VerifyBatchResponse,
		VerifyRequest, VerifyResponse,
	},
};

/// Fully-qualified name of the signing service.
pub const SERVICE_NAME: &str = "signservice.SignService";

const REFLECTION_CALL: CallInfo =
	CallInfo::new(REFLECTION_SERVICE, "ServerReflectionInfo", CallKind::Streaming);

/// Operations offered by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// Sign one document.
	Sign,
	/// Verify one document/signature pair.
	Verify,
	/// Sign an ordered batch.
	SignBatch,
	/// Verify an ordered batch.
	VerifyBatch,
	/// Sign a bidirectional stream of documents.
	SignStream,
	/// Verify a bidirectional stream of pairs.
	VerifyStream,
}
impl Method {
	/// Every method, in declaration order.
	pub const ALL: [Method; 6] = [
		Method::Sign,
		Method::Verify,
		Method::SignBatch,
		Method::VerifyBatch,
		Method::SignStream,
		Method::VerifyStream,
	];

	/// Method name as it appears in call paths.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Sign => "Sign",
			Method::Verify => "Verify",
			Method::SignBatch => "SignBatch",
			Method::VerifyBatch => "VerifyBatch",
			Method::SignStream => "SignStream",
			Method::VerifyStream => "VerifyStream",
		}
	}

	/// Call shape of the method.
	pub const fn kind(self) -> CallKind {
		match self {
			Method::SignStream | Method::VerifyStream => CallKind::Streaming,
			_ => CallKind::Unary,
		}
	}

	/// Gate descriptor for calls to this method.
	pub const fn call_info(self) -> CallInfo {
		CallInfo::new(SERVICE_NAME, self.as_str(), self.kind())
	}

	/// Full call path, e.g. `/signservice.SignService/Sign`.
	pub fn path(self) -> String {
		format!("/{SERVICE_NAME}/{}", self.as_str())
	}

	/// Resolves a full call path back to its method.
	pub fn from_path(path: &str) -> Result<Self> {
		path.strip_prefix('/')
			.and_then(|rest| rest.split_once('/'))
			.filter(|(service, _)| *service == SERVICE_NAME)
			.and_then(|(_, name)| name.parse().ok())
			.ok_or_else(|| Error::UnknownMethod { path: path.to_owned() })
	}
}
impl FromStr for Method {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Self::ALL
			.into_iter()
			.find(|method| method.as_str() == s)
			.ok_or_else(|| Error::UnknownMethod { path: s.to_owned() })
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Introspection view of the service returned by [`SignService::describe`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
	/// Fully-qualified service name.
	pub service: &'static str,
	/// Callable methods.
	pub methods: Vec<MethodDescriptor>,
}
impl ServiceDescriptor {
	fn current() -> Self {
		let methods = Method::ALL
			.into_iter()
			.map(|method| {
				let streaming = method.kind() == CallKind::Streaming;

				MethodDescriptor {
					name: method.as_str(),
					path: method.path(),
					client_streaming: streaming,
					server_streaming: streaming,
				}
			})
			.collect();

		Self { service: SERVICE_NAME, methods }
	}
}

/// One entry of a [`ServiceDescriptor`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDescriptor {
	/// Method name.
	pub name: &'static str,
	/// Full call path.
	pub path: String,
	/// Whether the caller sends a stream.
	pub client_streaming: bool,
	/// Whether the service answers with a stream.
	pub server_streaming: bool,
}

/// The signing service facade.
#[derive(Clone)]
pub struct SignService {
	keys: Arc<KeyPair>,
	handler: DocumentHandler,
	gate: AdmissionGate,
}
impl SignService {
	/// Starts building a service around the process key pair.
	pub fn builder(keys: KeyPair) -> SignServiceBuilder {
		SignServiceBuilder::new(keys)
	}

	/// Builds a service from `config` with the placeholder auth policy.
	pub fn new(keys: KeyPair, config: ServiceConfig) -> Result<Self, ConfigError> {
		Self::builder(keys).config(config).build()
	}

	/// Public key callers verify signatures against.
	pub fn public_key(&self) -> &VerifyingKey {
		self.keys.public_key()
	}

	/// Log-safe fingerprint of the public key.
	pub fn key_fingerprint(&self) -> KeyFingerprint {
		self.keys.fingerprint()
	}

	/// Admission and session counters.
	pub fn metrics(&self) -> &Arc<CallMetrics> {
		self.gate.metrics()
	}

	/// Gate every call passes through.
	pub fn gate(&self) -> &AdmissionGate {
		&self.gate
	}

	/// `Sign`: signs one document.
	pub async fn sign(&self, metadata: &CallMetadata, request: Document) -> Result<DocSign> {
		self.unary(Method::Sign, metadata, |handler| handler.sign(&request)).await
	}

	/// `Verify`: checks one document/signature pair.
	pub async fn verify(
		&self,
		metadata: &CallMetadata,
		request: VerifyRequest,
	) -> Result<VerifyResponse> {
		self.unary(Method::Verify, metadata, |handler| handler.verify(&request)).await
	}

	/// `SignBatch`: signs every document of the batch, or nothing at all.
	pub async fn sign_batch(
		&self,
		metadata: &CallMetadata,
		request: DocumentBatch,
	) -> Result<DocSignBatch> {
		self.unary(Method::SignBatch, metadata, |handler| handler.sign_batch(&request)).await
	}

	/// `VerifyBatch`: verifies every pair of the batch, or nothing at all.
	pub async fn verify_batch(
		&self,
		metadata: &CallMetadata,
		request: VerifyBatchRequest,
	) -> Result<VerifyBatchResponse> {
		self.unary(Method::VerifyBatch, metadata, |handler| handler.verify_batch(&request)).await
	}

	/// `SignStream`: opens one session signing each streamed document in order.
	pub async fn sign_stream<T>(
		&self,
		metadata: &CallMetadata,
		transport: T,
		cancel: CancelSignal,
	) -> Result<SessionSummary>
	where
		T: SessionTransport<Document, DocSign>,
	{
		let handler = SignStreamHandler::new(self.handler.clone());

		self.stream(Method::SignStream, metadata, handler, transport, cancel).await
	}

	/// `VerifyStream`: opens one session verifying each streamed pair in order.
	pub async fn verify_stream<T>(
		&self,
		metadata: &CallMetadata,
		transport: T,
		cancel: CancelSignal,
	) -> Result<SessionSummary>
	where
		T: SessionTransport<VerifyRequest, VerifyResponse>,
	{
		let handler = VerifyStreamHandler::new(self.handler.clone());

		self.stream(Method::VerifyStream, metadata, handler, transport, cancel).await
	}

	/// Reflection surface: describes the service without passing authentication or throttling.
	pub async fn describe(&self, metadata: &CallMetadata) -> Result<ServiceDescriptor> {
		self.gate.admit(&REFLECTION_CALL, metadata).await?;

		Ok(ServiceDescriptor::current())
	}

	async fn unary<R, F>(&self, method: Method, metadata: &CallMetadata, op: F) -> Result<R>
	where
		F: FnOnce(&DocumentHandler) -> Result<R>,
	{
		let span = CallSpan::new(method, "unary");

		obs::record_call_outcome(method, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.gate.admit(&method.call_info(), metadata).await?;

				op(&self.handler)
			})
			.await;

		finish(method, &span, &result);

		result
	}

	async fn stream<H, T>(
		&self,
		method: Method,
		metadata: &CallMetadata,
		handler: H,
		transport: T,
		cancel: CancelSignal,
	) -> Result<SessionSummary>
	where
		H: StreamHandler,
		T: SessionTransport<H::Request, H::Response>,
	{
		let span = CallSpan::new(method, "stream");

		obs::record_call_outcome(method, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let call = method.call_info();
				let mut watcher = cancel.clone();

				tokio::select! {
					biased;
					_ = watcher.cancelled() => return Err(Error::Cancelled),
					admission = self.gate.admit(&call, metadata) => admission?,
				};

				let result = StreamSession::new(handler, transport, cancel).run().await;

				self.metrics().record_session_end(result.is_ok());

				result
			})
			.await;

		finish(method, &span, &result);

		result
	}
}
impl Debug for SignService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SignService")
			.field("key", &self.keys.fingerprint())
			.field("handler", &self.handler)
			.field("gate", &self.gate)
			.finish()
	}
}

/// Builder for [`SignService`].
pub struct SignServiceBuilder {
	keys: Arc<KeyPair>,
	config: ServiceConfig,
	policy: Arc<dyn AuthPolicy>,
	primitive: Option<Arc<dyn SigningPrimitive>>,
	gate: Option<AdmissionGate>,
}
impl SignServiceBuilder {
	fn new(keys: KeyPair) -> Self {
		Self {
			keys: Arc::new(keys),
			config: ServiceConfig::default(),
			policy: Arc::new(ApproveAll),
			primitive: None,
			gate: None,
		}
	}

	/// Uses `config` instead of the defaults.
	pub fn config(mut self, config: ServiceConfig) -> Self {
		self.config = config;

		self
	}

	/// Replaces the placeholder auth policy.
	pub fn auth_policy(mut self, policy: Arc<dyn AuthPolicy>) -> Self {
		self.policy = policy;

		self
	}

	/// Replaces the Ed25519 primitive (e.g. with an instrumented wrapper).
	pub fn primitive(mut self, primitive: Arc<dyn SigningPrimitive>) -> Self {
		self.primitive = Some(primitive);

		self
	}

	/// Uses a pre-built gate instead of one derived from the configuration.
	///
	/// The configured auth policy and rate settings are ignored when a gate is supplied.
	pub fn gate(mut self, gate: AdmissionGate) -> Self {
		self.gate = Some(gate);

		self
	}

	/// Validates the configuration and assembles the service.
	pub fn build(self) -> Result<SignService, ConfigError> {
		self.config.validate()?;

		let gate = match self.gate {
			Some(gate) => gate,
			None => AdmissionGate::from_config(&self.config, self.policy)?,
		};
		let primitive: Arc<dyn SigningPrimitive> = match self.primitive {
			Some(primitive) => primitive,
			None => Arc::new(Ed25519Primitive::new(self.keys.clone())),
		};
		let handler = DocumentHandler::new(primitive, self.config.max_message_size);

		obs::event!(
			info,
			key = %self.keys.fingerprint(),
			rate_limit = self.config.rate_limit_per_second,
			limiter_scope = ?self.config.limiter_scope,
			max_message_size = self.config.max_message_size,
			"sign service ready"
		);

		Ok(SignService { keys: self.keys, handler, gate })
	}
}
impl Debug for SignServiceBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SignServiceBuilder")
			.field("config", &self.config)
			.field("custom_primitive", &self.primitive.is_some())
			.field("custom_gate", &self.gate.is_some())
			.finish()
	}
}

fn finish<R>(method: Method, span: &CallSpan, result: &Result<R>) {
	match result {
		Ok(_) => obs::record_call_outcome(method, CallOutcome::Success),
		Err(e) => {
			span.record_code(e.code());
			obs::record_call_outcome(method, CallOutcome::Failure);
			obs::event!(debug, method = method.as_str(), code = e.code().as_str(), error = %e, "call failed");
		},
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn paths_round_trip() {
		for method in Method::ALL {
			assert_eq!(Method::from_path(&method.path()).ok(), Some(method));
		}

		assert_eq!(Method::SignBatch.path(), "/signservice.SignService/SignBatch");
	}

	#[test]
	fn unknown_paths_are_not_found() {
		for path in ["/signservice.SignService/Encrypt", "/other.Service/Sign", "Sign", ""] {
			let err = Method::from_path(path).expect_err("Unknown path should be rejected.");

			assert_eq!(err.code(), crate::error::Code::NotFound);
		}
	}

	#[test]
	fn streaming_methods_are_flagged() {
		let descriptor = ServiceDescriptor::current();
		let streaming = descriptor
			.methods
			.iter()
			.filter(|method| method.client_streaming && method.server_streaming)
			.map(|method| method.name)
			.collect::<Vec<_>>();

		assert_eq!(descriptor.methods.len(), 6);
		assert_eq!(streaming, vec!["SignStream", "VerifyStream"]);
	}

	#[test]
	fn invalid_config_is_rejected_at_build() {
		let err = SignService::new(
			KeyPair::from_seed([0; 32]),
			ServiceConfig::default().with_rate_limit(0),
		)
		.expect_err("Zero rate limit should be rejected.");

		assert!(matches!(err, ConfigError::ZeroRateLimit));
	}
}
