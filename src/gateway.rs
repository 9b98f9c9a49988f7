//! JSON translation front end for unary calls.
//!
//! Requests arrive as `POST /signservice.SignService/<Method>` with protobuf-JSON bodies (camelCase
//! fields, base64 bytes). The `authorization` header is forwarded to the facade as call metadata.
//! Streaming methods are not translated and answer `501`.

// crates.io
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	admission::CallMetadata,
	obs,
	service::{Method, SignService},
};

/// One HTTP exchange handed to the gateway by the hosting server.
#[derive(Clone, Debug, Default)]
pub struct GatewayRequest {
	/// HTTP verb, e.g. `POST`.
	pub method: String,
	/// Request path, e.g. `/signservice.SignService/Sign`.
	pub path: String,
	/// Request headers; keys are case-insensitive.
	pub headers: CallMetadata,
	/// Raw JSON body.
	pub body: Vec<u8>,
}
impl GatewayRequest {
	/// Builds a `POST` to `path` carrying `body`.
	pub fn post(path: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
		Self {
			method: "POST".into(),
			path: path.into(),
			headers: CallMetadata::new(),
			body: body.into(),
		}
	}

	/// Adds one header.
	pub fn with_header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
		self.headers.append(key, value);

		self
	}
}

/// Status and JSON body produced for a [`GatewayRequest`].
#[derive(Clone, Debug, PartialEq)]
pub struct GatewayResponse {
	/// HTTP status code.
	pub status: u16,
	/// JSON body.
	pub body: Value,
}
impl GatewayResponse {
	fn ok(body: Value) -> Self {
		Self { status: 200, body }
	}

	fn error(error: &Error) -> Self {
		let code = error.code();
		let body = ErrorBody { code: code.as_i32(), message: error.to_string(), details: Vec::new() };

		Self {
			status: code.http_status(),
			body: serde_json::to_value(body).unwrap_or(Value::Null),
		}
	}
}

/// Error payload rendered for failed calls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Numeric RPC status code.
	pub code: i32,
	/// Human-readable description.
	pub message: String,
	/// Always empty; kept for wire compatibility.
	#[serde(default)]
	pub details: Vec<Value>,
}

/// Translates JSON requests onto a [`SignService`].
#[derive(Clone, Debug)]
pub struct Gateway {
	service: Arc<SignService>,
}
impl Gateway {
	/// Wraps the facade.
	pub fn new(service: Arc<SignService>) -> Self {
		Self { service }
	}

	/// Handles one request; failures are rendered into the response, never returned.
	pub async fn handle(&self, request: GatewayRequest) -> GatewayResponse {
		match self.dispatch(&request).await {
			Ok(body) => GatewayResponse::ok(body),
			Err(e) => {
				obs::event!(
					debug,
					path = request.path.as_str(),
					code = e.code().as_str(),
					error = %e,
					"gateway call failed"
				);

				GatewayResponse::error(&e)
			},
		}
	}

	async fn dispatch(&self, request: &GatewayRequest) -> Result<Value> {
		let method = Method::from_path(&request.path)?;

		if !request.method.eq_ignore_ascii_case("POST") {
			return Err(Error::UnknownMethod {
				path: format!("{} {}", request.method, request.path),
			});
		}

		let metadata = &request.headers;
		let service = &self.service;

		match method {
			Method::Sign => encode(service.sign(metadata, decode(&request.body)?).await?),
			Method::Verify => encode(service.verify(metadata, decode(&request.body)?).await?),
			Method::SignBatch =>
				encode(service.sign_batch(metadata, decode(&request.body)?).await?),
			Method::VerifyBatch =>
				encode(service.verify_batch(metadata, decode(&request.body)?).await?),
			Method::SignStream | Method::VerifyStream =>
				Err(Error::Unimplemented { method: method.path() }),
		}
	}
}

fn decode<T>(body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let body = if body.iter().all(u8::is_ascii_whitespace) { b"{}".as_slice() } else { body };
	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de).map_err(|e| {
		Error::invalid_argument(format!("invalid request body at `{}`: {}", e.path(), e.inner()))
	})
}

fn encode<T>(message: T) -> Result<Value>
where
	T: Serialize,
{
	serde_json::to_value(message)
		.map_err(|e| Error::invalid_argument(format!("response could not be encoded: {e}")))
}
