//! Bearer-credential extraction and the pluggable policy that judges it.

// self
use crate::{
	_prelude::*,
	admission::{CallInfo, CallMetadata},
	obs,
};

/// Metadata key carrying the credential.
pub const AUTHORIZATION_KEY: &str = "authorization";

/// Redacted bearer credential keeping the token out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);
impl BearerToken {
	/// Wraps a raw token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl Debug for BearerToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("BearerToken").field(&"<redacted>").finish()
	}
}
impl Display for BearerToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Verdict returned by an [`AuthPolicy`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthDecision {
	/// The credential may proceed.
	Approve,
	/// The credential is rejected.
	Deny {
		/// Policy-supplied reason string.
		reason: String,
	},
}

/// Boxed future returned by [`AuthPolicy::check`].
pub type AuthFuture<'a> = Pin<Box<dyn Future<Output = Result<AuthDecision>> + 'a + Send>>;

/// Decides whether a well-formed credential may call the service.
///
/// Policy errors are treated as denials by the gate.
pub trait AuthPolicy
where
	Self: Send + Sync,
{
	/// Judges `token` for the call described by `call`.
	fn check<'a>(&'a self, token: &'a BearerToken, call: &'a CallInfo) -> AuthFuture<'a>;
}

/// Placeholder policy that approves every well-formed credential.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApproveAll;
impl AuthPolicy for ApproveAll {
	fn check<'a>(&'a self, _: &'a BearerToken, _: &'a CallInfo) -> AuthFuture<'a> {
		Box::pin(async { Ok(AuthDecision::Approve) })
	}
}

/// Authentication check: extracts `<scheme> <token>` from metadata and consults the policy.
#[derive(Clone)]
pub struct Authenticator {
	scheme: String,
	policy: Arc<dyn AuthPolicy>,
}
impl Authenticator {
	/// Creates an authenticator expecting `scheme` (compared case-insensitively).
	pub fn new(scheme: impl Into<String>, policy: Arc<dyn AuthPolicy>) -> Self {
		Self { scheme: scheme.into(), policy }
	}

	/// Expected scheme name.
	pub fn scheme(&self) -> &str {
		&self.scheme
	}

	/// Pulls the credential out of `metadata` without consulting the policy.
	pub fn extract(&self, metadata: &CallMetadata) -> Result<BearerToken> {
		let value = metadata
			.get(AUTHORIZATION_KEY)
			.ok_or_else(|| Error::unauthenticated(format!("missing {} credential", self.scheme)))?;
		let (scheme, token) = value
			.split_once(' ')
			.ok_or_else(|| Error::unauthenticated("bad authorization string"))?;

		if !scheme.eq_ignore_ascii_case(&self.scheme) {
			return Err(Error::unauthenticated(format!(
				"expected the {} authorization scheme",
				self.scheme
			)));
		}

		let token = token.trim();

		if token.is_empty() {
			return Err(Error::unauthenticated("empty credential"));
		}

		Ok(BearerToken::new(token))
	}

	/// Extracts the credential and asks the policy to judge it.
	pub async fn authenticate(
		&self,
		call: &CallInfo,
		metadata: &CallMetadata,
	) -> Result<BearerToken> {
		let token = self.extract(metadata)?;

		match self.policy.check(&token, call).await {
			Ok(AuthDecision::Approve) => Ok(token),
			Ok(AuthDecision::Deny { reason }) => Err(Error::unauthenticated(reason)),
			Err(e) => {
				obs::event!(warn, method = call.method, error = %e, "auth policy failed");

				Err(Error::unauthenticated("credential could not be checked"))
			},
		}
	}
}
impl Debug for Authenticator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Authenticator").field("scheme", &self.scheme).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::admission::CallKind;

	struct DenyAll;
	impl AuthPolicy for DenyAll {
		fn check<'a>(&'a self, _: &'a BearerToken, _: &'a CallInfo) -> AuthFuture<'a> {
			Box::pin(async { Ok(AuthDecision::Deny { reason: "revoked".into() }) })
		}
	}

	struct Broken;
	impl AuthPolicy for Broken {
		fn check<'a>(&'a self, _: &'a BearerToken, _: &'a CallInfo) -> AuthFuture<'a> {
			Box::pin(async { Err(Error::invalid_argument("backend down")) })
		}
	}

	fn call() -> CallInfo {
		CallInfo::new("signservice.SignService", "Sign", CallKind::Unary)
	}

	fn authenticator(policy: Arc<dyn AuthPolicy>) -> Authenticator {
		Authenticator::new("bearer", policy)
	}

	#[test]
	fn token_formatters_redact() {
		let token = BearerToken::new("super-secret");

		assert_eq!(format!("{token:?}"), "BearerToken(\"<redacted>\")");
		assert_eq!(format!("{token}"), "<redacted>");
	}

	#[test]
	fn extraction_accepts_any_scheme_case() {
		let auth = authenticator(Arc::new(ApproveAll));
		let metadata = CallMetadata::new().with(AUTHORIZATION_KEY, "Bearer abc.def");

		let token = auth.extract(&metadata).expect("Mixed-case scheme should be accepted.");

		assert_eq!(token.expose(), "abc.def");
	}

	#[test]
	fn malformed_credentials_are_unauthenticated() {
		let auth = authenticator(Arc::new(ApproveAll));

		for metadata in [
			CallMetadata::new(),
			CallMetadata::new().with(AUTHORIZATION_KEY, "bearer"),
			CallMetadata::new().with(AUTHORIZATION_KEY, "basic dXNlcjpwYXNz"),
			CallMetadata::new().with(AUTHORIZATION_KEY, "bearer   "),
		] {
			let err = auth.extract(&metadata).expect_err("Malformed credential should be rejected.");

			assert!(matches!(err, Error::Unauthenticated { .. }), "unexpected error: {err:?}");
		}
	}

	#[tokio::test]
	async fn policy_denials_and_failures_are_unauthenticated() {
		let metadata = CallMetadata::new().with(AUTHORIZATION_KEY, "bearer token");

		for policy in [Arc::new(DenyAll) as Arc<dyn AuthPolicy>, Arc::new(Broken) as Arc<dyn AuthPolicy>] {
			let err = authenticator(policy)
				.authenticate(&call(), &metadata)
				.await
				.expect_err("Policy rejection should fail authentication.");

			assert!(matches!(err, Error::Unauthenticated { .. }));
		}
	}

	#[tokio::test]
	async fn placeholder_policy_approves_well_formed_credentials() {
		let metadata = CallMetadata::new().with(AUTHORIZATION_KEY, "bearer anything");
		let token = authenticator(Arc::new(ApproveAll))
			.authenticate(&call(), &metadata)
			.await
			.expect("Placeholder policy should approve.");

		assert_eq!(token.expose(), "anything");
	}
}
