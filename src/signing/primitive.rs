//! The sign/verify capability every handler delegates to.

// crates.io
use ed25519_dalek::{SIGNATURE_LENGTH, Signature, Signer, Verifier};
// self
use crate::{_prelude::*, error::SignatureError, signing::KeyPair};

/// Stateless sign/verify over a fixed key pair.
///
/// Implementations must be cheap to call concurrently; the service shares one instance across
/// every unary call and stream session.
pub trait SigningPrimitive
where
	Self: Send + Sync,
{
	/// Signs an arbitrary byte sequence (including the empty one).
	fn sign(&self, doc: &[u8]) -> Vec<u8>;

	/// Checks `signature` against `doc`.
	///
	/// A mismatch is `Ok(false)`. Only a signature of the wrong length produces an error.
	fn verify(&self, doc: &[u8], signature: &[u8]) -> Result<bool, SignatureError>;

	/// Fixed signature length produced by [`SigningPrimitive::sign`].
	fn signature_len(&self) -> usize;

	/// Rejects signature bytes of the wrong shape without performing any verification.
	fn check_signature(&self, signature: &[u8]) -> Result<(), SignatureError> {
		let expected = self.signature_len();

		if signature.len() != expected {
			return Err(SignatureError::Malformed { actual: signature.len(), expected });
		}

		Ok(())
	}
}

/// Ed25519 primitive backed by the process key pair.
#[derive(Clone, Debug)]
pub struct Ed25519Primitive {
	keys: Arc<KeyPair>,
}
impl Ed25519Primitive {
	/// Wraps the shared key pair.
	pub fn new(keys: Arc<KeyPair>) -> Self {
		Self { keys }
	}
}
impl SigningPrimitive for Ed25519Primitive {
	fn sign(&self, doc: &[u8]) -> Vec<u8> {
		self.keys.signing_key().sign(doc).to_bytes().to_vec()
	}

	fn verify(&self, doc: &[u8], signature: &[u8]) -> Result<bool, SignatureError> {
		let bytes = <[u8; SIGNATURE_LENGTH]>::try_from(signature).map_err(|_| {
			SignatureError::Malformed { actual: signature.len(), expected: SIGNATURE_LENGTH }
		})?;
		let signature = Signature::from_bytes(&bytes);

		Ok(self.keys.public_key().verify(doc, &signature).is_ok())
	}

	fn signature_len(&self) -> usize {
		SIGNATURE_LENGTH
	}
}
