//! Process-lifetime Ed25519 key pair.

// crates.io
use ed25519_dalek::{SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Private/public key pair created once at startup and shared read-only by every call.
///
/// Not `Clone`; share it behind an [`Arc`].
pub struct KeyPair {
	signing: SigningKey,
	verifying: VerifyingKey,
}
impl KeyPair {
	/// Generates a fresh key pair from the thread-local CSPRNG.
	pub fn generate() -> Self {
		Self::from_seed(rand::random())
	}

	/// Derives the key pair from a 32-byte secret seed.
	pub fn from_seed(seed: [u8; 32]) -> Self {
		let signing = SigningKey::from_bytes(&seed);
		let verifying = signing.verifying_key();

		Self { signing, verifying }
	}

	/// Public half of the pair.
	pub fn public_key(&self) -> &VerifyingKey {
		&self.verifying
	}

	/// Raw public key bytes.
	pub fn public_key_bytes(&self) -> [u8; 32] {
		self.verifying.to_bytes()
	}

	/// Short SHA-256 fingerprint of the public key, safe to log.
	pub fn fingerprint(&self) -> KeyFingerprint {
		KeyFingerprint::of(self.verifying.as_bytes())
	}

	pub(crate) fn signing_key(&self) -> &SigningKey {
		&self.signing
	}
}
impl Debug for KeyPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("KeyPair")
			.field("fingerprint", &self.fingerprint())
			.field("private", &"<redacted>")
			.finish()
	}
}

/// Hex-encoded prefix of the SHA-256 digest of a public key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KeyFingerprint(String);
impl KeyFingerprint {
	const PREFIX_LEN: usize = 8;

	fn of(public_key: &[u8]) -> Self {
		let digest = Sha256::digest(public_key);
		let mut hex = String::with_capacity(Self::PREFIX_LEN * 2);

		for byte in digest.iter().take(Self::PREFIX_LEN) {
			hex.push_str(&format!("{byte:02x}"));
		}

		Self(hex)
	}

	/// Returns the fingerprint as a hex string.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Debug for KeyFingerprint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "KeyFingerprint({})", self.0)
	}
}
impl Display for KeyFingerprint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
