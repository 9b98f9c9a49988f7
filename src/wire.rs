//! Request and response messages of `signservice.SignService`.
//!
//! Field names and JSON rendering follow the protobuf JSON mapping (camelCase names, base64 for
//! `bytes`), and [`WireMessage::encoded_len`] reports the protobuf binary size so message limits
//! are enforced against what a transport would actually carry.

// self
use crate::_prelude::*;

/// Protobuf encoded size of a message.
pub trait WireMessage {
	/// Number of bytes the message occupies on the wire.
	fn encoded_len(&self) -> usize;
}

/// A document to sign or verify.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Document {
	/// Opaque document bytes.
	#[serde(with = "b64")]
	pub data: Vec<u8>,
}
impl Document {
	/// Wraps raw document bytes.
	pub fn new(data: impl Into<Vec<u8>>) -> Self {
		Self { data: data.into() }
	}
}
impl WireMessage for Document {
	fn encoded_len(&self) -> usize {
		bytes_field_len(&self.data)
	}
}

/// A signature produced for exactly one document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocSign {
	/// Raw signature bytes.
	#[serde(with = "b64")]
	pub sign: Vec<u8>,
}
impl DocSign {
	/// Wraps raw signature bytes.
	pub fn new(sign: impl Into<Vec<u8>>) -> Self {
		Self { sign: sign.into() }
	}
}
impl WireMessage for DocSign {
	fn encoded_len(&self) -> usize {
		bytes_field_len(&self.sign)
	}
}

/// A document paired with the signature to check against it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerifyRequest {
	/// Document that was signed.
	pub doc: Document,
	/// Signature claimed for the document.
	pub sign: DocSign,
}
impl VerifyRequest {
	/// Pairs a document with a signature.
	pub fn new(doc: Document, sign: DocSign) -> Self {
		Self { doc, sign }
	}
}
impl WireMessage for VerifyRequest {
	fn encoded_len(&self) -> usize {
		message_field_len(self.doc.encoded_len()) + message_field_len(self.sign.encoded_len())
	}
}

/// Outcome of a single verification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerifyResponse {
	/// Whether the signature matches the document.
	pub is_ok: bool,
}
impl WireMessage for VerifyResponse {
	fn encoded_len(&self) -> usize {
		if self.is_ok { 2 } else { 0 }
	}
}

/// Ordered collection of documents to sign.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentBatch {
	/// Document bytes, in request order.
	#[serde(with = "b64_seq")]
	pub doc: Vec<Vec<u8>>,
}
impl DocumentBatch {
	/// Collects documents into a batch.
	pub fn new<I, D>(docs: I) -> Self
	where
		I: IntoIterator<Item = D>,
		D: Into<Vec<u8>>,
	{
		Self { doc: docs.into_iter().map(Into::into).collect() }
	}
}
impl WireMessage for DocumentBatch {
	fn encoded_len(&self) -> usize {
		self.doc.iter().map(|doc| repeated_bytes_len(doc)).sum()
	}
}

/// Signatures in the same order as the originating [`DocumentBatch`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocSignBatch {
	/// Signature bytes; `sign[i]` belongs to `doc[i]` of the request.
	#[serde(with = "b64_seq")]
	pub sign: Vec<Vec<u8>>,
}
impl WireMessage for DocSignBatch {
	fn encoded_len(&self) -> usize {
		self.sign.iter().map(|sign| repeated_bytes_len(sign)).sum()
	}
}

/// Ordered collection of verification requests.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerifyBatchRequest {
	/// Verification requests, in request order.
	pub docs: Vec<VerifyRequest>,
}
impl WireMessage for VerifyBatchRequest {
	fn encoded_len(&self) -> usize {
		self.docs.iter().map(|req| message_field_len(req.encoded_len())).sum()
	}
}

/// Verification outcomes in the same order as the originating [`VerifyBatchRequest`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerifyBatchResponse {
	/// `status[i]` is the outcome for `docs[i]` of the request.
	pub status: Vec<bool>,
}
impl WireMessage for VerifyBatchResponse {
	fn encoded_len(&self) -> usize {
		if self.status.is_empty() {
			return 0;
		}

		// Packed repeated bool: one tag, one length prefix, one byte per element.
		1 + varint_len(self.status.len()) + self.status.len()
	}
}

fn varint_len(mut value: usize) -> usize {
	let mut len = 1;

	while value >= 0x80 {
		value >>= 7;
		len += 1;
	}

	len
}

// proto3 omits empty singular `bytes` fields.
fn bytes_field_len(bytes: &[u8]) -> usize {
	if bytes.is_empty() { 0 } else { repeated_bytes_len(bytes) }
}

fn repeated_bytes_len(bytes: &[u8]) -> usize {
	1 + varint_len(bytes.len()) + bytes.len()
}

fn message_field_len(inner: usize) -> usize {
	1 + varint_len(inner) + inner
}

mod b64 {
	// crates.io
	use base64::{
		Engine,
		engine::general_purpose::{STANDARD, URL_SAFE},
	};
	use serde::{Deserializer, Serializer, de::Error as _};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&STANDARD.encode(bytes))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let text = String::deserialize(deserializer)?;

		decode(&text).map_err(D::Error::custom)
	}

	pub(super) fn decode(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
		STANDARD.decode(text).or_else(|_| URL_SAFE.decode(text))
	}
}

mod b64_seq {
	// crates.io
	use base64::{Engine, engine::general_purpose::STANDARD};
	use serde::{Deserializer, Serializer, de::Error as _, ser::SerializeSeq};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(items: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut seq = serializer.serialize_seq(Some(items.len()))?;

		for item in items {
			seq.serialize_element(&STANDARD.encode(item))?;
		}

		seq.end()
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let texts = Vec::<String>::deserialize(deserializer)?;

		texts.iter().map(|text| super::b64::decode(text).map_err(D::Error::custom)).collect()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn varint_boundaries() {
		assert_eq!(varint_len(0), 1);
		assert_eq!(varint_len(127), 1);
		assert_eq!(varint_len(128), 2);
		assert_eq!(varint_len(16_383), 2);
		assert_eq!(varint_len(16_384), 3);
		assert_eq!(varint_len(1024 * 1024), 3);
	}

	#[test]
	fn encoded_sizes_follow_protobuf_layout() {
		assert_eq!(Document::default().encoded_len(), 0);
		assert_eq!(Document::new(vec![0; 17]).encoded_len(), 19);
		// Empty documents still occupy a slot inside a repeated field.
		assert_eq!(DocumentBatch::new([Vec::new(), vec![1, 2]]).encoded_len(), 2 + 4);

		let request = VerifyRequest::new(Document::new(vec![0; 3]), DocSign::new(vec![0; 64]));

		assert_eq!(request.encoded_len(), (2 + 5) + (2 + 66));
		assert_eq!(VerifyBatchResponse { status: vec![true, false] }.encoded_len(), 4);
	}

	#[test]
	fn json_uses_camel_case_and_base64() {
		let json = serde_json::to_value(VerifyResponse { is_ok: true })
			.expect("VerifyResponse should serialize to JSON.");

		assert_eq!(json, serde_json::json!({ "isOk": true }));

		let doc: Document = serde_json::from_str("{\"data\":\"aGVsbG8=\"}")
			.expect("Base64 document should deserialize.");

		assert_eq!(doc.data, b"hello");

		let batch: DocumentBatch = serde_json::from_str("{}")
			.expect("Missing fields should fall back to protobuf defaults.");

		assert!(batch.doc.is_empty());
	}

	#[test]
	fn url_safe_base64_is_accepted() {
		let doc: Document = serde_json::from_str("{\"data\":\"-_8=\"}")
			.expect("URL-safe base64 document should deserialize.");

		assert_eq!(doc.data, vec![0xFB, 0xFF]);
	}

	#[test]
	fn invalid_base64_is_rejected() {
		assert!(serde_json::from_str::<DocSignBatch>("{\"sign\":[\"***\"]}").is_err());
	}
}
