//! Unary and batch application of the signing primitive.
//!
//! Every operation validates its whole request (encoded size, signature shapes) before the first
//! primitive call, so a failing request never yields partial results.

// self
use crate::{
	_prelude::*,
	signing::SigningPrimitive,
	wire::{
		DocSign, DocSignBatch, Document, DocumentBatch, VerifyBatchRequest, VerifyBatchResponse,
		VerifyRequest, VerifyResponse, WireMessage,
	},
};

/// Applies the primitive to single documents and ordered batches.
#[derive(Clone)]
pub struct DocumentHandler {
	primitive: Arc<dyn SigningPrimitive>,
	max_message_size: usize,
}
impl DocumentHandler {
	/// Creates a handler enforcing `max_message_size` on every request.
	pub fn new(primitive: Arc<dyn SigningPrimitive>, max_message_size: usize) -> Self {
		Self { primitive, max_message_size }
	}

	/// Configured request size limit in bytes.
	pub fn max_message_size(&self) -> usize {
		self.max_message_size
	}

	/// Fails with [`Error::MessageTooLarge`] when `message` exceeds the limit.
	pub fn check_size<M>(&self, message: &M) -> Result<()>
	where
		M: WireMessage,
	{
		let size = message.encoded_len();

		if size > self.max_message_size {
			return Err(Error::MessageTooLarge { size, limit: self.max_message_size });
		}

		Ok(())
	}

	/// Signs one document.
	pub fn sign(&self, doc: &Document) -> Result<DocSign> {
		self.check_size(doc)?;

		Ok(DocSign::new(self.primitive.sign(&doc.data)))
	}

	/// Verifies one document/signature pair; a mismatch is `is_ok == false`.
	pub fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse> {
		self.check_size(request)?;

		let is_ok = self.primitive.verify(&request.doc.data, &request.sign.sign)?;

		Ok(VerifyResponse { is_ok })
	}

	/// Signs every document of the batch; `sign[i]` belongs to `doc[i]`.
	pub fn sign_batch(&self, batch: &DocumentBatch) -> Result<DocSignBatch> {
		self.check_size(batch)?;

		let sign = batch.doc.iter().map(|doc| self.primitive.sign(doc)).collect();

		Ok(DocSignBatch { sign })
	}

	/// Verifies every pair of the batch; `status[i]` belongs to `docs[i]`.
	///
	/// Malformed signatures anywhere in the batch fail the whole call before any verification.
	pub fn verify_batch(&self, batch: &VerifyBatchRequest) -> Result<VerifyBatchResponse> {
		self.check_size(batch)?;

		for (index, request) in batch.docs.iter().enumerate() {
			self.primitive.check_signature(&request.sign.sign).map_err(|e| {
				Error::invalid_argument(format!("signature at position {index} is malformed: {e}"))
			})?;
		}

		let status = batch
			.docs
			.iter()
			.map(|request| self.primitive.verify(&request.doc.data, &request.sign.sign))
			.collect::<Result<Vec<_>, _>>()?;

		Ok(VerifyBatchResponse { status })
	}
}
impl Debug for DocumentHandler {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DocumentHandler")
			.field("max_message_size", &self.max_message_size)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{
		error::SignatureError,
		signing::{Ed25519Primitive, KeyPair},
	};

	const MIB: usize = 1024 * 1024;

	struct Counting {
		inner: Ed25519Primitive,
		calls: AtomicUsize,
	}
	impl SigningPrimitive for Counting {
		fn sign(&self, doc: &[u8]) -> Vec<u8> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			self.inner.sign(doc)
		}

		fn verify(&self, doc: &[u8], signature: &[u8]) -> Result<bool, SignatureError> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			self.inner.verify(doc, signature)
		}

		fn signature_len(&self) -> usize {
			self.inner.signature_len()
		}
	}

	fn handler(limit: usize) -> (DocumentHandler, Arc<Counting>) {
		let keys = Arc::new(KeyPair::from_seed([3; 32]));
		let counting =
			Arc::new(Counting { inner: Ed25519Primitive::new(keys), calls: AtomicUsize::new(0) });

		(DocumentHandler::new(counting.clone(), limit), counting)
	}

	#[test]
	fn empty_batch_yields_empty_result() {
		let (handler, counting) = handler(4 * MIB);
		let signs = handler.sign_batch(&DocumentBatch::default()).expect("Empty batch should sign.");
		let status = handler
			.verify_batch(&VerifyBatchRequest::default())
			.expect("Empty batch should verify.");

		assert!(signs.sign.is_empty());
		assert!(status.status.is_empty());
		assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn batch_preserves_positions() {
		let (handler, _) = handler(4 * MIB);
		let docs = [b"alpha".to_vec(), Vec::new(), vec![0xFF; 1024], b"omega".to_vec()];
		let batch = DocumentBatch::new(docs.clone());
		let signs = handler.sign_batch(&batch).expect("Batch should sign.");

		assert_eq!(signs.sign.len(), docs.len());

		for (doc, sign) in docs.iter().zip(&signs.sign) {
			let single = handler.sign(&Document::new(doc.clone())).expect("Document should sign.");

			assert_eq!(&single.sign, sign);
		}

		// Swap two signatures so positions 0 and 3 mismatch.
		let mut pairs = docs
			.iter()
			.zip(&signs.sign)
			.map(|(doc, sign)| {
				VerifyRequest::new(Document::new(doc.clone()), DocSign::new(sign.clone()))
			})
			.collect::<Vec<_>>();
		let first = pairs[0].sign.clone();

		pairs[0].sign = pairs[3].sign.clone();
		pairs[3].sign = first;

		let status = handler
			.verify_batch(&VerifyBatchRequest { docs: pairs })
			.expect("Batch should verify.");

		assert_eq!(status.status, vec![false, true, true, false]);
	}

	#[test]
	fn oversized_batch_fails_before_signing() {
		let (handler, counting) = handler(4 * MIB);
		let mut docs = vec![vec![0x5A; MIB]; 12];

		docs.push(vec![0x5A; 1024]);

		let err = handler
			.sign_batch(&DocumentBatch::new(docs))
			.expect_err("Batch above the limit should fail.");

		assert!(matches!(err, Error::MessageTooLarge { limit, .. } if limit == 4 * MIB));
		assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn oversized_single_document_is_rejected() {
		let (handler, counting) = handler(1024);
		let err = handler
			.sign(&Document::new(vec![0; 2048]))
			.expect_err("Document above the limit should fail.");

		assert_eq!(err.code(), crate::error::Code::ResourceExhausted);
		assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn malformed_signature_fails_whole_verify_batch() {
		let (handler, counting) = handler(4 * MIB);
		let good = handler.sign(&Document::new(b"ok".to_vec())).expect("Document should sign.");
		let calls_before = counting.calls.load(Ordering::SeqCst);
		let batch = VerifyBatchRequest {
			docs: vec![
				VerifyRequest::new(Document::new(b"ok".to_vec()), good),
				VerifyRequest::new(Document::new(b"bad".to_vec()), DocSign::new(vec![1, 2, 3])),
			],
		};
		let err = handler.verify_batch(&batch).expect_err("Malformed signature should fail.");

		assert!(matches!(err, Error::InvalidArgument { ref reason } if reason.contains("position 1")));
		assert_eq!(counting.calls.load(Ordering::SeqCst), calls_before);
	}

	#[test]
	fn single_verify_distinguishes_mismatch_from_malformed() {
		let (handler, _) = handler(4 * MIB);
		let sign = handler.sign(&Document::new(b"one".to_vec())).expect("Document should sign.");
		let mismatch = handler
			.verify(&VerifyRequest::new(Document::new(b"two".to_vec()), sign))
			.expect("Mismatch is not an error.");

		assert!(!mismatch.is_ok);

		let malformed = handler
			.verify(&VerifyRequest::new(Document::new(b"two".to_vec()), DocSign::default()))
			.expect_err("Empty signature is malformed.");

		assert!(matches!(malformed, Error::Signature(_)));
	}
}
