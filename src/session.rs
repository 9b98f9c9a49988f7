//! Per-call stream sessions answering each request with exactly one response, in order.
//!
//! A session moves through [`SessionState::Open`], [`SessionState::Draining`], and
//! [`SessionState::Closed`]. Requests are processed strictly one at a time: the next item is not
//! received until the previous response has been accepted by the transport, which both preserves
//! ordering and lets transport backpressure reach the peer without internal buffering.
//!
//! Suspension points are the receive of the next item and the send of a response; both race
//! against the session's [`CancelSignal`].

pub mod channel;

pub use channel::*;

// crates.io
use tokio::sync::watch;
// self
use crate::{
	_prelude::*,
	error::TransportError,
	handler::DocumentHandler,
	obs,
	wire::{DocSign, Document, VerifyRequest, VerifyResponse},
};

/// Boxed future returned by [`SessionTransport`] methods.
pub type TransportFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;

/// Connection half a session reads requests from and writes responses to.
pub trait SessionTransport<Req, Resp>
where
	Self: Send,
{
	/// Receives the next request; `Ok(None)` means the peer finished sending.
	fn recv(&mut self) -> TransportFuture<'_, Option<Req>>;

	/// Sends one response, waiting until the transport accepts it.
	fn send(&mut self, response: Resp) -> TransportFuture<'_, ()>;
}

/// Per-item processing applied by a session.
pub trait StreamHandler
where
	Self: Send + Sync,
{
	/// Inbound item.
	type Request: Send;
	/// Outbound item produced for each request.
	type Response: Send;

	/// Produces the response for one request.
	fn handle(&self, request: Self::Request) -> Result<Self::Response>;
}

/// Signs each streamed document.
#[derive(Clone, Debug)]
pub struct SignStreamHandler(DocumentHandler);
impl SignStreamHandler {
	/// Wraps the shared document handler.
	pub fn new(handler: DocumentHandler) -> Self {
		Self(handler)
	}
}
impl StreamHandler for SignStreamHandler {
	type Request = Document;
	type Response = DocSign;

	fn handle(&self, request: Document) -> Result<DocSign> {
		self.0.sign(&request)
	}
}

/// Verifies each streamed document/signature pair.
#[derive(Clone, Debug)]
pub struct VerifyStreamHandler(DocumentHandler);
impl VerifyStreamHandler {
	/// Wraps the shared document handler.
	pub fn new(handler: DocumentHandler) -> Self {
		Self(handler)
	}
}
impl StreamHandler for VerifyStreamHandler {
	type Request = VerifyRequest;
	type Response = VerifyResponse;

	fn handle(&self, request: VerifyRequest) -> Result<VerifyResponse> {
		self.0.verify(&request)
	}
}

/// Lifecycle of a stream session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
	/// Accepting and answering requests.
	Open,
	/// Peer finished sending; every accepted request has been answered.
	Draining,
	/// Terminal; nothing more is received or sent.
	Closed,
}
impl SessionState {
	/// Returns a stable label suitable for span or event fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			SessionState::Open => "open",
			SessionState::Draining => "draining",
			SessionState::Closed => "closed",
		}
	}
}
impl Display for SessionState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Creates a linked cancellation handle/signal pair for one call.
pub fn cancellation() -> (CancelHandle, CancelSignal) {
	let (tx, rx) = watch::channel(false);

	(CancelHandle(tx), CancelSignal(rx))
}

/// Cancels the call its [`CancelSignal`] belongs to.
///
/// Dropping the handle without calling [`CancelHandle::cancel`] never cancels the call.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);
impl CancelHandle {
	/// Signals cancellation; sessions stop before their next send or receive completes.
	pub fn cancel(&self) {
		self.0.send_replace(true);
	}
}

/// Observes cancellation of a call's context.
#[derive(Clone, Debug)]
pub struct CancelSignal(watch::Receiver<bool>);
impl CancelSignal {
	/// Signal that is never raised.
	pub fn never() -> Self {
		cancellation().1
	}

	/// Whether the call has been cancelled.
	pub fn is_cancelled(&self) -> bool {
		*self.0.borrow()
	}

	/// Resolves once the call is cancelled.
	pub async fn cancelled(&mut self) {
		let handle_gone = self.0.wait_for(|cancelled| *cancelled).await.is_err();

		if handle_gone {
			std::future::pending::<()>().await;
		}
	}
}

/// Counters reported when a session closes cleanly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
	/// Requests accepted from the peer.
	pub received: u64,
	/// Responses accepted by the transport.
	pub sent: u64,
}

/// One open stream exchange between the service and a peer.
pub struct StreamSession<H, T>
where
	H: StreamHandler,
	T: SessionTransport<H::Request, H::Response>,
{
	handler: H,
	transport: T,
	cancel: CancelSignal,
	state: SessionState,
	summary: SessionSummary,
}
impl<H, T> StreamSession<H, T>
where
	H: StreamHandler,
	T: SessionTransport<H::Request, H::Response>,
{
	/// Opens a session over `transport`.
	pub fn new(handler: H, transport: T, cancel: CancelSignal) -> Self {
		Self {
			handler,
			transport,
			cancel,
			state: SessionState::Open,
			summary: SessionSummary::default(),
		}
	}

	/// Current lifecycle state.
	pub fn state(&self) -> SessionState {
		self.state
	}

	/// Drives the session until the peer finishes, the transport fails, or the call is cancelled.
	///
	/// Any error closes the session immediately; a request whose response was not yet accepted is
	/// dropped and no further sends are attempted.
	pub async fn run(mut self) -> Result<SessionSummary> {
		let result = self.drive().await;

		if let Err(e) = &result {
			obs::event!(
				debug,
				received = self.summary.received,
				sent = self.summary.sent,
				error = %e,
				"stream session aborted"
			);

			self.state = SessionState::Closed;
		}

		result.map(|()| self.summary)
	}

	async fn drive(&mut self) -> Result<()> {
		loop {
			match self.state {
				SessionState::Open => {
					let next = self.step().await?;

					self.transition(next);
				},
				// Every accepted request was answered before the next receive.
				SessionState::Draining => self.transition(SessionState::Closed),
				SessionState::Closed => return Ok(()),
			}
		}
	}

	async fn step(&mut self) -> Result<SessionState> {
		let next = tokio::select! {
			biased;
			_ = self.cancel.cancelled() => return Err(Error::Cancelled),
			next = self.transport.recv() => next?,
		};
		let Some(request) = next else {
			return Ok(SessionState::Draining);
		};

		self.summary.received += 1;

		let response = self.handler.handle(request)?;

		self.respond(response).await?;

		Ok(SessionState::Open)
	}

	async fn respond(&mut self, response: H::Response) -> Result<()> {
		tokio::select! {
			biased;
			_ = self.cancel.cancelled() => return Err(Error::Cancelled),
			sent = self.transport.send(response) => sent?,
		}

		self.summary.sent += 1;

		Ok(())
	}

	fn transition(&mut self, next: SessionState) {
		if next != self.state {
			obs::event!(
				debug,
				from = self.state.as_str(),
				to = next.as_str(),
				received = self.summary.received,
				sent = self.summary.sent,
				"stream session transition"
			);

			self.state = next;
		}
	}
}
impl<H, T> Debug for StreamSession<H, T>
where
	H: StreamHandler,
	T: SessionTransport<H::Request, H::Response>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StreamSession")
			.field("state", &self.state)
			.field("summary", &self.summary)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	struct Echo;
	impl StreamHandler for Echo {
		type Request = u32;
		type Response = u32;

		fn handle(&self, request: u32) -> Result<u32> {
			if request == u32::MAX {
				return Err(Error::invalid_argument("sentinel"));
			}

			Ok(request * 10)
		}
	}

	/// Transport replaying a fixed script and recording what was sent.
	struct Scripted {
		inbound: Vec<Result<Option<u32>, TransportError>>,
		sent: Arc<Mutex<Vec<u32>>>,
		fail_sends_after: Option<usize>,
		sends: usize,
	}
	impl Scripted {
		fn new(items: impl IntoIterator<Item = u32>) -> Self {
			let mut inbound = items.into_iter().map(|item| Ok(Some(item))).collect::<Vec<_>>();

			inbound.push(Ok(None));
			inbound.reverse();

			Self { inbound, sent: Default::default(), fail_sends_after: None, sends: 0 }
		}
	}
	impl SessionTransport<u32, u32> for Scripted {
		fn recv(&mut self) -> TransportFuture<'_, Option<u32>> {
			let next = self.inbound.pop().unwrap_or(Ok(None));

			Box::pin(async move { next })
		}

		fn send(&mut self, response: u32) -> TransportFuture<'_, ()> {
			let fail = self.fail_sends_after.is_some_and(|limit| self.sends >= limit);

			self.sends += 1;

			if !fail {
				self.sent.lock().push(response);
			}

			Box::pin(async move { if fail { Err(TransportError::Disconnected) } else { Ok(()) } })
		}
	}

	#[tokio::test]
	async fn responses_follow_request_order() {
		let transport = Scripted::new([3, 1, 2]);
		let sent = transport.sent.clone();
		let summary = StreamSession::new(Echo, transport, CancelSignal::never())
			.run()
			.await
			.expect("Session should close cleanly.");

		assert_eq!(*sent.lock(), vec![30, 10, 20]);
		assert_eq!(summary, SessionSummary { received: 3, sent: 3 });
	}

	#[tokio::test]
	async fn empty_stream_closes_cleanly() {
		let summary = StreamSession::new(Echo, Scripted::new([]), CancelSignal::never())
			.run()
			.await
			.expect("Empty session should close cleanly.");

		assert_eq!(summary, SessionSummary::default());
	}

	#[tokio::test]
	async fn receive_failure_aborts_session() {
		let mut transport = Scripted::new([1]);

		transport.inbound.insert(1, Err(TransportError::Disconnected));

		let sent = transport.sent.clone();
		let err = StreamSession::new(Echo, transport, CancelSignal::never())
			.run()
			.await
			.expect_err("Receive failure should abort the session.");

		assert!(matches!(err, Error::Transport(TransportError::Disconnected)));
		assert_eq!(*sent.lock(), vec![10]);
	}

	#[tokio::test]
	async fn send_failure_stops_processing() {
		let mut transport = Scripted::new([1, 2, 3]);

		transport.fail_sends_after = Some(1);

		let sent = transport.sent.clone();
		let err = StreamSession::new(Echo, transport, CancelSignal::never())
			.run()
			.await
			.expect_err("Send failure should abort the session.");

		assert!(matches!(err, Error::Transport(_)));
		assert_eq!(*sent.lock(), vec![10]);
	}

	#[tokio::test]
	async fn draining_sends_nothing_after_the_last_response() {
		let mut transport = Scripted::new([4, 5]);

		// Any send beyond one per request fails the session.
		transport.fail_sends_after = Some(2);

		let sent = transport.sent.clone();
		let summary = StreamSession::new(Echo, transport, CancelSignal::never())
			.run()
			.await
			.expect("Draining should not attempt extra sends.");

		assert_eq!(*sent.lock(), vec![40, 50]);
		assert_eq!(summary, SessionSummary { received: 2, sent: 2 });
	}

	#[tokio::test]
	async fn handler_error_aborts_session() {
		let transport = Scripted::new([1, u32::MAX, 2]);
		let sent = transport.sent.clone();
		let err = StreamSession::new(Echo, transport, CancelSignal::never())
			.run()
			.await
			.expect_err("Handler failure should abort the session.");

		assert!(matches!(err, Error::InvalidArgument { .. }));
		assert_eq!(*sent.lock(), vec![10]);
	}

	#[tokio::test]
	async fn cancelled_session_sends_nothing() {
		let (handle, signal) = cancellation();
		let transport = Scripted::new([1, 2]);
		let sent = transport.sent.clone();

		handle.cancel();

		let err = StreamSession::new(Echo, transport, signal)
			.run()
			.await
			.expect_err("Cancelled session should abort.");

		assert!(matches!(err, Error::Cancelled));
		assert!(sent.lock().is_empty());
	}

	#[test]
	fn never_signal_is_not_cancelled() {
		assert!(!CancelSignal::never().is_cancelled());

		let (handle, signal) = cancellation();

		handle.cancel();

		assert!(signal.is_cancelled());
	}

	#[test]
	fn new_sessions_start_open() {
		let session = StreamSession::new(Echo, Scripted::new([]), CancelSignal::never());

		assert_eq!(session.state(), SessionState::Open);
		assert_eq!(SessionState::Draining.to_string(), "draining");
	}
}
