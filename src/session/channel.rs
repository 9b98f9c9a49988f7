//! In-process [`SessionTransport`] over bounded channels.
//!
//! Both directions are bounded, so a peer that stops reading responses eventually stalls the
//! session, which in turn stops draining requests. Only [`StreamClient::close_send`] ends input
//! cleanly; a client dropped without it is a disconnect.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use tokio::sync::mpsc;
// self
use crate::{
	_prelude::*,
	error::TransportError,
	session::{SessionTransport, TransportFuture},
};

/// Creates a connected client/transport pair buffering at most `capacity` items per direction.
pub fn channel<Req, Resp>(
	capacity: usize,
) -> (StreamClient<Req, Resp>, ChannelTransport<Req, Resp>)
where
	Req: Send,
	Resp: Send,
{
	let capacity = capacity.max(1);
	let (request_tx, request_rx) = mpsc::channel(capacity);
	let (response_tx, response_rx) = mpsc::channel(capacity);
	let half_closed = Arc::new(AtomicBool::new(false));
	let client = StreamClient {
		requests: Some(request_tx),
		responses: response_rx,
		half_closed: half_closed.clone(),
	};
	let transport =
		ChannelTransport { requests: request_rx, responses: response_tx, half_closed };

	(client, transport)
}

/// Service-side end of an in-process stream.
#[derive(Debug)]
pub struct ChannelTransport<Req, Resp> {
	requests: mpsc::Receiver<Result<Req, TransportError>>,
	responses: mpsc::Sender<Resp>,
	half_closed: Arc<AtomicBool>,
}
impl<Req, Resp> SessionTransport<Req, Resp> for ChannelTransport<Req, Resp>
where
	Req: Send,
	Resp: Send,
{
	fn recv(&mut self) -> TransportFuture<'_, Option<Req>> {
		Box::pin(async move {
			match self.requests.recv().await {
				Some(item) => item.map(Some),
				None if self.half_closed.load(Ordering::Acquire) => Ok(None),
				None => Err(TransportError::Disconnected),
			}
		})
	}

	fn send(&mut self, response: Resp) -> TransportFuture<'_, ()> {
		Box::pin(async move {
			self.responses.send(response).await.map_err(|_| TransportError::Disconnected)
		})
	}
}

/// Caller-side end of an in-process stream.
#[derive(Debug)]
pub struct StreamClient<Req, Resp> {
	requests: Option<mpsc::Sender<Result<Req, TransportError>>>,
	responses: mpsc::Receiver<Resp>,
	half_closed: Arc<AtomicBool>,
}
impl<Req, Resp> StreamClient<Req, Resp>
where
	Req: Send,
	Resp: Send,
{
	/// Sends one request, waiting while the request buffer is full.
	pub async fn send(&mut self, request: Req) -> Result<(), TransportError> {
		self.push(Ok(request)).await
	}

	/// Makes the service's next receive fail with `error`.
	pub async fn fail(&mut self, error: TransportError) -> Result<(), TransportError> {
		self.push(Err(error)).await
	}

	/// Signals end-of-input; the session drains and closes.
	pub fn close_send(&mut self) {
		self.half_closed.store(true, Ordering::Release);
		self.requests = None;
	}

	/// Receives the next response; `None` once the session has closed.
	pub async fn recv(&mut self) -> Option<Resp> {
		self.responses.recv().await
	}

	async fn push(&mut self, item: Result<Req, TransportError>) -> Result<(), TransportError> {
		let requests = self.requests.as_ref().ok_or(TransportError::Disconnected)?;

		requests.send(item).await.map_err(|_| TransportError::Disconnected)
	}
}
