// self
use crate::{_prelude::*, error::Code, service::Method};

/// Future returned by [`CallSpan::instrument`]; the bare future when tracing is compiled out.
#[cfg(feature = "tracing")]
pub type InstrumentedCall<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`CallSpan::instrument`]; the bare future when tracing is compiled out.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCall<F> = F;

/// `docsign.call` span covering one facade call from admission to the last response.
///
/// The `code` field starts empty and is filled in by [`CallSpan::record_code`] when the call
/// fails, so successful calls carry no status.
#[derive(Clone, Debug)]
pub struct CallSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CallSpan {
	/// Opens the span for `method`; `stage` is `unary` or `stream`.
	pub fn new(method: Method, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"docsign.call",
				method = method.as_str(),
				stage,
				code = tracing::field::Empty
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (method, stage);

			Self {}
		}
	}

	/// Stamps the status code the call failed with.
	pub fn record_code(&self, code: Code) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("code", code.as_str());
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = code;
		}
	}

	/// Runs `fut` inside the span; no guard is held across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCall<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}
