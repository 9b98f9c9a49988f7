// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	admission::CallKind,
	obs::CallOutcome,
	service::Method,
};

/// Records a call outcome via the global metrics recorder (when enabled).
pub fn record_call_outcome(method: Method, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"docsign_call_total",
			"method" => method.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (method, outcome);
	}
}

/// Records how long a call waited for a rate slot (when enabled).
pub fn record_admission_wait(kind: CallKind, waited: Duration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!("docsign_admission_wait_seconds", "kind" => kind.as_str())
			.record(waited.as_secs_f64());
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, waited);
	}
}

/// Thread-safe counters describing admission and session activity.
#[derive(Debug, Default)]
pub struct CallMetrics {
	admitted: AtomicU64,
	rejected: AtomicU64,
	throttled: AtomicU64,
	sessions_closed: AtomicU64,
	sessions_aborted: AtomicU64,
}
impl CallMetrics {
	/// Calls that passed the admission gate.
	pub fn admitted(&self) -> u64 {
		self.admitted.load(Ordering::Relaxed)
	}

	/// Calls rejected by the authentication check.
	pub fn rejected(&self) -> u64 {
		self.rejected.load(Ordering::Relaxed)
	}

	/// Admitted calls that had to wait for a rate slot.
	pub fn throttled(&self) -> u64 {
		self.throttled.load(Ordering::Relaxed)
	}

	/// Stream sessions that drained and closed normally.
	pub fn sessions_closed(&self) -> u64 {
		self.sessions_closed.load(Ordering::Relaxed)
	}

	/// Stream sessions torn down by an error or cancellation.
	pub fn sessions_aborted(&self) -> u64 {
		self.sessions_aborted.load(Ordering::Relaxed)
	}

	pub(crate) fn record_admitted(&self, throttled: bool) {
		self.admitted.fetch_add(1, Ordering::Relaxed);

		if throttled {
			self.throttled.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_rejected(&self) {
		self.rejected.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_session_end(&self, clean: bool) {
		if clean {
			self.sessions_closed.fetch_add(1, Ordering::Relaxed);
		} else {
			self.sessions_aborted.fetch_add(1, Ordering::Relaxed);
		}
	}
}
