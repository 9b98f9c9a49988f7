//! Optional observability helpers for service calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `docsign.call` with the `method` and `stage`
//!   fields, plus events for admission rejections, throttling, and session transitions.
//! - Enable `metrics` to increment the `docsign_call_total` counter for every
//!   attempt/success/failure, labeled by `method` + `outcome`, and to record
//!   `docsign_admission_wait_seconds`.
//!
//! [`CallMetrics`] counters are always available regardless of features.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry into the service facade.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Emits a `tracing` event when the feature is enabled; compiles to nothing otherwise.
macro_rules! event {
	($level:ident, $($arg:tt)+) => {
		#[cfg(feature = "tracing")]
		{
			::tracing::$level!($($arg)+);
		}
	};
}
pub(crate) use event;
