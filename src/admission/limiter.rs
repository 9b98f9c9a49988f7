//! Throttling limiters that delay calls until an admission slot is free.
//!
//! A limiter never rejects: [`RateLimit::acquire`] resolves once the caller may proceed.

// crates.io
use tokio::time::{self, Instant};
// self
use crate::{_prelude::*, error::ConfigError};

/// Boxed future returned by [`RateLimit::acquire`].
pub type RateFuture<'a> = Pin<Box<dyn Future<Output = RateToken> + 'a + Send>>;

/// Shared admission limiter consulted once per call.
pub trait RateLimit
where
	Self: Send + Sync,
{
	/// Waits for the next admission slot.
	fn acquire(&self) -> RateFuture<'_>;
}

/// Proof that a call consumed one admission slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateToken {
	/// Instant the slot was scheduled for.
	pub granted_at: Instant,
	/// Time the caller spent waiting for the slot.
	pub waited: Duration,
}
impl RateToken {
	/// Whether the caller had to wait at all.
	pub fn was_throttled(&self) -> bool {
		!self.waited.is_zero()
	}
}

/// Leaky-bucket limiter spacing admissions `1 / rate` seconds apart.
///
/// The bucket tracks the theoretical arrival time of the next admission; reservations are
/// serialized by a lock so concurrent callers never share or lose a slot. Up to `burst` calls may
/// pass back-to-back after an idle period. A caller that gives up while waiting hands its slot
/// back unless later callers have already queued behind it.
#[derive(Debug)]
pub struct LeakyBucket {
	interval: Duration,
	burst_window: Duration,
	next: Mutex<Option<Instant>>,
}
impl LeakyBucket {
	/// Creates a limiter admitting `per_second` calls per second with no burst.
	pub fn per_second(per_second: u32) -> Result<Self, ConfigError> {
		if per_second == 0 {
			return Err(ConfigError::ZeroRateLimit);
		}

		Ok(Self {
			interval: Duration::from_secs(1) / per_second,
			burst_window: Duration::ZERO,
			next: Mutex::new(None),
		})
	}

	/// Allows up to `burst` back-to-back admissions after an idle period.
	pub fn with_burst(mut self, burst: u32) -> Result<Self, ConfigError> {
		if burst == 0 {
			return Err(ConfigError::ZeroBurst);
		}

		self.burst_window = self.interval * (burst - 1);

		Ok(self)
	}

	/// Spacing between sustained admissions.
	pub fn interval(&self) -> Duration {
		self.interval
	}

	/// Reserves the next slot at or after `now`.
	fn reserve(&self, now: Instant) -> Reservation<'_> {
		let mut next = self.next.lock();
		let theoretical = next.map_or(now, |at| at.max(now));
		let slot = theoretical.checked_sub(self.burst_window).map_or(now, |at| at.max(now));
		let claimed_next = theoretical + self.interval;

		*next = Some(claimed_next);

		Reservation { bucket: self, slot, claimed_next, committed: false }
	}
}
impl RateLimit for LeakyBucket {
	fn acquire(&self) -> RateFuture<'_> {
		Box::pin(async move {
			let now = Instant::now();
			let reservation = self.reserve(now);

			if reservation.slot > now {
				time::sleep_until(reservation.slot).await;
			}

			let slot = reservation.commit();

			RateToken { granted_at: slot, waited: slot - now }
		})
	}
}

/// Slot claimed from a [`LeakyBucket`], handed back if dropped before it is committed.
struct Reservation<'a> {
	bucket: &'a LeakyBucket,
	slot: Instant,
	claimed_next: Instant,
	committed: bool,
}
impl Reservation<'_> {
	fn commit(mut self) -> Instant {
		self.committed = true;

		self.slot
	}
}
impl Drop for Reservation<'_> {
	fn drop(&mut self) {
		if self.committed {
			return;
		}

		let mut next = self.bucket.next.lock();

		// Only the most recent claim can be returned; later callers already queued behind it.
		if *next == Some(self.claimed_next) {
			*next = self.claimed_next.checked_sub(self.bucket.interval);
		}
	}
}

/// Limiter that admits every call immediately.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unlimited;
impl RateLimit for Unlimited {
	fn acquire(&self) -> RateFuture<'_> {
		Box::pin(async { RateToken { granted_at: Instant::now(), waited: Duration::ZERO } })
	}
}
