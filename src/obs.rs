//! Optional observability helpers for resolution, descriptor builds, and token exchanges.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `openid_auth.exchange` with the `grant` and
//!   `stage` fields, plus log events for provider resolution and pipeline configuration.
//! - Enable `metrics` to increment the `openid_auth_exchange_total` counter for every
//!   attempt/success/failure, labeled by `grant` + `outcome`.
//!
//! Secrets never reach these helpers: callers pass provider aliases, flags, and error
//! displays only.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

pub(crate) use tracing::log_event;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each exchange attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a grant handler.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
