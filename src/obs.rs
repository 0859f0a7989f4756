//! Observability helpers for API calls.
//!
//! Every call runs inside a `throttled_api.call` span tagged with `method`, `endpoint` and
//! `stage`. Log events are plain `tracing` events, so the binary that owns the process decides
//! where they go by installing a subscriber.
//!
//! # Feature Flags
//!
//! - Enable `metrics` to increment the `throttled_api_call_total` counter for every
//!   attempt and outcome, labeled by `method` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Request about to be sent.
	Attempt,
	/// 2xx response handled.
	Success,
	/// Non-2xx response returned as an API error.
	Rejected,
	/// No response received.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Rejected => "rejected",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
