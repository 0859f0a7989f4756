// self
use crate::{_prelude::*, http::Method};

/// Span wrapper used around every API call.
#[derive(Clone, Debug)]
pub struct CallSpan {
	span: tracing::Span,
}
impl CallSpan {
	/// Creates a new span tagged with the method, endpoint, and stage.
	pub fn new(method: Method, endpoint: &str, stage: &'static str) -> Self {
		let span = tracing::info_span!(
			"throttled_api.call",
			method = method.as_str(),
			endpoint,
			stage
		);

		Self { span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> tracing::instrument::Instrumented<Fut>
	where
		Fut: Future,
	{
		use tracing::Instrument;

		fut.instrument(self.span.clone())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = CallSpan::new(Method::Get, "groups", "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
