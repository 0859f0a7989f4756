//! Helpers shared by the integration suites.

#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	fmt::{Debug, Write as _},
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{
	Event, Level, Subscriber,
	field::{Field, Visit},
};
use tracing_subscriber::{
	layer::{Context, Layer, SubscriberExt},
	registry,
};
// self
use throttled_api::{
	auth::BearerToken,
	error::{AuthError, TransportError},
	http::{ApiResponse, HttpRequest, Method, Transport, TransportFuture},
	provider::TokenProvider,
};

/// Provider that returns `token-1`, `token-2`, ... and counts its invocations.
#[derive(Clone, Default)]
pub struct CountingProvider {
	calls: Arc<AtomicUsize>,
}
impl CountingProvider {
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl TokenProvider for CountingProvider {
	fn fetch_token(&self) -> throttled_api::provider::TokenFuture<'_> {
		let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

		Box::pin(async move { Ok(BearerToken::new(format!("token-{n}"))) })
	}
}

/// Provider that always fails.
pub struct FailingProvider;
impl TokenProvider for FailingProvider {
	fn fetch_token(&self) -> throttled_api::provider::TokenFuture<'_> {
		Box::pin(async {
			Err(AuthError::Rejected { status: Some(401), message: "bad credentials".into() })
		})
	}
}

/// What a [`ScriptedTransport`] does for one request.
pub enum Step {
	Respond(ApiResponse),
	Fail,
}

/// Request observed by a [`ScriptedTransport`].
#[derive(Clone, Debug)]
pub struct Recorded {
	pub method: Method,
	pub url: String,
	pub bearer: String,
	pub body: Option<Value>,
	pub at: Instant,
}

/// In-memory transport that replays scripted steps and records every request.
///
/// Once the script runs out it answers `200 {}`.
pub struct ScriptedTransport {
	steps: Mutex<VecDeque<Step>>,
	log: Arc<Mutex<Vec<Recorded>>>,
}
impl ScriptedTransport {
	pub fn new(steps: impl IntoIterator<Item = Step>) -> (Self, Arc<Mutex<Vec<Recorded>>>) {
		let log = Arc::new(Mutex::new(Vec::new()));

		(Self { steps: Mutex::new(steps.into_iter().collect()), log: log.clone() }, log)
	}
}
impl Transport for ScriptedTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		let body = request
			.body
			.as_deref()
			.map(|raw| serde_json::from_slice(raw).expect("Recorded body should be valid JSON."));

		self.log.lock().push(Recorded {
			method: request.method,
			url: request.url.to_string(),
			bearer: request.bearer.expose().to_owned(),
			body,
			at: Instant::now(),
		});

		let step = self.steps.lock().pop_front();

		Box::pin(async move {
			match step {
				Some(Step::Respond(response)) => Ok(response),
				Some(Step::Fail) => Err(TransportError::Io(std::io::Error::new(
					std::io::ErrorKind::ConnectionRefused,
					"scripted failure",
				))),
				None => Ok(ApiResponse::new(200, "{}")),
			}
		})
	}
}

/// Log event captured by [`LogCapture`].
#[derive(Clone, Debug)]
pub struct CapturedEvent {
	pub level: Level,
	pub fields: String,
}

/// Tracing layer that records every event for assertions.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<CapturedEvent>>>);
impl LogCapture {
	/// Installs the capture as the default subscriber for the current thread.
	pub fn install(&self) -> tracing::subscriber::DefaultGuard {
		tracing::subscriber::set_default(registry().with(self.clone()))
	}

	pub fn at_level(&self, level: Level) -> Vec<CapturedEvent> {
		self.0.lock().iter().filter(|event| event.level == level).cloned().collect()
	}
}
impl<S> Layer<S> for LogCapture
where
	S: Subscriber,
{
	fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
		let mut fields = FieldCollector::default();

		event.record(&mut fields);
		self.0.lock().push(CapturedEvent { level: *event.metadata().level(), fields: fields.0 });
	}
}

#[derive(Default)]
struct FieldCollector(String);
impl Visit for FieldCollector {
	fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
		let _ = write!(self.0, "{}={:?} ", field.name(), value);
	}
}
