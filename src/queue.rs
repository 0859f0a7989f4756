//! FIFO work queue drained by a single throttled consumer task.
//!
//! Producers push [`QueuedUnit`]s from any task or thread. One consumer, spawned when the queue
//! starts, pops them in order, runs each to completion, and then sleeps for the configured delay
//! before popping again. [`QueueMessage::Stop`] tells the consumer to exit once everything ahead
//! of it has run.

// crates.io
use tokio::{
	sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
	task::JoinHandle,
};
// self
use crate::_prelude::*;

/// Unit of work executed exactly once by the consumer.
pub type QueuedUnit = Pin<Box<dyn Future<Output = ()> + 'static + Send>>;

/// Receives the outcome of a queued API call.
pub type ResultCallback = Box<dyn FnOnce(Result<Option<Value>>) + 'static + Send>;

/// Boxes `f` as an optional [`ResultCallback`].
pub fn on_result<F>(f: F) -> Option<ResultCallback>
where
	F: 'static + Send + FnOnce(Result<Option<Value>>),
{
	Some(Box::new(f))
}

/// Messages carried by the queue.
pub enum QueueMessage {
	/// Work to execute.
	Unit(QueuedUnit),
	/// Drain-and-stop sentinel.
	Stop,
}
impl Debug for QueueMessage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			QueueMessage::Unit(_) => f.write_str("Unit(..)"),
			QueueMessage::Stop => f.write_str("Stop"),
		}
	}
}

/// Producer side of the queue plus the consumer's join handle.
#[derive(Debug)]
pub struct RequestQueue {
	sender: Mutex<Option<UnboundedSender<QueueMessage>>>,
	consumer: Mutex<Option<JoinHandle<u64>>>,
}
impl RequestQueue {
	/// Spawns the consumer on the current Tokio runtime.
	///
	/// # Panics
	///
	/// Panics when called outside a Tokio runtime.
	pub fn start(delay: StdDuration) -> Self {
		let (sender, receiver) = mpsc::unbounded_channel();
		let consumer = tokio::spawn(consume(receiver, delay));

		Self { sender: Mutex::new(Some(sender)), consumer: Mutex::new(Some(consumer)) }
	}

	/// Appends a unit of work.
	pub fn push(&self, unit: QueuedUnit) -> Result<()> {
		let sender = self.sender.lock();
		let sender = sender.as_ref().ok_or(Error::QueueClosed)?;

		sender.send(QueueMessage::Unit(unit)).map_err(|_| Error::QueueClosed)
	}

	/// Enqueues the stop sentinel and refuses further work. Calling it twice is a no-op.
	pub fn stop(&self) -> Result<()> {
		let Some(sender) = self.sender.lock().take() else {
			return Ok(());
		};

		sender.send(QueueMessage::Stop).map_err(|_| Error::QueueClosed)
	}

	/// Returns `true` once [`RequestQueue::stop`] has been called.
	pub fn is_stopped(&self) -> bool {
		self.sender.lock().is_none()
	}

	/// Waits for the consumer to exit and returns how many units it executed.
	///
	/// Only the first caller observes the count; later calls return `None`.
	pub async fn join(&self) -> Option<u64> {
		let handle = self.consumer.lock().take()?;

		match handle.await {
			Ok(executed) => Some(executed),
			Err(e) => {
				tracing::error!(error = %e, "Queue consumer terminated abnormally.");

				None
			},
		}
	}
}

async fn consume(mut receiver: UnboundedReceiver<QueueMessage>, delay: StdDuration) -> u64 {
	let mut executed = 0;

	while let Some(message) = receiver.recv().await {
		let QueueMessage::Unit(unit) = message else {
			break;
		};

		// A panicking unit only takes down its own task.
		if let Err(e) = tokio::spawn(unit).await {
			tracing::error!(error = %e, "Queued unit failed; continuing with the next one.");
		}

		executed += 1;

		tokio::time::sleep(delay).await;
	}

	tracing::info!(executed, "Queue halt signal received, ending consumer.");

	executed
}
