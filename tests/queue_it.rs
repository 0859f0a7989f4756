// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use parking_lot::Mutex;
use serde_json::json;
use tokio::time::Instant;
use tracing::Level;
// self
use throttled_api::{
	ApiClient, ClientConfig, Error,
	http::{ApiResponse, Method},
	queue::on_result,
};

mod common;
use common::{CountingProvider, LogCapture, ScriptedTransport, Step};

const MIN_DELAY: StdDuration = StdDuration::from_millis(400);

fn build_config() -> ClientConfig {
	ClientConfig::builder(
		"https://api.example.com/v2/".parse().expect("Static API root should parse successfully."),
	)
	.min_delay(MIN_DELAY)
	.build()
	.expect("Client config should build for the static API root.")
}

async fn build_client(
	steps: impl IntoIterator<Item = Step>,
) -> (ApiClient<ScriptedTransport>, Arc<Mutex<Vec<common::Recorded>>>) {
	let (transport, log) = ScriptedTransport::new(steps);
	let client = ApiClient::with_transport(build_config(), CountingProvider::default(), transport)
		.await
		.expect("Client should construct with a scripted transport.");

	(client, log)
}

#[tokio::test(start_paused = true)]
async fn queued_calls_run_in_fifo_order_at_min_delay() {
	let (client, log) = build_client([]).await;

	for i in 0..5 {
		client.queue_call(&format!("items/{i}"), &[], None).expect("Queue should accept the call.");
	}

	assert_eq!(client.shutdown().await.expect("Shutdown should stop the consumer."), Some(5));

	let log = log.lock();
	let urls = log.iter().map(|request| request.url.as_str()).collect::<Vec<_>>();

	assert_eq!(
		urls,
		[
			"https://api.example.com/v2/items/0",
			"https://api.example.com/v2/items/1",
			"https://api.example.com/v2/items/2",
			"https://api.example.com/v2/items/3",
			"https://api.example.com/v2/items/4",
		]
	);

	for pair in log.windows(2) {
		assert!(pair[1].at - pair[0].at >= MIN_DELAY);
	}

	assert!(log[4].at - log[0].at >= MIN_DELAY * 4);
}

#[tokio::test(start_paused = true)]
async fn stop_drains_pending_units_then_refuses_work() {
	let (client, _log) = build_client([]).await;
	let ran = Arc::new(Mutex::new(Vec::new()));

	for i in 0..3 {
		let ran = ran.clone();

		client
			.queue_unit(async move { ran.lock().push(i) })
			.expect("Queue should accept work before stopping.");
	}

	client.stop_consumer().expect("Stop should enqueue the sentinel.");

	assert!(matches!(client.queue_call("items", &[], None), Err(Error::QueueClosed)));
	assert!(matches!(client.queue_unit(async {}), Err(Error::QueueClosed)));
	assert_eq!(client.join_consumer().await, Some(3));
	assert_eq!(*ran.lock(), vec![0, 1, 2]);
	assert_eq!(client.join_consumer().await, None);
}

#[tokio::test(start_paused = true)]
async fn queued_post_result_reaches_callback_before_next_unit() {
	let (client, log) =
		build_client([Step::Respond(ApiResponse::new(201, "{\"id\":\"99\"}"))]).await;
	let delivered = Arc::new(Mutex::new(None));
	let slot = delivered.clone();

	client
		.queue_post(
			"groups/42/members",
			&json!({ "userId": "7" }),
			&[],
			on_result(move |result| {
				*slot.lock() = Some((result, Instant::now()));
			}),
		)
		.expect("Queue should accept the POST.");
	client.queue_call("groups/42", &[], None).expect("Queue should accept the GET.");
	client.shutdown().await.expect("Shutdown should stop the consumer.");

	let (result, delivered_at) =
		delivered.lock().take().expect("Callback should have received the POST result.");
	let log = log.lock();

	assert_eq!(result.expect("Queued POST should succeed."), Some(json!({ "id": "99" })));
	assert_eq!(log[0].method, Method::Post);
	assert_eq!(log[0].body, Some(json!({ "userId": "7" })));
	assert_eq!(log[0].bearer, "token-1");
	assert!(log[1].at - delivered_at >= MIN_DELAY);
}

#[tokio::test(start_paused = true)]
async fn queued_put_and_delete_reach_callbacks_at_min_delay() {
	let (client, log) = build_client([
		Step::Respond(ApiResponse::new(200, "{\"name\":\"Ada\"}")),
		Step::Respond(ApiResponse::new(204, "")),
	])
	.await;
	let results = Arc::new(Mutex::new(Vec::new()));
	let put_results = results.clone();
	let delete_results = results.clone();

	client
		.queue_put(
			"users/7",
			&json!({ "name": "Ada" }),
			&[("notify", "false")],
			on_result(move |result| {
				put_results.lock().push(result);
			}),
		)
		.expect("Queue should accept the PUT.");
	client
		.queue_delete(
			"users/7",
			&[],
			on_result(move |result| {
				delete_results.lock().push(result);
			}),
		)
		.expect("Queue should accept the DELETE.");

	assert_eq!(client.shutdown().await.expect("Shutdown should stop the consumer."), Some(2));

	let results = results.lock();
	let log = log.lock();

	assert!(matches!(&results[0], Ok(Some(body)) if body == &json!({ "name": "Ada" })));
	assert!(matches!(results[1], Ok(None)));
	assert_eq!(log[0].method, Method::Put);
	assert_eq!(log[0].url, "https://api.example.com/v2/users/7?notify=false");
	assert_eq!(log[0].body, Some(json!({ "name": "Ada" })));
	assert_eq!(log[1].method, Method::Delete);
	assert_eq!(log[1].url, "https://api.example.com/v2/users/7");
	assert_eq!(log[1].body, None);
	assert!(log[1].at - log[0].at >= MIN_DELAY);
}

#[tokio::test(start_paused = true)]
async fn queued_transport_failure_is_logged_once() {
	let capture = LogCapture::default();
	let _guard = capture.install();
	let (client, _log) = build_client([Step::Fail]).await;

	client.queue_call("down", &[], None).expect("Queue should accept the call.");
	client.shutdown().await.expect("Shutdown should stop the consumer.");

	let errors = capture.at_level(Level::ERROR);

	assert_eq!(errors.len(), 1);
	assert!(errors[0].fields.contains("API request failed without a response."));
	assert!(errors[0].fields.contains("down"));
}

#[tokio::test(start_paused = true)]
async fn failing_unit_does_not_halt_the_queue() {
	let (client, log) = build_client([
		Step::Fail,
		Step::Respond(ApiResponse::new(500, "")),
		Step::Respond(ApiResponse::new(200, "{\"ok\":true}")),
	])
	.await;
	let results = Arc::new(Mutex::new(Vec::new()));

	for endpoint in ["down", "broken", "healthy"] {
		let results = results.clone();

		client
			.queue_call(
				endpoint,
				&[],
				on_result(move |result| {
					results.lock().push(result);
				}),
			)
			.expect("Queue should accept the call.");
	}

	client
		.queue_unit(async {
			panic!("unit exploded");
		})
		.expect("Queue should accept the panicking unit.");
	client.queue_call("after-panic", &[], None).expect("Queue should accept the call.");

	assert_eq!(client.shutdown().await.expect("Shutdown should stop the consumer."), Some(5));

	let results = results.lock();

	assert!(matches!(results[0], Err(Error::Transport(_))));
	assert!(
		matches!(&results[1], Err(Error::Api(api)) if api.status == 500 && api.body.is_null())
	);
	assert!(matches!(&results[2], Ok(Some(body)) if body == &json!({ "ok": true })));
	assert_eq!(log.lock().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn follow_up_pages_wait_min_delay() {
	let (client, log) = build_client([
		Step::Respond(
			ApiResponse::new(200, "[1,2]")
				.with_link("<https://api.example.com/v2/items?page=2>; rel=\"next\""),
		),
		Step::Respond(
			ApiResponse::new(200, "[3]")
				.with_link("<https://cdn.example.com/export?cursor=abc>; rel=\"next\""),
		),
		Step::Respond(ApiResponse::new(200, "[4]")),
	])
	.await;
	let merged = client.call("items", &[]).await.expect("Paginated call should succeed.");
	let log = log.lock();

	assert_eq!(merged, Some(json!([1, 2, 3, 4])));
	assert_eq!(log[1].url, "https://api.example.com/v2/items?page=2");
	assert_eq!(log[2].url, "https://cdn.example.com/export?cursor=abc");
	assert!(log[1].at - log[0].at >= MIN_DELAY);
	assert!(log[2].at - log[1].at >= MIN_DELAY);
	assert_eq!(client.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn blank_success_body_yields_none() {
	let (client, _log) = build_client([Step::Respond(ApiResponse::new(202, "  "))]).await;
	let result = client
		.post("jobs", &json!({ "kind": "export" }), &[])
		.await
		.expect("Accepted POST should succeed.");

	assert_eq!(result, None);
	assert_eq!(
		client.last_response().map(|summary| (summary.method, summary.status)),
		Some((Method::Post, 202))
	);
}
