//! Syncs CRM contacts into a mocked meetings API: reads every page of contacts directly, then
//! queues one registration per contact and waits for the throttled consumer to drain.

// std
use std::time::Duration as StdDuration;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use url::Url;
// self
use throttled_api::{
	ApiClient, ClientConfig,
	provider::{PasswordGrantConfig, PasswordGrantProvider},
	queue::on_result,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt().with_target(false).init();

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/services/oauth2/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\"}");
		})
		.await;
	let next_page = server.url("/services/data/contacts?page=2");

	server
		.mock_async(|when, then| {
			when.method(GET).path("/services/data/contacts").query_param("page", "1");
			then.status(200)
				.header("content-type", "application/json")
				.header("link", format!("<{next_page}>; rel=\"next\""))
				.body("{\"records\":[{\"id\":\"003A\",\"email\":\"ada@example.com\"}]}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/services/data/contacts").query_param("page", "2");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"records\":[{\"id\":\"003B\",\"email\":\"grace@example.com\"}]}");
		})
		.await;

	let register_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/services/data/webinars/42/registrants");
			then.status(201).header("content-type", "application/json").body("{\"id\":\"99\"}");
		})
		.await;
	let provider = PasswordGrantProvider::new(PasswordGrantConfig::new(
		Url::parse(&server.url("/services/oauth2/token"))?,
		"demo-client",
		"demo-secret",
		"integration@example.com",
		"demo-password",
	))?;
	let config = ClientConfig::builder(Url::parse(&server.url("/services/data/"))?)
		.min_delay(StdDuration::from_millis(200))
		.build()?;
	let client = ApiClient::new(config, provider).await?;
	let contacts = client.call("contacts", &[("page", "1")]).await?.unwrap_or(Value::Null);
	let records = contacts["records"].as_array().cloned().unwrap_or_default();
	let (tx, mut rx) = mpsc::unbounded_channel();

	for record in &records {
		let tx = tx.clone();
		let contact = record["id"].as_str().unwrap_or_default().to_owned();

		client.queue_post(
			"webinars/42/registrants",
			&json!({ "email": record["email"] }),
			&[],
			on_result(move |result| {
				let _ = tx.send((contact, result));
			}),
		)?;
	}

	drop(tx);

	let executed = client.shutdown().await?;

	while let Some((contact, result)) = rx.recv().await {
		println!("Registered contact {contact}: {:?}.", result?);
	}

	println!("Consumer executed {} queued calls.", executed.unwrap_or_default());

	token_mock.assert_async().await;
	register_mock.assert_calls_async(records.len()).await;

	Ok(())
}
