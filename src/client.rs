//! Throttled API client: direct and queued calls, response classification, and page following.
//!
//! An [`ApiClient`] owns one API root, the current bearer token, and a [`RequestQueue`] whose
//! consumer drains queued calls at a fixed rate. Direct calls (`call`, `post`, `put`, `delete`)
//! bypass the queue and may overlap with the consumer's in-flight request.
//!
//! Every response, whatever its status, goes through the same funnel:
//!
//! 1. Non-2xx → logged at error level and returned as [`Error::Api`] with the parsed body.
//! 2. 2xx with a blank body → `Ok(None)`.
//! 3. 2xx → parsed JSON; when the `Link` header announces a next page, the client sleeps for the
//!    configured delay, fetches it, and merges it in, until a page comes back without one.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::BearerToken,
	config::ClientConfig,
	error::{ApiError, ConfigError},
	http::{ApiRequest, ApiResponse, HttpRequest, Method, Transport},
	obs::{self, CallOutcome, CallSpan},
	pagination,
	provider::TokenProvider,
	queue::{QueuedUnit, RequestQueue, ResultCallback},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestTransport>;

/// Summary of the most recent response the client received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseSummary {
	/// Method of the request that produced the response.
	pub method: Method,
	/// Endpoint of the request, relative to the base URL.
	pub endpoint: String,
	/// HTTP status code.
	pub status: u16,
}

/// Rate-limited client for one external REST API.
pub struct ApiClient<T>
where
	T: Transport,
{
	inner: Arc<ClientInner<T>>,
	queue: RequestQueue,
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Fetches the initial token and starts the queue consumer, using a default reqwest client.
	///
	/// Must be called within a Tokio runtime.
	pub async fn new<P>(config: ClientConfig, provider: P) -> Result<Self>
	where
		P: 'static + TokenProvider,
	{
		Self::with_transport(config, provider, ReqwestTransport::default()).await
	}
}
impl<T> ApiClient<T>
where
	T: Transport,
{
	/// Fetches the initial token through `provider` and starts the queue consumer.
	///
	/// Fails with [`Error::Auth`] when the provider cannot produce a token; no consumer is started
	/// in that case. Must be called within a Tokio runtime.
	pub async fn with_transport<P>(config: ClientConfig, provider: P, transport: T) -> Result<Self>
	where
		P: 'static + TokenProvider,
	{
		let token = provider.fetch_token().await?;

		tracing::info!(base_url = %config.base_url, "Fetched initial API token.");

		let queue = RequestQueue::start(config.min_delay);
		let inner = ClientInner {
			config,
			transport,
			provider: Arc::new(provider),
			token: RwLock::new(token),
			reset_guard: AsyncMutex::new(()),
			last_response: Mutex::new(None),
			call_count: AtomicU64::new(0),
		};

		Ok(Self { inner: Arc::new(inner), queue })
	}

	/// Returns the validated configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	/// Returns the bearer token currently attached to requests.
	pub fn current_token(&self) -> BearerToken {
		self.inner.token.read().clone()
	}

	/// Returns a summary of the most recent response received by any call.
	pub fn last_response(&self) -> Option<ResponseSummary> {
		self.inner.last_response.lock().clone()
	}

	/// Number of HTTP requests issued so far, page follow-ups included.
	///
	/// Callers that refresh the token every N calls can compare against this counter.
	pub fn call_count(&self) -> u64 {
		self.inner.call_count.load(Ordering::Relaxed)
	}

	/// Executes `request` immediately, bypassing the queue.
	pub async fn execute(&self, request: ApiRequest) -> Result<Option<Value>> {
		self.inner.execute(request).await
	}

	/// `GET endpoint?query`, following pagination links.
	pub async fn call(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Option<Value>> {
		self.execute(ApiRequest::get(endpoint).with_query(query.iter().copied())).await
	}

	/// `POST endpoint?query` with a JSON body.
	pub async fn post<B>(
		&self,
		endpoint: &str,
		body: &B,
		query: &[(&str, &str)],
	) -> Result<Option<Value>>
	where
		B: ?Sized + Serialize,
	{
		let body = encode(endpoint, body)?;

		self.execute(ApiRequest::post(endpoint, body).with_query(query.iter().copied())).await
	}

	/// `PUT endpoint?query` with a JSON body.
	pub async fn put<B>(
		&self,
		endpoint: &str,
		body: &B,
		query: &[(&str, &str)],
	) -> Result<Option<Value>>
	where
		B: ?Sized + Serialize,
	{
		let body = encode(endpoint, body)?;

		self.execute(ApiRequest::put(endpoint, body).with_query(query.iter().copied())).await
	}

	/// `DELETE endpoint?query`.
	pub async fn delete(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Option<Value>> {
		self.execute(ApiRequest::delete(endpoint).with_query(query.iter().copied())).await
	}

	/// Enqueues `request`; `on_result` receives the outcome once the consumer runs it.
	///
	/// Without a callback, failures the funnel has not already logged (anything but API and
	/// transport errors) are logged here so they never disappear silently.
	pub fn queue_request(
		&self,
		request: ApiRequest,
		on_result: Option<ResultCallback>,
	) -> Result<()> {
		let inner = Arc::clone(&self.inner);

		self.queue.push(Box::pin(async move {
			let method = request.method;
			let endpoint = request.endpoint.clone();
			let result = inner.execute(request).await;

			match on_result {
				Some(callback) => callback(result),
				None =>
					if let Err(e) = result
						&& !matches!(e, Error::Api(_) | Error::Transport(_))
					{
						tracing::error!(%method, %endpoint, error = %e, "Queued request failed.");
					},
			}
		}))
	}

	/// Enqueues a `GET`.
	pub fn queue_call(
		&self,
		endpoint: &str,
		query: &[(&str, &str)],
		on_result: Option<ResultCallback>,
	) -> Result<()> {
		self.queue_request(ApiRequest::get(endpoint).with_query(query.iter().copied()), on_result)
	}

	/// Enqueues a `POST` with a JSON body.
	pub fn queue_post<B>(
		&self,
		endpoint: &str,
		body: &B,
		query: &[(&str, &str)],
		on_result: Option<ResultCallback>,
	) -> Result<()>
	where
		B: ?Sized + Serialize,
	{
		let request = ApiRequest::post(endpoint, encode(endpoint, body)?);

		self.queue_request(request.with_query(query.iter().copied()), on_result)
	}

	/// Enqueues a `PUT` with a JSON body.
	pub fn queue_put<B>(
		&self,
		endpoint: &str,
		body: &B,
		query: &[(&str, &str)],
		on_result: Option<ResultCallback>,
	) -> Result<()>
	where
		B: ?Sized + Serialize,
	{
		let request = ApiRequest::put(endpoint, encode(endpoint, body)?);

		self.queue_request(request.with_query(query.iter().copied()), on_result)
	}

	/// Enqueues a `DELETE`.
	pub fn queue_delete(
		&self,
		endpoint: &str,
		query: &[(&str, &str)],
		on_result: Option<ResultCallback>,
	) -> Result<()> {
		self.queue_request(ApiRequest::delete(endpoint).with_query(query.iter().copied()), on_result)
	}

	/// Enqueues arbitrary work under the same throttle as queued calls.
	pub fn queue_unit<F>(&self, unit: F) -> Result<()>
	where
		F: 'static + Send + Future<Output = ()>,
	{
		let unit: QueuedUnit = Box::pin(unit);

		self.queue.push(unit)
	}

	/// Asks the token provider for a fresh token and swaps it in.
	///
	/// The provider is called exactly once per reset. Requests already in flight keep the token
	/// they were sent with.
	pub async fn reset_token(&self) -> Result<()> {
		let _guard = self.inner.reset_guard.lock().await;

		tracing::info!("Resetting API token.");

		let token = self.inner.provider.fetch_token().await?;

		*self.inner.token.write() = token;

		Ok(())
	}

	/// Enqueues the stop sentinel. Units already queued still run; new ones are refused with
	/// [`Error::QueueClosed`].
	pub fn stop_consumer(&self) -> Result<()> {
		self.queue.stop()
	}

	/// Waits for the consumer to exit; returns the number of units it executed.
	///
	/// Without a prior [`ApiClient::stop_consumer`] this waits until the client is dropped
	/// elsewhere, so call it after stopping.
	pub async fn join_consumer(&self) -> Option<u64> {
		self.queue.join().await
	}

	/// Stops the consumer and waits for every queued unit to finish.
	pub async fn shutdown(&self) -> Result<Option<u64>> {
		self.stop_consumer()?;

		Ok(self.join_consumer().await)
	}
}
impl<T> Debug for ApiClient<T>
where
	T: Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.inner.config.base_url.as_str())
			.field("min_delay", &self.inner.config.min_delay)
			.field("call_count", &self.call_count())
			.field("queue_stopped", &self.queue.is_stopped())
			.finish()
	}
}

struct ClientInner<T> {
	config: ClientConfig,
	transport: T,
	provider: Arc<dyn TokenProvider>,
	token: RwLock<BearerToken>,
	reset_guard: AsyncMutex<()>,
	last_response: Mutex<Option<ResponseSummary>>,
	call_count: AtomicU64,
}
impl<T> ClientInner<T>
where
	T: Transport,
{
	async fn execute(&self, request: ApiRequest) -> Result<Option<Value>> {
		let span = CallSpan::new(request.method, &request.endpoint, "execute");

		span.instrument(async {
			let response = self.send(&request).await?;

			self.handle_response(&request, response).await
		})
		.await
	}

	async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
		let url = request
			.resolve(&self.config.base_url)
			.map_err(|source| ConfigError::InvalidUrl { field: "endpoint", source })?;
		let body = request
			.body
			.as_ref()
			.map(serde_json::to_vec)
			.transpose()
			.map_err(|source| Error::Encode { endpoint: request.endpoint.clone(), source })?;
		let bearer = self.token.read().clone();

		self.call_count.fetch_add(1, Ordering::Relaxed);
		obs::record_call_outcome(request.method, CallOutcome::Attempt);
		tracing::debug!(method = %request.method, %url, "Sending API request.");

		let http_request = HttpRequest { method: request.method, url, bearer, body };

		match self.transport.execute(http_request).await {
			Ok(response) => {
				*self.last_response.lock() = Some(ResponseSummary {
					method: request.method,
					endpoint: request.endpoint.clone(),
					status: response.status,
				});

				Ok(response)
			},
			Err(e) => {
				obs::record_call_outcome(request.method, CallOutcome::Failure);
				tracing::error!(
					method = %request.method,
					endpoint = %request.endpoint,
					error = %e,
					"API request failed without a response."
				);

				Err(e.into())
			},
		}
	}

	async fn handle_response(
		&self,
		request: &ApiRequest,
		response: ApiResponse,
	) -> Result<Option<Value>> {
		if !response.is_success() {
			return Err(self.reject(request, response));
		}
		if request.method == Method::Delete {
			tracing::info!(endpoint = %request.endpoint, "Deleted.");
		}

		let mut next = self.next_endpoint(response.link.as_deref());
		let mut merged = parse_body(&request.endpoint, &response.body)?;

		while let Some(endpoint) = next {
			tokio::time::sleep(self.config.min_delay).await;

			let page_request = ApiRequest::get(endpoint);
			let page = self.send(&page_request).await?;

			if !page.is_success() {
				return Err(self.reject(&page_request, page));
			}

			tracing::debug!(endpoint = %page_request.endpoint, "Fetched next page.");

			next = self.next_endpoint(page.link.as_deref());

			if let Some(value) = parse_body(&page_request.endpoint, &page.body)? {
				match merged.as_mut() {
					Some(acc) => pagination::merge_page(acc, value),
					None => merged = Some(value),
				}
			}
		}

		obs::record_call_outcome(request.method, CallOutcome::Success);

		Ok(merged)
	}

	fn next_endpoint(&self, link: Option<&str>) -> Option<String> {
		let target = pagination::next_link(link?)?;

		match self.config.base_url.join(target) {
			Ok(url) if url.origin() != self.config.base_url.origin() => Some(url.into()),
			Ok(url) => Some(pagination::derive_endpoint(&url, &self.config.page_path_prefix)),
			Err(e) => {
				tracing::warn!(link = target, error = %e, "Ignoring unparsable next-page link.");

				None
			},
		}
	}

	fn reject(&self, request: &ApiRequest, response: ApiResponse) -> Error {
		let ApiResponse { status, retry_after, body, .. } = response;
		let body = if body.trim().is_empty() {
			Value::Null
		} else {
			serde_json::from_str(&body).unwrap_or(Value::String(body))
		};

		obs::record_call_outcome(request.method, CallOutcome::Rejected);
		tracing::error!(
			method = %request.method,
			endpoint = %request.endpoint,
			status,
			body = %body,
			"API request failed."
		);

		ApiError {
			status,
			method: request.method,
			endpoint: request.endpoint.clone(),
			body,
			retry_after,
		}
		.into()
	}
}

fn parse_body(endpoint: &str, body: &str) -> Result<Option<Value>> {
	if body.trim().is_empty() {
		return Ok(None);
	}

	serde_json::from_str(body)
		.map(Some)
		.map_err(|source| Error::Decode { endpoint: endpoint.to_owned(), source })
}

fn encode<B>(endpoint: &str, body: &B) -> Result<Value>
where
	B: ?Sized + Serialize,
{
	serde_json::to_value(body)
		.map_err(|source| Error::Encode { endpoint: endpoint.to_owned(), source })
}
