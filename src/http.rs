//! Transport primitives for outbound API calls.
//!
//! [`Transport`] is the client's only dependency on an HTTP stack. The default
//! [`ReqwestTransport`] executes requests with reqwest; tests and custom deployments can plug in
//! any implementation that turns an [`HttpRequest`] into an [`ApiResponse`]. Implementations must
//! return `Ok` for every response that carries an HTTP status, including 4xx and 5xx, and reserve
//! `Err` for failures where no response was received.
//!
//! The module also hosts [`OAuthHttpHandle`], the adapter that lets the `oauth2` crate run token
//! exchanges on reqwest while recording [`ResponseMetadata`] for error classification.

// crates.io
#[cfg(feature = "reqwest")] use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest as OAuthRequest, HttpResponse as OAuthResponse};
#[cfg(feature = "reqwest")] use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, LINK, RETRY_AFTER};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, auth::BearerToken, error::TransportError};

/// Boxed future returned by [`Transport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// HTTP verbs issued by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// `GET`, used by `call` and by page follow-ups.
	Get,
	/// `POST` with a JSON body.
	Post,
	/// `PUT` with a JSON body.
	Put,
	/// `DELETE`.
	Delete,
}
impl Method {
	/// Returns the canonical verb.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
#[cfg(feature = "reqwest")]
impl From<Method> for reqwest::Method {
	fn from(value: Method) -> Self {
		match value {
			Method::Get => reqwest::Method::GET,
			Method::Post => reqwest::Method::POST,
			Method::Put => reqwest::Method::PUT,
			Method::Delete => reqwest::Method::DELETE,
		}
	}
}

/// API call described relative to the client's base URL.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
	/// HTTP verb.
	pub method: Method,
	/// Endpoint joined onto the base URL; may carry its own query string or be absolute.
	pub endpoint: String,
	/// JSON body for `POST`/`PUT`.
	pub body: Option<Value>,
	/// Query parameters appended URL-encoded after any query already in the endpoint.
	pub query: Vec<(String, String)>,
}
impl ApiRequest {
	/// Creates a request for the given verb and endpoint.
	pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
		Self { method, endpoint: endpoint.into(), body: None, query: Vec::new() }
	}

	/// `GET` request.
	pub fn get(endpoint: impl Into<String>) -> Self {
		Self::new(Method::Get, endpoint)
	}

	/// `POST` request carrying `body`.
	pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
		Self::new(Method::Post, endpoint).with_body(body)
	}

	/// `PUT` request carrying `body`.
	pub fn put(endpoint: impl Into<String>, body: Value) -> Self {
		Self::new(Method::Put, endpoint).with_body(body)
	}

	/// `DELETE` request.
	pub fn delete(endpoint: impl Into<String>) -> Self {
		Self::new(Method::Delete, endpoint)
	}

	/// Sets the JSON body.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Appends query parameters.
	pub fn with_query<I, K, V>(mut self, params: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.query.extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));

		self
	}

	/// Resolves the absolute request URL against `base`.
	pub fn resolve(&self, base: &Url) -> Result<Url, url::ParseError> {
		let mut url = base.join(&self.endpoint)?;

		if !self.query.is_empty() {
			url.query_pairs_mut().extend_pairs(self.query.iter());
		}

		Ok(url)
	}
}

/// Fully resolved request handed to a [`Transport`].
#[derive(Clone, Debug)]
pub struct HttpRequest {
	/// HTTP verb.
	pub method: Method,
	/// Absolute URL including the query string.
	pub url: Url,
	/// Credential for the `Authorization` header.
	pub bearer: BearerToken,
	/// Serialized JSON body, if any.
	pub body: Option<Vec<u8>>,
}

/// Response captured by a [`Transport`], whatever its status.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Raw `Link` header, when present.
	pub link: Option<String>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
	/// Response body as text.
	pub body: String,
}
impl ApiResponse {
	/// Creates a response with the given status and body and no headers.
	pub fn new(status: u16, body: impl Into<String>) -> Self {
		Self { status, body: body.into(), ..Default::default() }
	}

	/// Attaches a raw `Link` header.
	pub fn with_link(mut self, link: impl Into<String>) -> Self {
		self.link = Some(link.into());

		self
	}

	/// All 2xx statuses count as success.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns `true` when the body holds nothing but whitespace.
	pub fn is_blank(&self) -> bool {
		self.body.trim().is_empty()
	}
}

/// Abstraction over HTTP stacks capable of executing API calls.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request`, returning every HTTP response as `Ok`.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Timeouts are whatever the wrapped client is configured with; the default client has none.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let HttpRequest { method, url, bearer, body } = request;
			let target = url.to_string();
			let mut builder = self
				.0
				.request(method.into(), url)
				.header(AUTHORIZATION, bearer.header_value())
				.header(ACCEPT, "application/json");

			if let Some(body) = body {
				builder = builder.header(CONTENT_TYPE, "application/json").body(body);
			}

			let response =
				builder.send().await.map_err(|e| TransportError::network(target.as_str(), e))?;
			let status = response.status().as_u16();
			let headers = response.headers();
			// Servers may send one `Link` field per relation.
			let link = headers
				.get_all(LINK)
				.iter()
				.filter_map(|v| v.to_str().ok())
				.fold(None, |joined: Option<String>, value| match joined {
					Some(joined) => Some(format!("{joined}, {value}")),
					None => Some(value.to_owned()),
				});
			let retry_after = headers
				.get(RETRY_AFTER)
				.and_then(|v| v.to_str().ok())
				.and_then(parse_retry_after);
			let body = response.text().await.map_err(|e| TransportError::network(target, e))?;

			Ok(ApiResponse { status, link, retry_after, body })
		})
	}
}

/// Parses a `Retry-After` value given either as delta-seconds or as an RFC 2822 date.
pub fn parse_retry_after(raw: &str) -> Option<Duration> {
	let raw = raw.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

/// Captures metadata from the most recent token-endpoint response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the token endpoint, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between the `oauth2` adapter and the
/// provider that classifies its errors.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// [`AsyncHttpClient`] adapter that runs `oauth2` token exchanges on reqwest.
///
/// Token endpoints should not redirect, so configure any custom [`ReqwestClient`] passed here
/// to disable redirect following.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct OAuthHttpHandle {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
#[cfg(feature = "reqwest")]
impl OAuthHttpHandle {
	/// Builds a handle that records response metadata in `slot`.
	pub fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self { client, slot }
	}
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for OAuthHttpHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<OAuthResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: OAuthRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let response = self
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			self.slot.store(ResponseMetadata { status: Some(status.as_u16()) });

			let mut response_new =
				OAuthResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
