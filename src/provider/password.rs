//! OAuth 2.0 resource-owner password grant, as used by CRM integration users.

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, HttpClientError, RequestTokenError, ResourceOwnerPassword,
	ResourceOwnerUsername, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::BearerToken,
	error::{AuthError, TransportError},
	http::{OAuthHttpHandle, ResponseMetadata, ResponseMetadataSlot},
	provider::{TokenFuture, TokenProvider},
};

/// Settings for [`PasswordGrantProvider`].
#[derive(Clone)]
pub struct PasswordGrantConfig {
	/// Token endpoint (sandbox or production login host).
	pub token_endpoint: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// Integration user name.
	pub username: String,
	client_secret: String,
	password: String,
}
impl PasswordGrantConfig {
	/// Creates a config; client credentials are sent in the request body.
	pub fn new(
		token_endpoint: Url,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		Self {
			token_endpoint,
			client_id: client_id.into(),
			username: username.into(),
			client_secret: client_secret.into(),
			password: password.into(),
		}
	}
}
impl Debug for PasswordGrantConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PasswordGrantConfig")
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("client_id", &self.client_id)
			.field("username", &self.username)
			.field("client_secret", &"<redacted>")
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Performs a password grant on every fetch.
#[derive(Clone, Debug)]
pub struct PasswordGrantProvider {
	config: PasswordGrantConfig,
	http: ReqwestClient,
}
impl PasswordGrantProvider {
	/// Creates a provider backed by a reqwest client that does not follow redirects.
	pub fn new(config: PasswordGrantConfig) -> Result<Self, crate::error::ConfigError> {
		let client =
			ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self::with_client(config, client))
	}

	/// Creates a provider that reuses `client`.
	pub fn with_client(config: PasswordGrantConfig, client: ReqwestClient) -> Self {
		Self { config, http: client }
	}

	async fn exchange(&self) -> Result<BearerToken, AuthError> {
		let config = &self.config;
		let slot = ResponseMetadataSlot::default();
		let handle = OAuthHttpHandle::new(self.http.clone(), slot.clone());
		let oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_client_secret(ClientSecret::new(config.client_secret.clone()))
			.set_token_uri(TokenUrl::from_url(config.token_endpoint.clone()))
			.set_auth_type(AuthType::RequestBody);
		let username = ResourceOwnerUsername::new(config.username.clone());
		let password = ResourceOwnerPassword::new(config.password.clone());
		let response = oauth_client
			.exchange_password(&username, &password)
			.request_async(&handle)
			.await
			.map_err(|err| map_request_error(&config.token_endpoint, slot.take(), err))?;

		Ok(BearerToken::new(response.access_token().secret().to_owned()))
	}
}
impl TokenProvider for PasswordGrantProvider {
	fn fetch_token(&self) -> TokenFuture<'_> {
		Box::pin(self.exchange())
	}
}

fn map_request_error(
	endpoint: &Url,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> AuthError {
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => {
			let message = match response.error_description() {
				Some(description) => format!("{}: {description}", response.error().as_ref()),
				None => response.error().as_ref().to_owned(),
			};

			AuthError::Rejected { status, message }
		},
		RequestTokenError::Request(error) =>
			TransportError::network(endpoint.as_str(), error).into(),
		RequestTokenError::Parse(error, _body) => match status {
			Some(code) if !(200..300).contains(&code) =>
				AuthError::Rejected { status, message: format!("HTTP {code}") },
			_ => AuthError::malformed(error),
		},
		RequestTokenError::Other(message) => AuthError::Rejected { status, message },
	}
}
