//! JWT bearer assertion grant (RFC 7523): sign a short-lived assertion, trade it for an access
//! token at the identity provider's token endpoint.

// self
use crate::{
	_prelude::*,
	auth::BearerToken,
	error::{AuthError, TransportError},
	provider::{TokenFuture, TokenProvider, signed},
};

/// `grant_type` value for the JWT bearer assertion grant.
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Settings for [`JwtBearerProvider`].
#[derive(Clone)]
pub struct JwtBearerConfig {
	/// Token endpoint that accepts the assertion.
	pub token_endpoint: Url,
	/// `iss` claim; the registered application id.
	pub issuer: String,
	/// `sub` claim; the user the application acts for.
	pub subject: String,
	/// `aud` claim; usually the API host.
	pub audience: String,
	/// Optional space-delimited `scope` claim.
	pub scope: Option<String>,
	/// Assertion lifetime (defaults to 120 seconds).
	pub assertion_lifetime: Duration,
	secret: String,
}
impl JwtBearerConfig {
	/// Default assertion lifetime.
	pub const DEFAULT_ASSERTION_LIFETIME: Duration = Duration::seconds(120);

	/// Creates a config with the default lifetime and no scope.
	pub fn new(
		token_endpoint: Url,
		issuer: impl Into<String>,
		subject: impl Into<String>,
		audience: impl Into<String>,
		secret: impl Into<String>,
	) -> Self {
		Self {
			token_endpoint,
			issuer: issuer.into(),
			subject: subject.into(),
			audience: audience.into(),
			scope: None,
			assertion_lifetime: Self::DEFAULT_ASSERTION_LIFETIME,
			secret: secret.into(),
		}
	}

	/// Sets the `scope` claim.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Overrides the assertion lifetime; non-positive values fall back to the default.
	pub fn with_assertion_lifetime(mut self, lifetime: Duration) -> Self {
		self.assertion_lifetime =
			if lifetime.is_positive() { lifetime } else { Self::DEFAULT_ASSERTION_LIFETIME };

		self
	}
}
impl Debug for JwtBearerConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("JwtBearerConfig")
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("issuer", &self.issuer)
			.field("subject", &self.subject)
			.field("audience", &self.audience)
			.field("scope", &self.scope)
			.field("assertion_lifetime", &self.assertion_lifetime)
			.field("secret", &"<redacted>")
			.finish()
	}
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
	iss: &'a str,
	sub: &'a str,
	aud: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	scope: Option<&'a str>,
	iat: i64,
	exp: i64,
	jti: String,
}

#[derive(Debug, Deserialize)]
struct AccessTokenBody {
	access_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct OAuthErrorBody {
	error: Option<String>,
	error_description: Option<String>,
}

/// Exchanges a freshly signed assertion for an access token on every fetch.
#[derive(Clone, Debug)]
pub struct JwtBearerProvider {
	config: JwtBearerConfig,
	http: ReqwestClient,
}
impl JwtBearerProvider {
	/// Creates a provider backed by a default reqwest client.
	pub fn new(config: JwtBearerConfig) -> Self {
		Self::with_client(config, ReqwestClient::default())
	}

	/// Creates a provider that reuses `client`.
	pub fn with_client(config: JwtBearerConfig, client: ReqwestClient) -> Self {
		Self { config, http: client }
	}

	/// Signs the assertion that will be exchanged.
	pub fn assertion(&self) -> Result<String, AuthError> {
		let config = &self.config;
		let now = OffsetDateTime::now_utc();
		let claims = AssertionClaims {
			iss: &config.issuer,
			sub: &config.subject,
			aud: &config.audience,
			scope: config.scope.as_deref(),
			iat: now.unix_timestamp(),
			exp: (now + config.assertion_lifetime).unix_timestamp(),
			jti: format!("{:032x}", rand::random::<u128>()),
		};

		signed::sign_hs256(&claims, &config.secret)
	}

	async fn exchange(&self) -> Result<BearerToken, AuthError> {
		let assertion = self.assertion()?;
		let endpoint = self.config.token_endpoint.clone();
		let target = endpoint.to_string();
		let response = self
			.http
			.post(endpoint)
			.form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
			.send()
			.await
			.map_err(|e| TransportError::network(target.as_str(), e))?;
		let status = response.status();
		let body = response.text().await.map_err(|e| TransportError::network(target, e))?;

		if !status.is_success() {
			return Err(rejection(status.as_u16(), &body));
		}

		let de = &mut serde_json::Deserializer::from_str(&body);
		let parsed: AccessTokenBody =
			serde_path_to_error::deserialize(de).map_err(AuthError::malformed)?;

		Ok(BearerToken::new(parsed.access_token))
	}
}
impl TokenProvider for JwtBearerProvider {
	fn fetch_token(&self) -> TokenFuture<'_> {
		Box::pin(self.exchange())
	}
}

fn rejection(status: u16, body: &str) -> AuthError {
	let parsed = serde_json::from_str::<OAuthErrorBody>(body).unwrap_or_default();
	let message = match (parsed.error, parsed.error_description) {
		(_, Some(description)) => description,
		(Some(error), None) => error,
		(None, None) => format!("HTTP {status}"),
	};

	AuthError::Rejected { status: Some(status), message }
}
