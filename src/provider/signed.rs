//! Locally signed HS256 tokens for APIs that accept a self-issued JWT as the bearer credential.

// crates.io
use jsonwebtoken::{EncodingKey, Header};
// self
use crate::{
	_prelude::*,
	auth::BearerToken,
	error::AuthError,
	provider::{TokenFuture, TokenProvider},
};

/// Signs `claims` with HS256 using `secret`.
pub(crate) fn sign_hs256<T>(claims: &T, secret: &str) -> Result<String, AuthError>
where
	T: Serialize,
{
	Ok(jsonwebtoken::encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes()))?)
}

#[derive(Debug, Serialize)]
struct ApiKeyClaims<'a> {
	iss: &'a str,
	exp: i64,
}

/// Mints a long-lived HS256 token from an API key/secret pair without any network exchange.
#[derive(Clone)]
pub struct SignedJwtProvider {
	api_key: String,
	api_secret: String,
	lifetime: Duration,
}
impl SignedJwtProvider {
	/// Default token lifetime (one day).
	pub const DEFAULT_LIFETIME: Duration = Duration::days(1);

	/// Creates a provider for the key/secret pair.
	pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
		Self {
			api_key: api_key.into(),
			api_secret: api_secret.into(),
			lifetime: Self::DEFAULT_LIFETIME,
		}
	}

	/// Overrides the token lifetime; non-positive values fall back to the default.
	pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
		self.lifetime = if lifetime.is_positive() { lifetime } else { Self::DEFAULT_LIFETIME };

		self
	}

	fn sign_now(&self) -> Result<BearerToken, AuthError> {
		let exp = (OffsetDateTime::now_utc() + self.lifetime).unix_timestamp();
		let token = sign_hs256(&ApiKeyClaims { iss: &self.api_key, exp }, &self.api_secret)?;

		Ok(BearerToken::new(token))
	}
}
impl TokenProvider for SignedJwtProvider {
	fn fetch_token(&self) -> TokenFuture<'_> {
		let result = self.sign_now();

		Box::pin(async move { result })
	}
}
impl Debug for SignedJwtProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SignedJwtProvider")
			.field("api_key", &self.api_key)
			.field("api_secret", &"<redacted>")
			.field("lifetime", &self.lifetime)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use jsonwebtoken::{DecodingKey, Validation};
	// self
	use super::*;

	#[derive(Debug, Deserialize)]
	struct Decoded {
		iss: String,
		exp: i64,
	}

	#[tokio::test]
	async fn signed_token_carries_issuer_and_expiry() {
		let provider = SignedJwtProvider::new("meeting-key", "meeting-secret")
			.with_lifetime(Duration::hours(2));
		let before = OffsetDateTime::now_utc().unix_timestamp();
		let token = provider.fetch_token().await.expect("Local signing should succeed.");
		let decoded = jsonwebtoken::decode::<Decoded>(
			token.expose(),
			&DecodingKey::from_secret(b"meeting-secret"),
			&Validation::default(),
		)
		.expect("Signed token should verify with the same secret.");

		assert_eq!(decoded.claims.iss, "meeting-key");
		assert!(decoded.claims.exp >= before + 7_200);
		assert!(decoded.claims.exp <= before + 7_205);
	}

	#[test]
	fn debug_redacts_secret() {
		let provider = SignedJwtProvider::new("key", "hunter2");

		assert!(!format!("{provider:?}").contains("hunter2"));
	}
}
