//! Token providers: pluggable strategies that mint bearer credentials on demand.
//!
//! Providers never cache. Every [`TokenProvider::fetch_token`] call performs a fresh exchange (or
//! signs a fresh token); the [`ApiClient`](crate::ApiClient) keeps the current value and only asks
//! again on construction and on [`reset_token`](crate::ApiClient::reset_token).

#[cfg(feature = "reqwest")] pub mod jwt_bearer;
#[cfg(feature = "reqwest")] pub mod password;
pub mod signed;

#[cfg(feature = "reqwest")] pub use jwt_bearer::*;
#[cfg(feature = "reqwest")] pub use password::*;
pub use signed::*;

// self
use crate::{_prelude::*, auth::BearerToken, error::AuthError};

/// Boxed future returned by [`TokenProvider::fetch_token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<BearerToken, AuthError>> + 'a + Send>>;

/// Zero-argument credential source consulted by the client.
pub trait TokenProvider
where
	Self: Send + Sync,
{
	/// Obtains a fresh bearer token.
	fn fetch_token(&self) -> TokenFuture<'_>;
}

/// Adapts an async closure into a [`TokenProvider`].
#[derive(Clone)]
pub struct FnTokenProvider<F>(F);
impl<F> FnTokenProvider<F> {
	/// Wraps `f`.
	pub fn new(f: F) -> Self {
		Self(f)
	}
}
impl<F, Fut> TokenProvider for FnTokenProvider<F>
where
	F: Send + Sync + Fn() -> Fut,
	Fut: 'static + Send + Future<Output = Result<BearerToken, AuthError>>,
{
	fn fetch_token(&self) -> TokenFuture<'_> {
		Box::pin((self.0)())
	}
}
impl<F> Debug for FnTokenProvider<F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("FnTokenProvider(..)")
	}
}

/// Shorthand for [`FnTokenProvider::new`].
pub fn token_fn<F, Fut>(f: F) -> FnTokenProvider<F>
where
	F: Send + Sync + Fn() -> Fut,
	Fut: 'static + Send + Future<Output = Result<BearerToken, AuthError>>,
{
	FnTokenProvider::new(f)
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	#[tokio::test]
	async fn fn_provider_runs_closure_on_every_fetch() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();
		let provider = token_fn(move || {
			let n = counter.fetch_add(1, Ordering::SeqCst) + 1;

			async move { Ok(BearerToken::new(format!("token-{n}"))) }
		});
		let first = provider.fetch_token().await.expect("First fetch should succeed.");
		let second = provider.fetch_token().await.expect("Second fetch should succeed.");

		assert_eq!(first.expose(), "token-1");
		assert_eq!(second.expose(), "token-2");
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}
}
