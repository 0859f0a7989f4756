//! Client configuration: API root, throttle delay, and pagination prefix.

// crates.io
use config::{Config, Environment, Map};
// self
use crate::{_prelude::*, error::ConfigError};

/// Validated settings for an [`ApiClient`](crate::ApiClient).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// API root; always ends with `/` so relative endpoints keep the full path.
	pub base_url: Url,
	/// Delay after each queued call and before each follow-up page fetch.
	pub min_delay: StdDuration,
	/// Path prefix stripped from next-page URLs to recover relative endpoints.
	pub page_path_prefix: String,
}
impl ClientConfig {
	/// Default delay between throttled calls (0.4 seconds).
	pub const DEFAULT_MIN_DELAY: StdDuration = StdDuration::from_millis(400);

	/// Returns a builder for `base_url`.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Parses `base_url` and builds a config with default settings.
	pub fn new(base_url: &str) -> Result<Self, ConfigError> {
		let url = Url::parse(base_url)
			.map_err(|source| ConfigError::InvalidUrl { field: "base_url", source })?;

		Self::builder(url).build()
	}

	/// Reads `<PREFIX>_BASE_URL`, `<PREFIX>_MIN_DELAY_MS`, and `<PREFIX>_PAGE_PATH_PREFIX` from the
	/// process environment.
	pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
		Self::load(prefix, None)
	}

	/// Same as [`ClientConfig::from_env`], reading variables from `vars` instead of the process
	/// environment.
	pub fn from_vars(prefix: &str, vars: Map<String, String>) -> Result<Self, ConfigError> {
		Self::load(prefix, Some(vars))
	}

	fn load(prefix: &str, vars: Option<Map<String, String>>) -> Result<Self, ConfigError> {
		let raw = Config::builder()
			.add_source(Environment::with_prefix(prefix).try_parsing(true).source(vars))
			.build()?
			.try_deserialize::<RawClientConfig>()?;
		let base = raw.base_url.ok_or_else(|| ConfigError::Missing(format!("{prefix}_BASE_URL")))?;
		let base_url = Url::parse(base.trim())
			.map_err(|source| ConfigError::InvalidUrl { field: "base_url", source })?;
		let mut builder = Self::builder(base_url);

		if let Some(millis) = raw.min_delay_ms {
			builder = builder.min_delay(StdDuration::from_millis(millis));
		}
		if let Some(page_prefix) = raw.page_path_prefix {
			builder = builder.page_path_prefix(page_prefix.trim());
		}

		builder.build()
	}
}

#[derive(Debug, Deserialize)]
struct RawClientConfig {
	base_url: Option<String>,
	min_delay_ms: Option<u64>,
	page_path_prefix: Option<String>,
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// API root.
	pub base_url: Url,
	/// Throttle delay.
	pub min_delay: StdDuration,
	/// Optional pagination prefix; defaults to the base URL path.
	pub page_path_prefix: Option<String>,
}
impl ClientConfigBuilder {
	/// Creates a new builder seeded with the API root.
	pub fn new(base_url: Url) -> Self {
		Self { base_url, min_delay: ClientConfig::DEFAULT_MIN_DELAY, page_path_prefix: None }
	}

	/// Overrides the delay between throttled calls.
	pub fn min_delay(mut self, delay: StdDuration) -> Self {
		self.min_delay = delay;

		self
	}

	/// Overrides the prefix stripped from next-page URLs.
	///
	/// Stripping the prefix from a next-page path must leave the path relative to `base_url`;
	/// e.g. a gateway rooted at `/lobby/` whose upstream links read `/services/4.0/...` needs
	/// `/services/4.0/`.
	pub fn page_path_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.page_path_prefix = Some(prefix.into());

		self
	}

	/// Validates and builds the config.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let mut base_url = self.base_url;

		if base_url.cannot_be_a_base() {
			return Err(ConfigError::CannotBeBase(base_url.to_string()));
		}
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		let page_path_prefix = match self.page_path_prefix {
			Some(prefix) if !prefix.starts_with('/') =>
				return Err(ConfigError::RelativePagePrefix(prefix)),
			Some(prefix) => prefix,
			None => base_url.path().to_owned(),
		};

		Ok(ClientConfig { base_url, min_delay: self.min_delay, page_path_prefix })
	}
}
