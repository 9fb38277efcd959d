//! Broker configuration resolved once by the embedding application.
//!
//! [`BrokerConfig`] carries every value the broker needs, including the feature flag that turns
//! the whole broker into a no-op. The broker core never consults the process environment;
//! [`BrokerConfigBuilder::apply_env`] is the single place where `USE_M2M_TOKEN` and
//! `M2M_IDENTITY_TOKEN_PATH` are read, at startup.

// std
use std::env;
// self
use crate::_prelude::*;

/// Environment variable holding the broker feature flag.
pub const ENV_FEATURE_FLAG: &str = "USE_M2M_TOKEN";
/// Environment variable overriding the local identity token path.
pub const ENV_IDENTITY_TOKEN_PATH: &str = "M2M_IDENTITY_TOKEN_PATH";

/// Errors raised while constructing or validating a [`BrokerConfig`].
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum BrokerConfigError {
	/// A required text field was empty.
	#[error("The `{field}` setting must not be empty.")]
	EmptyField {
		/// Name of the offending field.
		field: &'static str,
	},
	/// Base URLs must be plain HTTP(S) URLs.
	#[error("The {endpoint} base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which base URL failed validation.
		endpoint: &'static str,
		/// URL that failed validation.
		url: String,
	},
	/// Secret paths are relative to the key/value mount.
	#[error("The secret path must be relative, got `{path}`.")]
	AbsoluteSecretPath {
		/// Path that failed validation.
		path: String,
	},
	/// Requests need a positive timeout.
	#[error("The request timeout must be positive.")]
	ZeroTimeout,
}

/// Resolved broker configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerConfig {
	/// When `false`, every broker operation returns `None` without contacting any service.
	pub enabled: bool,
	/// Base URL of the secret store.
	pub secret_store_url: Url,
	/// Base URL of the identity provider.
	pub identity_provider_url: Url,
	/// Role submitted with the workload identity on secret-store login.
	pub role: String,
	/// Location of the mounted service-account token.
	pub identity_token_path: PathBuf,
	/// Key/value path (below `/v1/secret/data/`) holding the machine-client record.
	pub secret_path: String,
	/// Identity-provider client name of the machine client.
	pub machine_client_name: String,
	/// Identity-provider client used for the administrative password grant.
	pub admin_client_id: String,
	/// Uniform timeout applied to every remote call.
	pub timeout: Duration,
}
impl BrokerConfig {
	/// Standard service-account token mount.
	pub const DEFAULT_IDENTITY_TOKEN_PATH: &'static str =
		"/var/run/secrets/kubernetes.io/serviceaccount/token";
	/// Default key/value path of the machine-client record.
	pub const DEFAULT_SECRET_PATH: &'static str = "catalog-bootstrap-m2m-client-secret";
	/// Default machine-client name.
	pub const DEFAULT_MACHINE_CLIENT_NAME: &'static str = "edge-manager-m2m-client";
	/// Default administrative client.
	pub const DEFAULT_ADMIN_CLIENT_ID: &'static str = "system-client";
	/// Default per-request timeout.
	pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

	/// Starts a builder for the values the embedding application must supply.
	pub fn builder(
		secret_store_url: Url,
		identity_provider_url: Url,
		role: impl Into<String>,
	) -> BrokerConfigBuilder {
		BrokerConfigBuilder::new(secret_store_url, identity_provider_url, role)
	}

	/// Validates invariants for the configuration.
	fn validate(&self) -> Result<(), BrokerConfigError> {
		validate_base_url("secret store", &self.secret_store_url)?;
		validate_base_url("identity provider", &self.identity_provider_url)?;
		validate_non_empty("role", &self.role)?;
		validate_non_empty("secret_path", &self.secret_path)?;
		validate_non_empty("machine_client_name", &self.machine_client_name)?;
		validate_non_empty("admin_client_id", &self.admin_client_id)?;

		if self.secret_path.starts_with('/') {
			return Err(BrokerConfigError::AbsoluteSecretPath { path: self.secret_path.clone() });
		}
		if self.timeout.is_zero() {
			return Err(BrokerConfigError::ZeroTimeout);
		}

		Ok(())
	}
}

/// Builder for [`BrokerConfig`] values.
#[derive(Debug)]
pub struct BrokerConfigBuilder {
	/// Feature flag; disabled unless set.
	pub enabled: bool,
	/// Base URL of the secret store.
	pub secret_store_url: Url,
	/// Base URL of the identity provider.
	pub identity_provider_url: Url,
	/// Secret-store login role.
	pub role: String,
	/// Optional identity token path override.
	pub identity_token_path: Option<PathBuf>,
	/// Optional secret path override.
	pub secret_path: Option<String>,
	/// Optional machine-client name override.
	pub machine_client_name: Option<String>,
	/// Optional admin client override.
	pub admin_client_id: Option<String>,
	/// Optional timeout override.
	pub timeout: Option<Duration>,
}
impl BrokerConfigBuilder {
	/// Creates a new builder seeded with the required values.
	pub fn new(secret_store_url: Url, identity_provider_url: Url, role: impl Into<String>) -> Self {
		Self {
			enabled: false,
			secret_store_url,
			identity_provider_url,
			role: role.into(),
			identity_token_path: None,
			secret_path: None,
			machine_client_name: None,
			admin_client_id: None,
			timeout: None,
		}
	}

	/// Sets the feature flag.
	pub fn enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;

		self
	}

	/// Overrides the identity token path.
	pub fn identity_token_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.identity_token_path = Some(path.into());

		self
	}

	/// Overrides the key/value path of the machine-client record.
	pub fn secret_path(mut self, path: impl Into<String>) -> Self {
		self.secret_path = Some(path.into());

		self
	}

	/// Overrides the machine-client name.
	pub fn machine_client_name(mut self, name: impl Into<String>) -> Self {
		self.machine_client_name = Some(name.into());

		self
	}

	/// Overrides the administrative client.
	pub fn admin_client_id(mut self, client_id: impl Into<String>) -> Self {
		self.admin_client_id = Some(client_id.into());

		self
	}

	/// Overrides the request timeout (defaults to 10 seconds).
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Applies `USE_M2M_TOKEN` and `M2M_IDENTITY_TOKEN_PATH` from the process environment.
	pub fn apply_env(self) -> Self {
		self.apply_lookup(|key| env::var(key).ok())
	}

	/// Applies the environment overrides through an arbitrary lookup function.
	///
	/// The flag is replaced by the parsed variable (an absent or unparsable value disables the
	/// broker); the token path is replaced only when the variable is present and non-empty.
	pub fn apply_lookup<F>(mut self, lookup: F) -> Self
	where
		F: Fn(&str) -> Option<String>,
	{
		self.enabled = lookup(ENV_FEATURE_FLAG).as_deref().and_then(parse_flag).unwrap_or(false);

		if let Some(path) = lookup(ENV_IDENTITY_TOKEN_PATH).filter(|value| !value.is_empty()) {
			self.identity_token_path = Some(path.into());
		}

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<BrokerConfig, BrokerConfigError> {
		let config = BrokerConfig {
			enabled: self.enabled,
			secret_store_url: self.secret_store_url,
			identity_provider_url: self.identity_provider_url,
			role: self.role,
			identity_token_path: self
				.identity_token_path
				.unwrap_or_else(|| BrokerConfig::DEFAULT_IDENTITY_TOKEN_PATH.into()),
			secret_path: self
				.secret_path
				.unwrap_or_else(|| BrokerConfig::DEFAULT_SECRET_PATH.into()),
			machine_client_name: self
				.machine_client_name
				.unwrap_or_else(|| BrokerConfig::DEFAULT_MACHINE_CLIENT_NAME.into()),
			admin_client_id: self
				.admin_client_id
				.unwrap_or_else(|| BrokerConfig::DEFAULT_ADMIN_CLIENT_ID.into()),
			timeout: self.timeout.unwrap_or(BrokerConfig::DEFAULT_TIMEOUT),
		};

		config.validate()?;

		Ok(config)
	}
}

/// Parses a boolean flag using the conventional spellings (`1`, `t`, `true`, `0`, `f`, `false`,
/// in lower, upper, or title case). Anything else is `None`.
pub fn parse_flag(value: &str) -> Option<bool> {
	match value {
		"1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
		"0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
		_ => None,
	}
}

fn validate_base_url(endpoint: &'static str, url: &Url) -> Result<(), BrokerConfigError> {
	if matches!(url.scheme(), "http" | "https") && !url.cannot_be_a_base() {
		Ok(())
	} else {
		Err(BrokerConfigError::UnsupportedScheme { endpoint, url: url.to_string() })
	}
}

fn validate_non_empty(field: &'static str, value: &str) -> Result<(), BrokerConfigError> {
	if value.trim().is_empty() { Err(BrokerConfigError::EmptyField { field }) } else { Ok(()) }
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashMap;
	// self
	use super::*;

	fn builder() -> BrokerConfigBuilder {
		BrokerConfig::builder(
			Url::parse("http://vault:8200").expect("Failed to parse secret store URL."),
			Url::parse("https://keycloak.example.com").expect("Failed to parse provider URL."),
			"orch-svc",
		)
	}

	#[test]
	fn defaults_fill_unset_values() {
		let config = builder().build().expect("Default config should build.");

		assert!(!config.enabled);
		assert_eq!(
			config.identity_token_path,
			PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/token"),
		);
		assert_eq!(config.secret_path, "catalog-bootstrap-m2m-client-secret");
		assert_eq!(config.machine_client_name, "edge-manager-m2m-client");
		assert_eq!(config.admin_client_id, "system-client");
		assert_eq!(config.timeout, Duration::from_secs(10));
	}

	#[test]
	fn validation_rejects_bad_values() {
		assert_eq!(
			BrokerConfig::builder(
				Url::parse("ftp://vault").expect("Failed to parse URL."),
				Url::parse("https://idp").expect("Failed to parse URL."),
				"svc",
			)
			.build(),
			Err(BrokerConfigError::UnsupportedScheme {
				endpoint: "secret store",
				url: "ftp://vault/".into()
			}),
		);
		assert_eq!(
			BrokerConfig::builder(
				Url::parse("http://vault").expect("Failed to parse URL."),
				Url::parse("https://idp").expect("Failed to parse URL."),
				" ",
			)
			.build(),
			Err(BrokerConfigError::EmptyField { field: "role" }),
		);
		assert_eq!(
			builder().secret_path("/abs").build(),
			Err(BrokerConfigError::AbsoluteSecretPath { path: "/abs".into() }),
		);
		assert_eq!(builder().timeout(Duration::ZERO).build(), Err(BrokerConfigError::ZeroTimeout));
	}

	#[test]
	fn lookup_parses_flag_and_path() {
		let vars = HashMap::from([
			(ENV_FEATURE_FLAG, "TRUE".to_owned()),
			(ENV_IDENTITY_TOKEN_PATH, "/tmp/token".to_owned()),
		]);
		let config = builder()
			.apply_lookup(|key| vars.get(key).cloned())
			.build()
			.expect("Config with env overrides should build.");

		assert!(config.enabled);
		assert_eq!(config.identity_token_path, PathBuf::from("/tmp/token"));
	}

	#[test]
	fn absent_or_garbage_flag_disables() {
		let config = builder()
			.enabled(true)
			.apply_lookup(|_| None)
			.build()
			.expect("Config without env should build.");

		assert!(!config.enabled);

		let config = builder()
			.apply_lookup(|key| (key == ENV_FEATURE_FLAG).then(|| "yes".to_owned()))
			.build()
			.expect("Config with garbage flag should build.");

		assert!(!config.enabled);
	}

	#[test]
	fn flag_parsing_matches_conventional_spellings() {
		for value in ["1", "t", "T", "true", "TRUE", "True"] {
			assert_eq!(parse_flag(value), Some(true), "{value}");
		}
		for value in ["0", "f", "F", "false", "FALSE", "False"] {
			assert_eq!(parse_flag(value), Some(false), "{value}");
		}

		assert_eq!(parse_flag("tRuE"), None);
		assert_eq!(parse_flag(""), None);
	}
}
