//! Authenticated session against the secret store.
//!
//! A [`SecretStoreSession`] logs in with the workload's local identity, keeps the resulting
//! session token for later revocation, and reads or writes the machine-client record. Build one
//! session per logical operation; the broker does exactly that and never shares a session
//! between calls.

// crates.io
use oauth2::http::{Method, StatusCode};
// self
use crate::{
	_prelude::*,
	auth::{ClientSecretRecord, DataEnvelope, TokenSecret},
	config::BrokerConfig,
	error::AuthError,
	http::{self, BrokerHttpClient, Endpoint},
	identity::LocalIdentityReader,
};

/// Login endpoint for the Kubernetes auth method.
pub const LOGIN_PATH: &str = "/v1/auth/kubernetes/login";
/// Prefix of the versioned key/value data API.
pub const SECRET_DATA_PATH: &str = "/v1/secret/data/";
/// Self-revocation endpoint for the current session token.
pub const REVOKE_SELF_PATH: &str = "/v1/auth/token/revoke-self";

#[derive(Serialize)]
struct LoginRequest<'a> {
	jwt: &'a str,
	role: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
	#[serde(default)]
	auth: Option<LoginAuth>,
	#[allow(dead_code)]
	#[serde(default)]
	errors: Vec<String>,
}
impl LoginResponse {
	fn client_token(&self) -> Option<&TokenSecret> {
		self.auth.as_ref().map(|auth| &auth.client_token).filter(|token| !token.is_empty())
	}
}

#[derive(Debug, Deserialize)]
struct LoginAuth {
	#[serde(default)]
	client_token: TokenSecret,
}

/// One authenticated session against the secret store.
///
/// The session token lives behind an async mutex: [`login`](Self::login) and
/// [`revoke`](Self::revoke) hold it for their whole round trip, so they never interleave and a
/// revoke never observes a half-finished login. Secret reads and writes take the token as an
/// argument and do not contend on the lock.
pub struct SecretStoreSession<C>
where
	C: ?Sized + BrokerHttpClient,
{
	http_client: Arc<C>,
	base_url: Url,
	role: String,
	identity: LocalIdentityReader,
	token: AsyncMutex<Option<TokenSecret>>,
}
impl<C> SecretStoreSession<C>
where
	C: ?Sized + BrokerHttpClient,
{
	/// Creates a logged-out session.
	pub fn new(
		http_client: impl Into<Arc<C>>,
		base_url: Url,
		role: impl Into<String>,
		identity: LocalIdentityReader,
	) -> Self {
		Self {
			http_client: http_client.into(),
			base_url,
			role: role.into(),
			identity,
			token: AsyncMutex::new(None),
		}
	}

	/// Creates a logged-out session from broker configuration.
	pub fn from_config(config: &BrokerConfig, http_client: impl Into<Arc<C>>) -> Self {
		Self::new(
			http_client,
			config.secret_store_url.clone(),
			config.role.clone(),
			LocalIdentityReader::new(config.identity_token_path.clone()),
		)
	}

	/// Returns a copy of the currently held session token, if any.
	pub async fn session_token(&self) -> Option<TokenSecret> {
		self.token.lock().await.clone()
	}

	/// Logs in with the local identity and the configured role, storing the session token.
	///
	/// A token already held by this session is replaced without being revoked.
	pub async fn login(&self) -> Result<TokenSecret> {
		const ENDPOINT: Endpoint = Endpoint::SecretStoreLogin;

		let mut held = self.token.lock().await;
		let jwt = self.identity.read()?;
		let url = http::endpoint_url(&self.base_url, LOGIN_PATH, ENDPOINT)?;
		let body = LoginRequest { jwt: jwt.expose(), role: &self.role };
		let request = http::json_request(Method::POST, &url, &[], Some(&body))?;
		let response = http::send(self.http_client.as_ref(), ENDPOINT, request).await?;

		http::ensure_status(ENDPOINT, &response, StatusCode::OK)?;

		let decoded: LoginResponse = http::decode_json(ENDPOINT, &response)?;
		let token = decoded.client_token().cloned().ok_or_else(|| AuthError::MissingToken {
			endpoint: ENDPOINT,
			response: format!("{decoded:?}"),
		})?;

		*held = Some(token.clone());

		Ok(token)
	}

	/// Reads the machine-client record stored at `path`.
	pub async fn get_secret(&self, path: &str, token: &TokenSecret) -> Result<ClientSecretRecord> {
		const ENDPOINT: Endpoint = Endpoint::SecretRead;

		let url = self.secret_url(path, ENDPOINT)?;
		let request = http::json_request::<()>(
			Method::GET,
			&url,
			&[http::vault_token_header(token.expose())],
			None,
		)?;
		let response = http::send(self.http_client.as_ref(), ENDPOINT, request).await?;

		http::ensure_success(ENDPOINT, &response)?;

		let decoded: DataEnvelope<DataEnvelope<ClientSecretRecord>> =
			http::decode_json(ENDPOINT, &response)?;

		Ok(decoded.data.data)
	}

	/// Writes `record` at `path` and returns the record echoed back by the store.
	pub async fn put_secret(
		&self,
		path: &str,
		record: &ClientSecretRecord,
		token: &TokenSecret,
	) -> Result<ClientSecretRecord> {
		const ENDPOINT: Endpoint = Endpoint::SecretWrite;

		let url = self.secret_url(path, ENDPOINT)?;
		let request = http::json_request(
			Method::POST,
			&url,
			&[http::vault_token_header(token.expose())],
			Some(&DataEnvelope { data: record }),
		)?;
		let response = http::send(self.http_client.as_ref(), ENDPOINT, request).await?;

		http::ensure_success(ENDPOINT, &response)?;

		let confirmed: DataEnvelope<DataEnvelope<ClientSecretRecord>> =
			http::decode_json(ENDPOINT, &response)?;

		Ok(confirmed.data.data)
	}

	/// Deletes the record stored at `path`.
	pub async fn delete_secret(&self, path: &str, token: &TokenSecret) -> Result<()> {
		const ENDPOINT: Endpoint = Endpoint::SecretDelete;

		let url = self.secret_url(path, ENDPOINT)?;
		let request = http::json_request::<()>(
			Method::DELETE,
			&url,
			&[http::vault_token_header(token.expose())],
			None,
		)?;
		let response = http::send(self.http_client.as_ref(), ENDPOINT, request).await?;

		http::ensure_success(ENDPOINT, &response)
	}

	/// Revokes the held session token; succeeds without a remote call when none is held.
	pub async fn revoke(&self) -> Result<()> {
		const ENDPOINT: Endpoint = Endpoint::SecretStoreRevoke;

		let mut held = self.token.lock().await;
		let Some(token) = held.as_ref() else {
			return Ok(());
		};
		let url = http::endpoint_url(&self.base_url, REVOKE_SELF_PATH, ENDPOINT)?;
		let request = http::json_request::<()>(
			Method::POST,
			&url,
			&[http::vault_token_header(token.expose())],
			None,
		)?;
		let response = http::send(self.http_client.as_ref(), ENDPOINT, request).await?;

		http::ensure_status(ENDPOINT, &response, StatusCode::NO_CONTENT)?;

		*held = None;

		Ok(())
	}

	fn secret_url(&self, path: &str, endpoint: Endpoint) -> Result<Url> {
		http::endpoint_url(&self.base_url, &format!("{SECRET_DATA_PATH}{path}"), endpoint)
	}
}
impl<C> Debug for SecretStoreSession<C>
where
	C: ?Sized + BrokerHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SecretStoreSession")
			.field("base_url", &self.base_url.as_str())
			.field("role", &self.role)
			.field("identity", &self.identity.path())
			.finish_non_exhaustive()
	}
}
