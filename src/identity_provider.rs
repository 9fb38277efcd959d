//! Administrative and machine-token calls against the identity provider.
//!
//! [`IdentityProviderAdminClient`] speaks the provider's master-realm token endpoint and admin
//! API. Administrative calls run on a human operator's credentials (password grant against the
//! configured admin client); the only call made on the machine's behalf is
//! [`client_credentials_token`](IdentityProviderAdminClient::client_credentials_token).

// crates.io
use oauth2::http::{Method, StatusCode};
// self
use crate::{
	_prelude::*,
	auth::{ClientSecretRecord, TokenSecret},
	config::BrokerConfig,
	error::AuthError,
	http::{self, BrokerHttpClient, Endpoint},
};

/// Token endpoint of the master realm.
pub const TOKEN_PATH: &str = "/realms/master/protocol/openid-connect/token";
/// Client collection of the master realm's admin API.
pub const ADMIN_CLIENTS_PATH: &str = "/admin/realms/master/clients";
/// Scopes requested by the administrative password grant.
pub const ADMIN_SCOPES: &str = "openid profile email groups";

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
	#[serde(default)]
	access_token: TokenSecret,
}

/// Subset of the admin API's client representation used by the broker.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderClient {
	/// Internal identifier used in admin API paths.
	#[serde(default)]
	pub id: String,
	/// Logical client name.
	#[serde(default, rename = "clientId")]
	pub client_id: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretResponse {
	#[allow(dead_code)]
	#[serde(default, rename = "type")]
	kind: String,
	#[serde(default)]
	value: TokenSecret,
}

/// Client for the identity provider's token endpoint and admin API.
pub struct IdentityProviderAdminClient<C>
where
	C: ?Sized + BrokerHttpClient,
{
	http_client: Arc<C>,
	base_url: Url,
	admin_client_id: String,
	machine_client_name: String,
}
impl<C> IdentityProviderAdminClient<C>
where
	C: ?Sized + BrokerHttpClient,
{
	/// Creates a client for the provider at `base_url`.
	pub fn new(
		http_client: impl Into<Arc<C>>,
		base_url: Url,
		admin_client_id: impl Into<String>,
		machine_client_name: impl Into<String>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			base_url,
			admin_client_id: admin_client_id.into(),
			machine_client_name: machine_client_name.into(),
		}
	}

	/// Creates a client from broker configuration.
	pub fn from_config(config: &BrokerConfig, http_client: impl Into<Arc<C>>) -> Self {
		Self::new(
			http_client,
			config.identity_provider_url.clone(),
			config.admin_client_id.clone(),
			config.machine_client_name.clone(),
		)
	}

	/// Name of the machine client this instance provisions and exchanges for.
	pub fn machine_client_name(&self) -> &str {
		&self.machine_client_name
	}

	/// Performs the administrative password grant and returns the admin access token.
	pub async fn admin_token(&self, username: &str, password: &str) -> Result<TokenSecret> {
		const ENDPOINT: Endpoint = Endpoint::AdminToken;

		let url = http::endpoint_url(&self.base_url, TOKEN_PATH, ENDPOINT)?;
		let request = http::form_request(
			&url,
			&[],
			&[
				("grant_type", "password"),
				("client_id", self.admin_client_id.as_str()),
				("username", username),
				("password", password),
				("scope", ADMIN_SCOPES),
			],
		)?;

		self.request_access_token(ENDPOINT, request).await
	}

	/// Looks up a client by logical name and returns the first match's internal identifier.
	///
	/// Zero matches yield an empty identifier rather than an error; the following admin call
	/// is where such a lookup surfaces as a failure.
	pub async fn find_client_id(
		&self,
		client_name: &str,
		admin_token: &TokenSecret,
	) -> Result<String> {
		const ENDPOINT: Endpoint = Endpoint::ClientLookup;

		let mut url = http::endpoint_url(&self.base_url, ADMIN_CLIENTS_PATH, ENDPOINT)?;

		url.query_pairs_mut().append_pair("clientId", client_name);

		let response = self.admin_get(ENDPOINT, &url, admin_token).await?;
		let clients: Vec<ProviderClient> = http::decode_json(ENDPOINT, &response)?;

		Ok(clients.into_iter().next().map(|client| client.id).unwrap_or_default())
	}

	/// Fetches the current secret of the client with internal identifier `client_id`.
	pub async fn rotate_client_secret(
		&self,
		client_id: &str,
		admin_token: &TokenSecret,
	) -> Result<TokenSecret> {
		const ENDPOINT: Endpoint = Endpoint::ClientSecret;

		let path = format!("{ADMIN_CLIENTS_PATH}/{client_id}/client-secret");
		let url = http::endpoint_url(&self.base_url, &path, ENDPOINT)?;
		let response = self.admin_get(ENDPOINT, &url, admin_token).await?;
		let secret: ClientSecretResponse = http::decode_json(ENDPOINT, &response)?;

		Ok(secret.value)
	}

	/// Runs the administrative chain (admin login, client lookup, secret fetch) for the machine
	/// client and returns the resulting record.
	pub async fn fetch_client_secret(
		&self,
		username: &str,
		password: &str,
	) -> Result<ClientSecretRecord> {
		let admin_token = self.admin_token(username, password).await?;
		let client_id = self.find_client_id(&self.machine_client_name, &admin_token).await?;
		let client_secret = self.rotate_client_secret(&client_id, &admin_token).await?;

		Ok(ClientSecretRecord { client_id, client_secret })
	}

	/// Exchanges the machine client's secret for an access token (client-credentials grant with
	/// HTTP basic authentication).
	pub async fn client_credentials_token(
		&self,
		client_secret: &TokenSecret,
	) -> Result<TokenSecret> {
		const ENDPOINT: Endpoint = Endpoint::MachineToken;

		let url = http::endpoint_url(&self.base_url, TOKEN_PATH, ENDPOINT)?;
		let credentials = http::basic_auth(&self.machine_client_name, client_secret.expose());
		let request = http::form_request(
			&url,
			&[http::authorization_header(&credentials)],
			&[("grant_type", "client_credentials")],
		)?;

		self.request_access_token(ENDPOINT, request).await
	}

	async fn request_access_token(
		&self,
		endpoint: Endpoint,
		request: oauth2::HttpRequest,
	) -> Result<TokenSecret> {
		let response = http::send(self.http_client.as_ref(), endpoint, request).await?;

		http::ensure_status(endpoint, &response, StatusCode::OK)?;

		let decoded: AccessTokenResponse = http::decode_json(endpoint, &response)?;

		if decoded.access_token.is_empty() {
			let response = format!("{decoded:?}");

			return Err(AuthError::MissingToken { endpoint, response }.into());
		}

		Ok(decoded.access_token)
	}

	async fn admin_get(
		&self,
		endpoint: Endpoint,
		url: &Url,
		admin_token: &TokenSecret,
	) -> Result<oauth2::HttpResponse> {
		let authorization = http::bearer(admin_token.expose());
		let request = http::json_request::<()>(
			Method::GET,
			url,
			&[http::authorization_header(&authorization)],
			None,
		)?;
		let response = http::send(self.http_client.as_ref(), endpoint, request).await?;

		http::ensure_status(endpoint, &response, StatusCode::OK)?;

		Ok(response)
	}
}
impl<C> Debug for IdentityProviderAdminClient<C>
where
	C: ?Sized + BrokerHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityProviderAdminClient")
			.field("base_url", &self.base_url.as_str())
			.field("admin_client_id", &self.admin_client_id)
			.field("machine_client_name", &self.machine_client_name)
			.finish_non_exhaustive()
	}
}
