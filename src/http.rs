//! Transport primitives for secret-store and identity-provider calls.
//!
//! The module exposes [`BrokerHttpClient`] so downstream crates can plug in a custom HTTP stack
//! (or a recording fake in tests) without touching the broker. Requests and responses use the
//! `http` types re-exported by `oauth2`, and transport failures are reported through
//! [`HttpClientError`] so every implementation classifies errors the same way. The crate-private
//! helpers below build requests, check statuses, and decode bodies with path-aware errors.

pub use oauth2;

// std
use std::ops::Deref;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use oauth2::{
	HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method, Request, StatusCode,
		header::{AUTHORIZATION, CONTENT_TYPE, HeaderName},
	},
};
use serde::de::DeserializeOwned;
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	error::{AuthError, ConfigError, DecodeError, TransportError},
	obs,
};

/// Header carrying the secret-store session token.
pub const VAULT_TOKEN_HEADER: &str = "x-vault-token";

/// Boxed future returned by [`BrokerHttpClient::execute`].
pub type HttpFuture<'a, E> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, HttpClientError<E>>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing broker requests.
///
/// The trait is the broker's only dependency on an HTTP stack. Implementations must be
/// `Send + Sync + 'static` so a single transport can be shared (behind `Arc<T>`) by the secret
/// store session and the identity-provider client of the same broker, and the returned futures
/// must be `Send` so broker calls can hop executors. Timeouts are the transport's concern; the
/// broker applies no retry of its own.
pub trait BrokerHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Executes a single request and resolves to the raw response, whatever its status.
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError>;
}

/// Remote endpoints contacted by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
	/// `POST /v1/auth/kubernetes/login` on the secret store.
	SecretStoreLogin,
	/// `GET /v1/secret/data/<path>` on the secret store.
	SecretRead,
	/// `POST /v1/secret/data/<path>` on the secret store.
	SecretWrite,
	/// `DELETE /v1/secret/data/<path>` on the secret store.
	SecretDelete,
	/// `POST /v1/auth/token/revoke-self` on the secret store.
	SecretStoreRevoke,
	/// Password grant against the identity provider's token endpoint.
	AdminToken,
	/// Client lookup on the identity provider's admin API.
	ClientLookup,
	/// Client secret retrieval on the identity provider's admin API.
	ClientSecret,
	/// Client-credentials grant against the identity provider's token endpoint.
	MachineToken,
}
impl Endpoint {
	/// Returns a stable label suitable for span, metric, or error fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Endpoint::SecretStoreLogin => "secret_store_login",
			Endpoint::SecretRead => "secret_read",
			Endpoint::SecretWrite => "secret_write",
			Endpoint::SecretDelete => "secret_delete",
			Endpoint::SecretStoreRevoke => "secret_store_revoke",
			Endpoint::AdminToken => "admin_token",
			Endpoint::ClientLookup => "client_lookup",
			Endpoint::ClientSecret => "client_secret",
			Endpoint::MachineToken => "machine_token",
		}
	}
}
impl Display for Endpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Broker endpoints answer directly, so the wrapped client should not follow redirects;
/// [`ReqwestHttpClient::with_timeout`] configures that together with the uniform request timeout.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client that bounds every request by `timeout` and never follows redirects.
	pub fn with_timeout(timeout: Duration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl BrokerHttpClient for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let response =
				client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Appends `path` to the base URL by concatenation so any base path prefix is kept.
pub(crate) fn endpoint_url(base: &Url, path: &str, endpoint: Endpoint) -> Result<Url> {
	let joined = format!("{}{path}", base.as_str().trim_end_matches('/'));

	Url::parse(&joined).map_err(|source| ConfigError::InvalidUrl { endpoint, source }.into())
}

/// Builds a request with the given headers and raw body.
pub(crate) fn build_request(
	method: Method,
	url: &Url,
	headers: &[(HeaderName, &str)],
	body: Vec<u8>,
) -> Result<HttpRequest> {
	let mut builder = Request::builder().method(method).uri(url.as_str());

	for (name, value) in headers {
		builder = builder.header(name, *value);
	}

	builder.body(body).map_err(|e| ConfigError::from(e).into())
}

/// Builds a JSON request.
pub(crate) fn json_request<T>(
	method: Method,
	url: &Url,
	headers: &[(HeaderName, &str)],
	body: Option<&T>,
) -> Result<HttpRequest>
where
	T: ?Sized + Serialize,
{
	let payload = match body {
		Some(value) => serde_json::to_vec(value).map_err(ConfigError::from)?,
		None => Vec::new(),
	};
	let mut all_headers = vec![(CONTENT_TYPE, "application/json")];

	all_headers.extend(headers.iter().cloned());

	build_request(method, url, &all_headers, payload)
}

/// Builds a `application/x-www-form-urlencoded` POST request.
pub(crate) fn form_request(
	url: &Url,
	headers: &[(HeaderName, &str)],
	pairs: &[(&str, &str)],
) -> Result<HttpRequest> {
	let encoded = form_urlencoded::Serializer::new(String::new())
		.extend_pairs(pairs.iter().copied())
		.finish();
	let mut all_headers = vec![(CONTENT_TYPE, "application/x-www-form-urlencoded")];

	all_headers.extend(headers.iter().cloned());

	build_request(Method::POST, url, &all_headers, encoded.into_bytes())
}

/// Header pair carrying the secret-store session token.
pub(crate) fn vault_token_header(token: &str) -> (HeaderName, &str) {
	(HeaderName::from_static(VAULT_TOKEN_HEADER), token)
}

/// `Authorization: Bearer ...` value.
pub(crate) fn bearer(token: &str) -> String {
	format!("Bearer {token}")
}

/// Header pair carrying an `Authorization` value built by [`bearer`] or [`basic_auth`].
pub(crate) fn authorization_header(value: &str) -> (HeaderName, &str) {
	(AUTHORIZATION, value)
}

/// `Authorization: Basic ...` value; the credentials are encoded as-is, without form escaping.
pub(crate) fn basic_auth(username: &str, password: &str) -> String {
	format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Executes a request and maps transport failures to broker errors.
pub(crate) async fn send<C>(
	client: &C,
	endpoint: Endpoint,
	request: HttpRequest,
) -> Result<HttpResponse>
where
	C: ?Sized + BrokerHttpClient,
{
	let response =
		client.execute(request).await.map_err(|e| map_transport_error(endpoint, e))?;

	obs::record_response(endpoint, response.status().as_u16());

	Ok(response)
}

/// Fails with [`AuthError::Status`] unless the response carries exactly `expected`.
pub(crate) fn ensure_status(
	endpoint: Endpoint,
	response: &HttpResponse,
	expected: StatusCode,
) -> Result<()> {
	if response.status() == expected {
		Ok(())
	} else {
		Err(AuthError::Status { endpoint, status: response.status().as_u16() }.into())
	}
}

/// Fails with [`AuthError::Status`] unless the response status is in the 2xx range.
pub(crate) fn ensure_success(endpoint: Endpoint, response: &HttpResponse) -> Result<()> {
	if response.status().is_success() {
		Ok(())
	} else {
		Err(AuthError::Status { endpoint, status: response.status().as_u16() }.into())
	}
}

/// Decodes a JSON body, reporting the failing JSON path on mismatch.
pub(crate) fn decode_json<T>(endpoint: Endpoint, response: &HttpResponse) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(response.body());

	serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
		DecodeError { endpoint, status: response.status().as_u16(), source }.into()
	})
}

fn map_transport_error<E>(endpoint: Endpoint, err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => TransportError::network(endpoint, *inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(source) => TransportError::Io { endpoint, source }.into(),
		HttpClientError::Other(message) => TransportError::Other { endpoint, message }.into(),
		_ => TransportError::Other { endpoint, message: "unknown transport failure".into() }.into(),
	}
}
