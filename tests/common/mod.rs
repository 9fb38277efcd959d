#![allow(dead_code)]

// std
use std::{
	env, fs, io,
	path::{Path, PathBuf},
	process,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use m2m_broker::{
	broker::M2mBroker,
	config::BrokerConfig,
	http::{
		BrokerHttpClient, HttpFuture,
		oauth2::{
			HttpClientError, HttpRequest, HttpResponse,
			http::{Method, StatusCode},
		},
	},
	url::Url,
};
use parking_lot::Mutex;

pub const ROLE: &str = "orch-svc";
pub const IDENTITY_JWT: &str = "header.payload.signature";

static FIXTURE_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Service-account token written to a unique temporary file, removed on drop.
pub struct IdentityFixture {
	path: PathBuf,
}
impl IdentityFixture {
	pub fn new(contents: &str) -> Self {
		let path = unique_temp_path("identity");

		fs::write(&path, contents).expect("Failed to write identity token fixture.");

		Self { path }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}
impl Drop for IdentityFixture {
	fn drop(&mut self) {
		let _ = fs::remove_file(&self.path);
	}
}

/// Path that is guaranteed not to exist.
pub fn missing_identity_path() -> PathBuf {
	unique_temp_path("missing")
}

pub fn test_config(
	secret_store_url: &str,
	identity_provider_url: &str,
	identity: &Path,
) -> BrokerConfig {
	BrokerConfig::builder(
		Url::parse(secret_store_url).expect("Secret store URL should parse."),
		Url::parse(identity_provider_url).expect("Identity provider URL should parse."),
		ROLE,
	)
	.enabled(true)
	.identity_token_path(identity)
	.build()
	.expect("Test configuration should build.")
}

/// Broker over a [`RecordingHttpClient`], returning both so tests can inspect traffic.
pub fn recording_broker(
	client: RecordingHttpClient,
	config: BrokerConfig,
) -> (M2mBroker<RecordingHttpClient>, Arc<RecordingHttpClient>) {
	let client = Arc::new(client);
	let broker = M2mBroker::<RecordingHttpClient>::with_http_client(config, client.clone());

	(broker, client)
}

/// Snapshot of a request seen by [`RecordingHttpClient`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
	pub method: Method,
	pub path: String,
	pub query: Option<String>,
	pub headers: Vec<(String, String)>,
	pub body: String,
}
impl RecordedRequest {
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	pub fn json(&self) -> serde_json::Value {
		serde_json::from_str(&self.body).expect("Recorded body should be JSON.")
	}
}

#[derive(Clone, Debug)]
struct Route {
	method: Method,
	path: String,
	status: u16,
	body: String,
}

/// In-process transport answering canned responses per method and path.
///
/// Unknown routes answer `404` with an empty body. Every request is recorded in arrival order.
#[derive(Debug, Default)]
pub struct RecordingHttpClient {
	routes: Vec<Route>,
	requests: Mutex<Vec<RecordedRequest>>,
}
impl RecordingHttpClient {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn route(mut self, method: Method, path: &str, status: u16, body: &str) -> Self {
		self.routes.push(Route { method, path: path.into(), status, body: body.into() });

		self
	}

	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.requests.lock().clone()
	}

	pub fn paths(&self) -> Vec<String> {
		self.requests
			.lock()
			.iter()
			.map(|request| format!("{} {}", request.method, request.path))
			.collect()
	}
}
impl BrokerHttpClient for RecordingHttpClient {
	type TransportError = io::Error;

	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
		let recorded = RecordedRequest {
			method: request.method().clone(),
			path: request.uri().path().to_owned(),
			query: request.uri().query().map(str::to_owned),
			headers: request
				.headers()
				.iter()
				.map(|(name, value)| {
					(name.as_str().to_owned(), value.to_str().unwrap_or_default().to_owned())
				})
				.collect(),
			body: String::from_utf8_lossy(request.body()).into_owned(),
		};
		let route = self
			.routes
			.iter()
			.find(|route| route.method == recorded.method && route.path == recorded.path)
			.cloned();

		self.requests.lock().push(recorded);

		Box::pin(async move {
			let (status, body) =
				route.map(|route| (route.status, route.body)).unwrap_or((404, String::new()));
			let mut response = HttpResponse::new(body.into_bytes());

			*response.status_mut() =
				StatusCode::from_u16(status).expect("Canned status should be valid.");

			Ok(response)
		})
	}
}

/// Transport whose every call fails before reaching the network.
#[derive(Debug, Default)]
pub struct UnreachableHttpClient;
impl BrokerHttpClient for UnreachableHttpClient {
	type TransportError = io::Error;

	fn execute(&self, _request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
		Box::pin(async {
			Err(HttpClientError::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")))
		})
	}
}

fn unique_temp_path(kind: &str) -> PathBuf {
	env::temp_dir().join(format!(
		"m2m_broker_{kind}_{}_{}.jwt",
		process::id(),
		FIXTURE_SEQ.fetch_add(1, Ordering::Relaxed),
	))
}
