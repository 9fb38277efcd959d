//! Machine-client credential record stored in the secret store.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Machine-client identifier and secret, as persisted at the broker's secret path.
///
/// Missing fields decode to empty values so a partially populated secret still round-trips.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSecretRecord {
	/// Identity-provider client identifier (the admin API's internal `id`).
	#[serde(default)]
	pub client_id: String,
	/// Client secret used for the client-credentials grant.
	#[serde(default)]
	pub client_secret: TokenSecret,
}
impl ClientSecretRecord {
	/// Creates a record from its parts.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self { client_id: client_id.into(), client_secret: TokenSecret::new(client_secret) }
	}
}

/// `{"data": ...}` envelope used by the secret store's versioned key/value API.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct DataEnvelope<T> {
	pub(crate) data: T,
}
