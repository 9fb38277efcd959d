//! Machine-token orchestration across the secret store and the identity provider.

pub mod source;

pub use source::*;

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::BrokerConfig,
	http::BrokerHttpClient,
	identity_provider::IdentityProviderAdminClient,
	obs::{self, BrokerOp, OpOutcome, OpSpan},
	secret_store::SecretStoreSession,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport.
pub type ReqwestM2mBroker = M2mBroker<ReqwestHttpClient>;

/// Trades the workload identity for a machine access token, or provisions the machine client's
/// secret with administrative credentials.
///
/// Every call runs a fixed sequence of remote steps and stops at the first failure, returning
/// that failure unchanged. Each call opens its own [`SecretStoreSession`]; once the session is
/// established it is revoked on every exit path, and a failed revoke is logged instead of
/// returned, so cleanup never masks the primary result. The broker keeps no state between
/// calls and is cheap to construct per call.
///
/// When [`BrokerConfig::enabled`] is `false` both operations return `Ok(None)` without
/// contacting either service.
pub struct M2mBroker<C>
where
	C: ?Sized + BrokerHttpClient,
{
	/// Resolved configuration, including the feature flag.
	pub config: BrokerConfig,
	http_client: Arc<C>,
}
#[cfg(feature = "reqwest")]
impl M2mBroker<ReqwestHttpClient> {
	/// Creates a broker with its own reqwest transport bounded by [`BrokerConfig::timeout`].
	pub fn new(config: BrokerConfig) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(config.timeout)?;

		Ok(Self::with_http_client(config, http_client))
	}
}
impl<C> M2mBroker<C>
where
	C: ?Sized + BrokerHttpClient,
{
	/// Creates a broker that reuses the caller-provided transport.
	pub fn with_http_client(config: BrokerConfig, http_client: impl Into<Arc<C>>) -> Self {
		Self { config, http_client: http_client.into() }
	}

	/// Whether the feature flag allows remote calls.
	pub fn is_enabled(&self) -> bool {
		self.config.enabled
	}

	/// Opens a fresh, logged-out secret-store session.
	pub fn secret_store_session(&self) -> SecretStoreSession<C> {
		SecretStoreSession::from_config(&self.config, self.http_client.clone())
	}

	/// Builds an identity-provider client sharing this broker's transport.
	pub fn identity_provider(&self) -> IdentityProviderAdminClient<C> {
		IdentityProviderAdminClient::from_config(&self.config, self.http_client.clone())
	}

	/// Returns a fresh machine access token, or `None` when the broker is disabled.
	///
	/// Steps: secret-store login, read of the machine-client record, client-credentials
	/// exchange, then best-effort session revocation.
	pub async fn machine_token(&self) -> Result<Option<TokenSecret>> {
		const OP: BrokerOp = BrokerOp::MachineToken;

		if !self.admit(OP) {
			return Ok(None);
		}

		let span = OpSpan::new(OP, "machine_token");
		let result = span
			.instrument(async {
				let session = self.secret_store_session();
				let session_token = session.login().await?;
				let outcome = self.exchange_machine_token(&session, &session_token).await;

				release_session(OP, &session).await;

				outcome
			})
			.await;

		finish(OP, result)
	}

	/// Provisions the machine client's current secret into the secret store and returns the
	/// secret as persisted, or `None` when the broker is disabled.
	///
	/// Steps: secret-store login, administrative password grant, client lookup, secret
	/// retrieval, secret-store write, then best-effort session revocation.
	pub async fn provision_client_secret(
		&self,
		username: &str,
		password: &str,
	) -> Result<Option<TokenSecret>> {
		const OP: BrokerOp = BrokerOp::ProvisionClientSecret;

		if !self.admit(OP) {
			return Ok(None);
		}

		let span = OpSpan::new(OP, "provision_client_secret");
		let result = span
			.instrument(async {
				let session = self.secret_store_session();
				let session_token = session.login().await?;
				let outcome =
					self.store_client_secret(&session, &session_token, username, password).await;

				release_session(OP, &session).await;

				outcome
			})
			.await;

		finish(OP, result)
	}

	async fn exchange_machine_token(
		&self,
		session: &SecretStoreSession<C>,
		session_token: &TokenSecret,
	) -> Result<TokenSecret> {
		let record = session.get_secret(&self.config.secret_path, session_token).await?;

		self.identity_provider().client_credentials_token(&record.client_secret).await
	}

	async fn store_client_secret(
		&self,
		session: &SecretStoreSession<C>,
		session_token: &TokenSecret,
		username: &str,
		password: &str,
	) -> Result<TokenSecret> {
		let record = self.identity_provider().fetch_client_secret(username, password).await?;
		let persisted =
			session.put_secret(&self.config.secret_path, &record, session_token).await?;

		Ok(persisted.client_secret)
	}

	fn admit(&self, op: BrokerOp) -> bool {
		if self.config.enabled {
			obs::record_op_outcome(op, OpOutcome::Attempt);

			true
		} else {
			obs::record_op_outcome(op, OpOutcome::Disabled);

			false
		}
	}
}
impl<C> Clone for M2mBroker<C>
where
	C: ?Sized + BrokerHttpClient,
{
	fn clone(&self) -> Self {
		Self { config: self.config.clone(), http_client: self.http_client.clone() }
	}
}
impl<C> Debug for M2mBroker<C>
where
	C: ?Sized + BrokerHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("M2mBroker").field("config", &self.config).finish_non_exhaustive()
	}
}

async fn release_session<C>(op: BrokerOp, session: &SecretStoreSession<C>)
where
	C: ?Sized + BrokerHttpClient,
{
	if let Err(e) = session.revoke().await {
		obs::log_cleanup_failure(op, &e);
		obs::record_cleanup_failure(op);
	}
}

fn finish(op: BrokerOp, result: Result<TokenSecret>) -> Result<Option<TokenSecret>> {
	match &result {
		Ok(_) => obs::record_op_outcome(op, OpOutcome::Success),
		Err(_) => obs::record_op_outcome(op, OpOutcome::Failure),
	}

	result.map(Some)
}
