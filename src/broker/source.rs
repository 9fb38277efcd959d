//! Object-safe contract for anything that can hand out machine tokens.
//!
//! Services that embed the broker usually hold it as `Arc<dyn MachineTokenSource>` so tests can
//! swap in a canned source without standing up a secret store or identity provider.

// self
use crate::{_prelude::*, auth::TokenSecret, broker::M2mBroker, http::BrokerHttpClient};

/// Boxed future returned by [`MachineTokenSource`] methods.
pub type TokenSourceFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Option<TokenSecret>>> + 'a + Send>>;

/// Source of machine access tokens and provisioned client secrets.
pub trait MachineTokenSource
where
	Self: Send + Sync,
{
	/// Returns a fresh machine access token, or `None` when the source is disabled.
	fn machine_token(&self) -> TokenSourceFuture<'_>;

	/// Provisions the machine client's secret using administrative credentials.
	fn provision_client_secret<'a>(
		&'a self,
		username: &'a str,
		password: &'a str,
	) -> TokenSourceFuture<'a>;
}
impl<C> MachineTokenSource for M2mBroker<C>
where
	C: ?Sized + BrokerHttpClient,
{
	fn machine_token(&self) -> TokenSourceFuture<'_> {
		Box::pin(M2mBroker::machine_token(self))
	}

	fn provision_client_secret<'a>(
		&'a self,
		username: &'a str,
		password: &'a str,
	) -> TokenSourceFuture<'a> {
		Box::pin(M2mBroker::provision_client_secret(self, username, password))
	}
}
