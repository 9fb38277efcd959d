//! Optional observability helpers for broker operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `m2m_broker.op` with the `op` and `stage`
//!   fields, a debug event per remote response, and a warning whenever session cleanup fails.
//! - Enable `metrics` to increment the `m2m_broker_op_total` counter for every
//!   attempt/success/failure/disabled outcome (labeled by `op` + `outcome`) and the
//!   `m2m_broker_cleanup_failure_total` counter (labeled by `op`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Public broker operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BrokerOp {
	/// Secret-store read followed by the client-credentials exchange.
	MachineToken,
	/// Administrative secret retrieval followed by the secret-store write.
	ProvisionClientSecret,
}
impl BrokerOp {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			BrokerOp::MachineToken => "machine_token",
			BrokerOp::ProvisionClientSecret => "provision_client_secret",
		}
	}
}
impl Display for BrokerOp {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an enabled broker operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// The feature flag is off and the call returned without contacting any service.
	Disabled,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
			OpOutcome::Disabled => "disabled",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
