// self
use crate::{_prelude::*, http::Endpoint, obs::BrokerOp};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// A span builder used by broker operations.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(op: BrokerOp, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("m2m_broker.op", op = op.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (op, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event for a completed remote round trip.
pub fn record_response(endpoint: Endpoint, status: u16) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(endpoint = endpoint.as_str(), status, "Remote call completed.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (endpoint, status);
	}
}

/// Logs a failed best-effort session cleanup. The error never reaches the caller.
pub fn log_cleanup_failure(op: BrokerOp, err: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			op = op.as_str(),
			error = %err,
			"Failed to revoke the secret store session."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (op, err);
	}
}
