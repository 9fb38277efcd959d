// self
use crate::obs::{BrokerOp, OpOutcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(op: BrokerOp, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"m2m_broker_op_total",
			"op" => op.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (op, outcome);
	}
}

/// Counts a failed best-effort session cleanup (when enabled).
pub fn record_cleanup_failure(op: BrokerOp) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("m2m_broker_cleanup_failure_total", "op" => op.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = op;
	}
}
