// self
use crate::{obs::FlowOutcome, provider::GrantType};

/// Records an exchange outcome via the global metrics recorder (when enabled).
pub fn record_exchange_outcome(grant: GrantType, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"openid_auth_exchange_total",
			"grant" => grant.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (grant, outcome);
	}
}
