//! Provider configuration: external definitions, the single resolved provider, and exchange
//! settings.
//!
//! Hosts hand every discovered [`ProviderDefinition`] to a [`ProviderResolver`] once at boot.
//! Exactly one `openid` definition yields a [`ResolvedConfig`]; zero or several disable the
//! plugin for the lifetime of the process.

pub mod definition;
pub mod resolved;
pub mod resolver;

pub use definition::*;
pub use resolved::*;
pub use resolver::*;

// self
use crate::_prelude::*;

/// Auth-method tag a definition must carry to be eligible.
pub const OPENID_AUTH_METHOD: &str = "openid";
/// Prefix of every per-provider property key (`openid.<providerId>.<property>`).
pub const PROPERTY_NAMESPACE: &str = "openid";

/// Tunables for token exchanges and PKCE bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExchangeSettings {
	/// Upper bound for a single token, authorization, or userinfo call.
	pub timeout: Duration,
	/// How long an unconsumed PKCE verifier stays valid.
	pub pkce_ttl: Duration,
	/// Code verifier length; clamped to the RFC 7636 range of 43..=128.
	pub verifier_len: usize,
}
impl ExchangeSettings {
	const DEFAULT_TIMEOUT: Duration = Duration::seconds(30);
	const DEFAULT_PKCE_TTL: Duration = Duration::minutes(10);
	const DEFAULT_VERIFIER_LEN: usize = 64;

	/// Overrides the exchange timeout; non-positive values fall back to the default.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = if timeout.is_positive() { timeout } else { Self::DEFAULT_TIMEOUT };

		self
	}

	/// Overrides the PKCE verifier lifetime; non-positive values fall back to the default.
	pub fn with_pkce_ttl(mut self, ttl: Duration) -> Self {
		self.pkce_ttl = if ttl.is_positive() { ttl } else { Self::DEFAULT_PKCE_TTL };

		self
	}

	/// Overrides the code verifier length.
	pub fn with_verifier_len(mut self, len: usize) -> Self {
		self.verifier_len = len;

		self
	}
}
impl Default for ExchangeSettings {
	fn default() -> Self {
		Self {
			timeout: Self::DEFAULT_TIMEOUT,
			pkce_ttl: Self::DEFAULT_PKCE_TTL,
			verifier_len: Self::DEFAULT_VERIFIER_LEN,
		}
	}
}

/// Parses a boolean property the lenient way: only a case-insensitive `true` is truthy.
///
/// Absent, blank, and malformed values all read as `false`.
pub(crate) fn parse_flag(value: Option<&str>) -> bool {
	value.is_some_and(|raw| raw.trim().eq_ignore_ascii_case("true"))
}
