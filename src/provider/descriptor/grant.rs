// self
use crate::{_prelude::*, error::ConfigError};

/// OAuth 2.0 grant strategies the token chain can service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization Code grant, PKCE-hardened when the provider enables it.
	AuthorizationCode,
	/// Implicit grant; the token arrives in the redirect fragment.
	Implicit,
	/// Resource Owner Password Credentials grant.
	Password,
	/// Client Credentials grant for app-only tokens.
	ClientCredentials,
}
impl GrantType {
	/// Chain probe order, strongest redirect-bound grant first.
	pub const PRIORITY: [GrantType; 4] = [
		GrantType::AuthorizationCode,
		GrantType::Implicit,
		GrantType::Password,
		GrantType::ClientCredentials,
	];

	/// Returns the RFC 6749 identifier for the grant type.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::Implicit => "implicit",
			GrantType::Password => "password",
			GrantType::ClientCredentials => "client_credentials",
		}
	}

	/// Returns `true` for grants that send the user through the authorization endpoint.
	pub const fn is_redirect_bound(self) -> bool {
		matches!(self, GrantType::AuthorizationCode | GrantType::Implicit)
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for GrantType {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim();

		Self::PRIORITY
			.into_iter()
			.find(|grant| grant.as_str().eq_ignore_ascii_case(trimmed))
			.ok_or_else(|| ConfigError::UnknownGrant { value: s.to_owned() })
	}
}
