//! Protected-resource descriptor data structures shared by every grant handler.

/// Builder that reads descriptors out of the resolved configuration.
pub mod builder;
/// Grant taxonomy and chain priority.
pub mod grant;

pub use builder::*;
pub use grant::*;

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, ScopeSet, TokenSecret},
};

/// Parameters identifying an OAuth 2.0 protected resource and how to obtain tokens for it.
///
/// Built fresh for every exchange attempt and never shared across providers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
	/// Provider alias the descriptor was built for.
	pub provider: ProviderId,
	/// Grant shape this descriptor requests.
	pub grant: GrantType,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// OAuth 2.0 client secret.
	pub client_secret: TokenSecret,
	/// Token endpoint.
	pub access_token_uri: Url,
	/// Authorization endpoint.
	pub user_authorization_uri: Url,
	/// Requested scopes.
	pub scope: ScopeSet,
	/// Callback URI registered with the provider (`siteUrl` + `preEstablishedRedirUri`).
	pub pre_established_redirect_uri: Url,
	/// Whether the current request URI may stand in for the redirect URI; always `false`.
	pub use_current_uri: bool,
	/// Whether the authorization-code exchange must carry a PKCE verifier.
	pub pkce_enabled: bool,
	/// Optional OpenID Connect userinfo endpoint.
	pub user_info_uri: Option<Url>,
}
impl ResourceDescriptor {
	/// Returns `true` when the descriptor requests `grant`.
	pub fn requests(&self, grant: GrantType) -> bool {
		self.grant == grant
	}
}
