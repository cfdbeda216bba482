// self
use crate::{
	_prelude::*,
	auth::{ProviderId, ScopeSet, TokenSecret},
	config::ResolvedConfig,
	error::ConfigError,
	obs::log_event,
	pkce::PkceNegotiator,
	provider::{GrantType, ResourceDescriptor},
};

/// Builds [`ResourceDescriptor`] values from `openid.<providerId>.*` properties.
///
/// The provider alias is re-validated against the `enabled` list on every build, because the
/// alias reaches this point straight from a request parameter.
#[derive(Clone, Debug)]
pub struct ResourceDescriptorBuilder {
	config: Arc<ResolvedConfig>,
	pkce: Arc<PkceNegotiator>,
}
impl ResourceDescriptorBuilder {
	/// Creates a builder over the resolved configuration and PKCE negotiator.
	pub fn new(config: Arc<ResolvedConfig>, pkce: Arc<PkceNegotiator>) -> Self {
		Self { config, pkce }
	}

	/// Builds the descriptor for `provider`.
	///
	/// Fails with [`Error::UnknownProvider`] for aliases outside the `enabled` list,
	/// [`Error::ConfigMissing`] for absent or blank required properties, and
	/// [`Error::InvalidConfig`] for values that do not parse.
	pub fn build(&self, provider: &str) -> Result<ResourceDescriptor> {
		if !self.config.is_enabled(provider) {
			return Err(Error::UnknownProvider { provider: provider.to_owned() });
		}

		let provider_id = ProviderId::new(provider).map_err(ConfigError::from)?;
		let client_id = self.required(provider, "clientId")?.to_owned();
		let client_secret = TokenSecret::new(self.required(provider, "clientSecret")?);
		let access_token_uri =
			parse_url("accessTokenUri", self.required(provider, "accessTokenUri")?)?;
		let user_authorization_uri =
			parse_url("userAuthUri", self.required(provider, "userAuthUri")?)?;
		let scope = ScopeSet::from_delimited(self.required(provider, "scopes")?, ',')
			.map_err(ConfigError::from)?;
		let site_url = self.required_global(provider, "siteUrl")?;
		let redirect_path = self.required_global(provider, "preEstablishedRedirUri")?;
		let pre_established_redirect_uri =
			parse_url("preEstablishedRedirUri", &format!("{site_url}{redirect_path}"))?;
		let user_info_uri = self
			.optional(provider, "userInfoUri")
			.map(|raw| parse_url("userInfoUri", raw))
			.transpose()?;
		let grant = self
			.optional(provider, "grantType")
			.map(GrantType::from_str)
			.transpose()?
			.unwrap_or(GrantType::AuthorizationCode);
		let pkce_enabled = self.pkce.is_required(provider);

		log_event!(debug, "Built {grant} descriptor for `{provider}` (pkce: {pkce_enabled}).");

		Ok(ResourceDescriptor {
			provider: provider_id,
			grant,
			client_id,
			client_secret,
			access_token_uri,
			user_authorization_uri,
			scope,
			pre_established_redirect_uri,
			use_current_uri: false,
			pkce_enabled,
			user_info_uri,
		})
	}

	fn required(&self, provider: &str, property: &'static str) -> Result<&str> {
		self.optional(provider, property)
			.ok_or_else(|| Error::ConfigMissing { provider: provider.to_owned(), property })
	}

	fn optional(&self, provider: &str, property: &str) -> Option<&str> {
		self.config.property(provider, property).map(str::trim).filter(|value| !value.is_empty())
	}

	fn required_global(&self, provider: &str, property: &'static str) -> Result<&str> {
		self.config
			.global(property)
			.map(str::trim)
			.filter(|value| !value.is_empty())
			.ok_or_else(|| Error::ConfigMissing { provider: provider.to_owned(), property })
	}
}

fn parse_url(property: &'static str, value: &str) -> Result<Url, ConfigError> {
	Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
		property,
		value: value.to_owned(),
		source,
	})
}
