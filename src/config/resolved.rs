//! The single active OpenID provider's configuration.

// std
use std::sync::OnceLock;
// self
use crate::{
	_prelude::*,
	config::{PROPERTY_NAMESPACE, PropertyBag, ProviderDefinition, parse_flag},
};

/// Property bag of the one eligible provider definition, with scoped lookups.
///
/// Per-provider values live under `openid.<providerId>.<property>`. Global values
/// (`siteUrl`, `preEstablishedRedirUri`, `enabled`, `disableUsernamePasswordLogin`) are read
/// bare first and then under the `openid.` prefix.
#[derive(Debug)]
pub struct ResolvedConfig {
	definition_id: String,
	properties: PropertyBag,
	enabled: OnceLock<Vec<String>>,
}
impl ResolvedConfig {
	/// Builds the configuration from the eligible definition.
	pub fn from_definition(definition: &ProviderDefinition) -> Self {
		Self::new(definition.id.clone(), definition.properties.clone())
	}

	/// Builds the configuration from a raw identifier and property bag.
	pub fn new(definition_id: impl Into<String>, properties: PropertyBag) -> Self {
		Self { definition_id: definition_id.into(), properties, enabled: OnceLock::new() }
	}

	/// Identifier of the definition this configuration came from.
	pub fn definition_id(&self) -> &str {
		&self.definition_id
	}

	/// Raw property bag.
	pub fn properties(&self) -> &PropertyBag {
		&self.properties
	}

	/// Looks up `openid.<provider>.<name>`, returning the raw value.
	pub fn property(&self, provider: &str, name: &str) -> Option<&str> {
		self.properties.get(&format!("{PROPERTY_NAMESPACE}.{provider}.{name}"))
	}

	/// Looks up a provider-independent value.
	pub fn global(&self, name: &str) -> Option<&str> {
		self.properties
			.get(name)
			.or_else(|| self.properties.get(&format!("{PROPERTY_NAMESPACE}.{name}")))
	}

	/// Provider aliases listed in the comma-separated `enabled` property, in listed order.
	///
	/// Entries are trimmed and blanks dropped; the list is derived once and cached.
	pub fn enabled_providers(&self) -> &[String] {
		self.enabled.get_or_init(|| {
			self.global("enabled")
				.map(|raw| {
					raw.split(',')
						.map(str::trim)
						.filter(|alias| !alias.is_empty())
						.map(str::to_owned)
						.collect()
				})
				.unwrap_or_default()
		})
	}

	/// Returns `true` when `provider` appears in [`enabled_providers`](Self::enabled_providers).
	pub fn is_enabled(&self, provider: &str) -> bool {
		self.enabled_providers().iter().any(|alias| alias == provider)
	}

	/// Value of the `disableUsernamePasswordLogin` flag.
	pub fn username_password_login_disabled(&self) -> bool {
		parse_flag(self.global("disableUsernamePasswordLogin"))
	}
}
