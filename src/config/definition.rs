//! Externally supplied provider definitions and their flat property bags.

// std
use std::collections::btree_map::Iter as BTreeIter;
// self
use crate::{_prelude::*, error::ConfigError};

/// Flat key/value property bag, e.g. `openid.google.clientId = abc`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag(BTreeMap<String, String>);
impl PropertyBag {
	/// Creates an empty bag.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the raw value stored under `key`.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	/// Inserts or replaces a value.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
		self.0.insert(key.into(), value.into())
	}

	/// Builder-style [`insert`](Self::insert).
	pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.insert(key, value);

		self
	}

	/// Number of stored keys.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when the bag holds no keys.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterator over key/value pairs in key order.
	pub fn iter(&self) -> BTreeIter<'_, String, String> {
		self.0.iter()
	}
}
impl<K, V> FromIterator<(K, V)> for PropertyBag
where
	K: Into<String>,
	V: Into<String>,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
	{
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}

/// One authentication provider definition discovered by the host.
///
/// Only definitions whose `auth_method` equals [`crate::config::OPENID_AUTH_METHOD`] are
/// eligible for resolution; the rest belong to other login mechanisms and are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDefinition {
	/// Host-level identifier of the definition.
	pub id: String,
	/// Authentication method tag (`openid`, `ldap`, `localdb`, ...).
	pub auth_method: String,
	/// Property bag carried by the definition.
	#[serde(default)]
	pub properties: PropertyBag,
}
impl ProviderDefinition {
	/// Creates a definition with an empty property bag.
	pub fn new(id: impl Into<String>, auth_method: impl Into<String>) -> Self {
		Self { id: id.into(), auth_method: auth_method.into(), properties: PropertyBag::new() }
	}

	/// Replaces the property bag.
	pub fn with_properties(mut self, properties: PropertyBag) -> Self {
		self.properties = properties;

		self
	}

	/// Adds a single property.
	pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.properties.insert(key, value);

		self
	}

	/// Parses a definition from JSON, reporting the path of the first malformed field.
	pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_slice(bytes);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::MalformedDefinition { source })
	}

	/// Returns `true` when the definition carries the `openid` auth method.
	pub fn is_openid(&self) -> bool {
		self.auth_method == crate::config::OPENID_AUTH_METHOD
	}
}
