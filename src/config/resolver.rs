//! Exactly-one-provider resolution with a single-initialization guard.

// std
use std::sync::OnceLock;
// self
use crate::{
	_prelude::*,
	config::{ProviderDefinition, ResolvedConfig},
	obs::log_event,
};

/// Why the plugin disabled itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisabledReason {
	/// No definition carries the `openid` auth method.
	Absent,
	/// Several definitions carry the `openid` auth method.
	Ambiguous {
		/// Identifiers of every eligible definition, sorted.
		providers: Vec<String>,
	},
}
impl DisabledReason {
	/// Converts the reason into the matching [`Error`] variant.
	pub fn to_error(&self) -> Error {
		match self {
			Self::Absent => Error::ConfigAbsent,
			Self::Ambiguous { providers } =>
				Error::ConfigAmbiguous { providers: providers.clone() },
		}
	}
}

/// Outcome of provider resolution; permanent for the process lifetime.
#[derive(Clone, Debug)]
pub enum Resolution {
	/// Exactly one eligible definition was found.
	Enabled(Arc<ResolvedConfig>),
	/// The plugin is disabled and must not install its filters.
	Disabled(DisabledReason),
}
impl Resolution {
	/// Returns `true` for [`Resolution::Enabled`].
	pub fn is_enabled(&self) -> bool {
		matches!(self, Self::Enabled(_))
	}

	/// Returns the resolved configuration or the disabling error.
	pub fn config(&self) -> Result<Arc<ResolvedConfig>> {
		match self {
			Self::Enabled(config) => Ok(config.clone()),
			Self::Disabled(reason) => Err(reason.to_error()),
		}
	}
}

/// Scans provider definitions once and memoizes the outcome.
///
/// The first call to [`resolve`](Self::resolve) wins; concurrent callers block until it
/// finishes and then observe the same [`Resolution`]. Later calls return the cached value
/// without looking at their input. There is no retry short of building a new resolver, which
/// hosts do only on restart.
#[derive(Debug, Default)]
pub struct ProviderResolver {
	resolution: OnceLock<Resolution>,
}
impl ProviderResolver {
	/// Creates an unresolved resolver.
	pub fn new() -> Self {
		Self::default()
	}

	/// Resolves the single `openid` provider, memoizing the result.
	pub fn resolve<'a, I>(&self, definitions: I) -> Resolution
	where
		I: IntoIterator<Item = &'a ProviderDefinition>,
	{
		self.resolution.get_or_init(|| scan(definitions)).clone()
	}

	/// Returns the memoized resolution without blocking, if resolution already happened.
	pub fn resolution(&self) -> Option<&Resolution> {
		self.resolution.get()
	}
}

fn scan<'a, I>(definitions: I) -> Resolution
where
	I: IntoIterator<Item = &'a ProviderDefinition>,
{
	let eligible = definitions.into_iter().filter(|def| def.is_openid()).collect::<Vec<_>>();
	let resolution = match eligible.as_slice() {
		[] => Resolution::Disabled(DisabledReason::Absent),
		[only] => Resolution::Enabled(Arc::new(ResolvedConfig::from_definition(only))),
		many => {
			let mut providers = many.iter().map(|def| def.id.clone()).collect::<Vec<_>>();

			providers.sort();

			Resolution::Disabled(DisabledReason::Ambiguous { providers })
		},
	};

	match &resolution {
		Resolution::Enabled(config) =>
			log_event!(info, "Resolved OpenID provider definition `{}`.", config.definition_id()),
		Resolution::Disabled(reason) =>
			log_event!(error, "OpenID login disabled: {}", reason.to_error()),
	}

	resolution
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn openid(id: &str) -> ProviderDefinition {
		ProviderDefinition::new(id, "openid").with_property("enabled", id)
	}

	#[test]
	fn single_openid_definition_resolves_and_is_memoized() {
		let resolver = ProviderResolver::new();
		let definitions = [ProviderDefinition::new("local", "localdb"), openid("google")];
		let first = resolver.resolve(&definitions).config().expect("One provider should resolve.");

		assert_eq!(first.definition_id(), "google");
		assert_eq!(first.enabled_providers(), ["google"]);

		let second =
			resolver.resolve(&[openid("other")]).config().expect("Memoized result should stay.");

		assert!(Arc::ptr_eq(&first, &second), "Repeated calls must return the cached instance.");
	}

	#[test]
	fn zero_openid_definitions_disable() {
		let resolver = ProviderResolver::new();
		let resolution = resolver.resolve(&[ProviderDefinition::new("ldap", "ldap")]);

		assert!(matches!(resolution, Resolution::Disabled(DisabledReason::Absent)));
		assert!(matches!(resolution.config(), Err(Error::ConfigAbsent)));
	}

	#[test]
	fn several_openid_definitions_disable_permanently() {
		let resolver = ProviderResolver::new();
		let resolution = resolver.resolve(&[openid("b"), openid("a")]);

		assert_eq!(
			resolution.config().expect_err("Ambiguous configs must not resolve.").to_string(),
			"Only one OpenID provider is supported at a time, found 2: a, b."
		);
		assert!(!resolver.resolve(&[openid("a")]).is_enabled(), "Disabled state never retries.");
	}

	#[test]
	fn concurrent_resolvers_agree() {
		let resolver = Arc::new(ProviderResolver::new());
		let handles = (0..8)
			.map(|idx| {
				let resolver = resolver.clone();

				std::thread::spawn(move || {
					resolver.resolve(&[openid(&format!("provider-{idx}"))]).config()
				})
			})
			.collect::<Vec<_>>();
		let configs = handles
			.into_iter()
			.map(|handle| {
				handle.join().expect("Resolver thread should not panic.").expect("Should resolve.")
			})
			.collect::<Vec<_>>();

		assert!(configs.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
	}
}
