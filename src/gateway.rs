//! Integration boundary with the host's security filter pipeline.
//!
//! [`OpenIdPlugin`] is what the host talks to: it installs the OpenID stages into a
//! [`SecurityPipeline`] and renders the login-page fragments. A disabled plugin turns every
//! operation into a harmless no-op so other login methods keep working.

// self
use crate::{
	_prelude::*,
	config::{
		DisabledReason, ExchangeSettings, OPENID_AUTH_METHOD, ProviderDefinition, ProviderResolver,
		ResolvedConfig, Resolution,
	},
	http::TokenHttpClient,
	obs::log_event,
	session::AuthSessionBinder,
};

/// Filter stages the plugin knows how to place.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FilterStage {
	/// Host's pre-authentication stage; the anchor for everything the plugin installs.
	PreAuthentication,
	/// Stage that keeps the OAuth 2.0 client context (state, pending redirects) per request.
	OAuth2ClientContext,
	/// Stage that completes the OpenID Connect exchange on the callback path.
	OpenIdConnect {
		/// Callback path handled by the stage (`preEstablishedRedirUri`).
		redirect_path: String,
	},
}
impl FilterStage {
	/// Stable stage name.
	pub fn name(&self) -> &'static str {
		match self {
			Self::PreAuthentication => "pre_authentication",
			Self::OAuth2ClientContext => "oauth2_client_context",
			Self::OpenIdConnect { .. } => "openid_connect",
		}
	}
}
impl Display for FilterStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.name())
	}
}

/// Failures reported by a [`SecurityPipeline`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum PipelineError {
	/// The anchor stage is not part of the pipeline.
	#[error("Anchor stage `{anchor}` is not installed.")]
	MissingAnchor {
		/// Name of the missing anchor.
		anchor: &'static str,
	},
	/// The pipeline refused the stage.
	#[error("Pipeline rejected the `{stage}` stage: {reason}.")]
	Rejected {
		/// Name of the refused stage.
		stage: &'static str,
		/// Host-supplied reason.
		reason: String,
	},
}

/// The host's ordered filter pipeline.
pub trait SecurityPipeline {
	/// Inserts `stage` immediately after `anchor`.
	fn add_filter_after(
		&mut self,
		stage: FilterStage,
		anchor: &FilterStage,
	) -> Result<(), PipelineError>;

	/// Removes `stage`, returning whether it was installed.
	fn remove_filter(&mut self, stage: &FilterStage) -> bool;
}

/// Vec-backed [`SecurityPipeline`] for hosts without their own representation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterPipeline {
	stages: Vec<FilterStage>,
}
impl FilterPipeline {
	/// Creates a pipeline holding only [`FilterStage::PreAuthentication`].
	pub fn new() -> Self {
		Self { stages: vec![FilterStage::PreAuthentication] }
	}

	/// Stages in execution order.
	pub fn stages(&self) -> &[FilterStage] {
		&self.stages
	}
}
impl Default for FilterPipeline {
	fn default() -> Self {
		Self::new()
	}
}
impl SecurityPipeline for FilterPipeline {
	fn add_filter_after(
		&mut self,
		stage: FilterStage,
		anchor: &FilterStage,
	) -> Result<(), PipelineError> {
		let position = self
			.stages
			.iter()
			.position(|installed| installed == anchor)
			.ok_or(PipelineError::MissingAnchor { anchor: anchor.name() })?;

		if self.stages.contains(&stage) {
			return Err(PipelineError::Rejected {
				stage: stage.name(),
				reason: "stage is already installed".into(),
			});
		}

		self.stages.insert(position + 1, stage);

		Ok(())
	}

	fn remove_filter(&mut self, stage: &FilterStage) -> bool {
		let before = self.stages.len();

		self.stages.retain(|installed| installed != stage);

		self.stages.len() != before
	}
}

/// Result of [`OpenIdPlugin::configure`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigureOutcome {
	/// The plugin is disabled; the pipeline was left untouched.
	Disabled(DisabledReason),
	/// Both OpenID stages were installed.
	Configured {
		/// Callback path the OpenID Connect stage listens on.
		redirect_path: String,
	},
}

/// Host-facing plugin handle over a memoized [`Resolution`].
#[derive(Clone, Debug)]
pub struct OpenIdPlugin {
	resolution: Resolution,
}
impl OpenIdPlugin {
	/// Wraps an existing resolution.
	pub fn new(resolution: Resolution) -> Self {
		Self { resolution }
	}

	/// Resolves `definitions` through `resolver` and wraps the outcome.
	pub fn from_definitions<'a, I>(resolver: &ProviderResolver, definitions: I) -> Self
	where
		I: IntoIterator<Item = &'a ProviderDefinition>,
	{
		Self::new(resolver.resolve(definitions))
	}

	/// Auth-method tag this plugin serves.
	pub fn auth_method(&self) -> &'static str {
		OPENID_AUTH_METHOD
	}

	/// Memoized resolution.
	pub fn resolution(&self) -> &Resolution {
		&self.resolution
	}

	/// Returns `true` when exactly one provider definition was found.
	pub fn is_enabled(&self) -> bool {
		self.resolution.is_enabled()
	}

	/// Resolved configuration, or the error that disabled the plugin.
	pub fn config(&self) -> Result<Arc<ResolvedConfig>> {
		self.resolution.config()
	}

	/// Installs the client-context stage after pre-authentication, then the OpenID Connect
	/// stage after the client context.
	///
	/// A disabled plugin leaves `pipeline` untouched and returns
	/// [`ConfigureOutcome::Disabled`]. Pipeline failures while enabled propagate, and the
	/// client-context stage is removed again when the OpenID Connect stage is refused.
	pub fn configure<P>(&self, pipeline: &mut P) -> Result<ConfigureOutcome>
	where
		P: ?Sized + SecurityPipeline,
	{
		let config = match &self.resolution {
			Resolution::Enabled(config) => config,
			Resolution::Disabled(reason) => {
				log_event!(info, "Skipping OpenID filter installation: {}", reason.to_error());

				return Ok(ConfigureOutcome::Disabled(reason.clone()));
			},
		};
		let redirect_path = config
			.global("preEstablishedRedirUri")
			.map(str::trim)
			.filter(|path| !path.is_empty())
			.ok_or_else(|| Error::ConfigMissing {
				provider: config.definition_id().to_owned(),
				property: "preEstablishedRedirUri",
			})?
			.to_owned();

		pipeline
			.add_filter_after(FilterStage::OAuth2ClientContext, &FilterStage::PreAuthentication)?;

		if let Err(e) = pipeline.add_filter_after(
			FilterStage::OpenIdConnect { redirect_path: redirect_path.clone() },
			&FilterStage::OAuth2ClientContext,
		) {
			pipeline.remove_filter(&FilterStage::OAuth2ClientContext);

			return Err(e.into());
		}

		log_event!(info, "Installed OpenID filter stages on `{redirect_path}`.");

		Ok(ConfigureOutcome::Configured { redirect_path })
	}

	/// Concatenated `link` properties of every enabled provider, in listed order.
	///
	/// No separator is inserted between links. Providers without a `link` contribute nothing.
	pub fn login_str(&self) -> String {
		let Ok(config) = self.config() else {
			return String::new();
		};

		config
			.enabled_providers()
			.iter()
			.filter_map(|provider| config.property(provider, "link"))
			.collect()
	}

	/// Inline style for the username/password form: `display:none` when that login is disabled.
	pub fn username_password_style(&self) -> &'static str {
		match self.config() {
			Ok(config) if config.username_password_login_disabled() => "display:none",
			_ => "",
		}
	}

	/// Builds the session binder over the resolved configuration.
	pub fn session_binder<C>(
		&self,
		http_client: Arc<C>,
		settings: &ExchangeSettings,
	) -> Result<AuthSessionBinder<C>>
	where
		C: ?Sized + TokenHttpClient,
	{
		Ok(AuthSessionBinder::new(self.config()?, http_client, settings))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::config::PropertyBag;

	fn enabled(bag: PropertyBag) -> OpenIdPlugin {
		OpenIdPlugin::new(Resolution::Enabled(Arc::new(ResolvedConfig::new("openid", bag))))
	}

	#[test]
	fn disabled_plugin_leaves_pipeline_untouched() {
		let resolver = ProviderResolver::new();
		let definitions = [
			ProviderDefinition::new("google", "openid"),
			ProviderDefinition::new("aaf", "openid"),
		];
		let plugin = OpenIdPlugin::from_definitions(&resolver, &definitions);
		let mut pipeline = FilterPipeline::new();
		let outcome = plugin.configure(&mut pipeline).expect("Disabled configure never fails.");

		assert!(matches!(outcome, ConfigureOutcome::Disabled(DisabledReason::Ambiguous { .. })));
		assert_eq!(pipeline, FilterPipeline::new());
		assert_eq!(plugin.login_str(), "");
		assert_eq!(plugin.username_password_style(), "");

		let plugin = OpenIdPlugin::from_definitions(&ProviderResolver::new(), []);

		assert!(matches!(
			plugin.configure(&mut pipeline),
			Ok(ConfigureOutcome::Disabled(DisabledReason::Absent))
		));
		assert_eq!(pipeline.stages().len(), 1);
	}

	#[test]
	fn enabled_plugin_installs_stages_in_order() {
		let plugin = enabled(PropertyBag::new().with("preEstablishedRedirUri", "/openid-login"));
		let mut pipeline = FilterPipeline::new();
		let outcome = plugin.configure(&mut pipeline).expect("Stages should install.");

		assert_eq!(outcome, ConfigureOutcome::Configured { redirect_path: "/openid-login".into() });
		assert_eq!(
			pipeline.stages(),
			&[
				FilterStage::PreAuthentication,
				FilterStage::OAuth2ClientContext,
				FilterStage::OpenIdConnect { redirect_path: "/openid-login".into() },
			]
		);

		let err = plugin.configure(&mut pipeline).expect_err("Enabled failures propagate.");

		assert!(matches!(err, Error::Pipeline(PipelineError::Rejected { .. })));
	}

	#[test]
	fn missing_anchor_propagates() {
		struct Empty;
		impl SecurityPipeline for Empty {
			fn add_filter_after(
				&mut self,
				_: FilterStage,
				anchor: &FilterStage,
			) -> Result<(), PipelineError> {
				Err(PipelineError::MissingAnchor { anchor: anchor.name() })
			}

			fn remove_filter(&mut self, _: &FilterStage) -> bool {
				false
			}
		}

		let plugin = enabled(PropertyBag::new().with("preEstablishedRedirUri", "/cb"));
		let err = plugin.configure(&mut Empty).expect_err("Enabled failures propagate.");

		assert!(matches!(
			err,
			Error::Pipeline(PipelineError::MissingAnchor { anchor: "pre_authentication" })
		));
	}

	#[test]
	fn refused_connect_stage_rolls_back_client_context() {
		struct NoConnect(FilterPipeline);
		impl SecurityPipeline for NoConnect {
			fn add_filter_after(
				&mut self,
				stage: FilterStage,
				anchor: &FilterStage,
			) -> Result<(), PipelineError> {
				if let FilterStage::OpenIdConnect { .. } = stage {
					return Err(PipelineError::Rejected {
						stage: stage.name(),
						reason: "refused".into(),
					});
				}

				self.0.add_filter_after(stage, anchor)
			}

			fn remove_filter(&mut self, stage: &FilterStage) -> bool {
				self.0.remove_filter(stage)
			}
		}

		let plugin = enabled(PropertyBag::new().with("preEstablishedRedirUri", "/cb"));
		let mut pipeline = NoConnect(FilterPipeline::new());
		let err = plugin.configure(&mut pipeline).expect_err("Refused stages propagate.");

		assert!(matches!(err, Error::Pipeline(PipelineError::Rejected { .. })));
		assert_eq!(pipeline.0, FilterPipeline::new());
	}

	#[test]
	fn login_links_concatenate_without_separator() {
		let plugin = enabled(
			PropertyBag::new()
				.with("enabled", "a,b")
				.with("openid.a.link", "<a>")
				.with("openid.b.link", "<b>"),
		);

		assert_eq!(plugin.login_str(), "<a><b>");
	}

	#[test]
	fn username_password_style_follows_flag() {
		let hidden = enabled(PropertyBag::new().with("disableUsernamePasswordLogin", "true"));
		let shown = enabled(PropertyBag::new().with("disableUsernamePasswordLogin", "false"));

		assert_eq!(hidden.username_password_style(), "display:none");
		assert_eq!(shown.username_password_style(), "");
		assert_eq!(enabled(PropertyBag::new()).username_password_style(), "");
	}
}
