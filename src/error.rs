//! Login-core error types shared across resolution, descriptors, PKCE, and grant handlers.

// self
use crate::{_prelude::*, gateway::PipelineError, provider::GrantType};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// [`Error::ConfigAbsent`] and [`Error::ConfigAmbiguous`] describe a disabled plugin and are
/// swallowed by [`crate::gateway::OpenIdPlugin::configure`]; every other variant reaches the
/// caller, which reports it to the user as a failed login.
#[derive(Debug, ThisError)]
pub enum Error {
	/// No provider definition carries the `openid` auth method.
	#[error("No OpenID provider is configured.")]
	ConfigAbsent,
	/// More than one provider definition carries the `openid` auth method.
	#[error("Only one OpenID provider is supported at a time, found {}: {}.", .providers.len(), .providers.join(", "))]
	ConfigAmbiguous {
		/// Identifiers of every eligible definition.
		providers: Vec<String>,
	},
	/// A required per-provider property is absent or blank.
	#[error("Provider `{provider}` is missing the `{property}` property.")]
	ConfigMissing {
		/// Provider alias being looked up.
		provider: String,
		/// Property name relative to the provider namespace.
		property: &'static str,
	},
	/// The session carries no provider alias.
	#[error("No provider is bound to the session.")]
	ProviderNotBound,
	/// Provider alias is not listed in the `enabled` property.
	#[error("Provider `{provider}` is not enabled.")]
	UnknownProvider {
		/// Alias supplied by the caller.
		provider: String,
	},
	/// A configured value could not be parsed.
	#[error(transparent)]
	InvalidConfig(#[from] ConfigError),

	/// The descriptor mandates PKCE but no challenge was supplied.
	#[error("PKCE is required for this provider but no challenge was supplied.")]
	PkceRequired,
	/// The code verifier was already consumed by an earlier exchange.
	#[error("PKCE code verifier has already been used.")]
	PkceReplay,
	/// The password grant was selected but the request carried no resource-owner credentials.
	#[error("Resource-owner credentials are required for the password grant.")]
	CredentialsRequired,
	/// The returned authorization state does not match the one issued for the session.
	#[error("Authorization state mismatch.")]
	StateMismatch,
	/// The user must be redirected to the authorization endpoint before a token can be issued.
	#[error("User redirect required: {authorization_url}.")]
	UserRedirectRequired {
		/// Fully formed authorization URL.
		authorization_url: Url,
	},
	/// No grant handler in the chain supports the descriptor.
	#[error("No grant handler supports the {grant} descriptor.")]
	UnsupportedDescriptor {
		/// Grant requested by the descriptor.
		grant: GrantType,
	},
	/// Token, authorization, or userinfo endpoint call failed.
	#[error(transparent)]
	TokenExchangeFailed(#[from] TokenExchangeError),
	/// Host pipeline refused a filter stage while the plugin was enabled.
	#[error(transparent)]
	Pipeline(#[from] PipelineError),
}

/// Configuration values that exist but cannot be used.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A configured endpoint is not a valid absolute URL.
	#[error("Property `{property}` is not a valid URL: {value}.")]
	InvalidUrl {
		/// Property name.
		property: &'static str,
		/// Offending value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Scope list contains an unusable entry.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Provider alias fails identifier validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// `grantType` names a grant the chain does not know.
	#[error("Unknown grant type `{value}`.")]
	UnknownGrant {
		/// Offending value.
		value: String,
	},
	/// JSON provider-definition payload could not be parsed.
	#[error("Provider definition is malformed.")]
	MalformedDefinition {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Upstream failures surfaced by grant handlers; never retried by this crate.
#[derive(Debug, ThisError)]
pub enum TokenExchangeError {
	/// Provider answered with an OAuth error payload.
	#[error("Token endpoint rejected the {grant} grant: {}.", rejection_detail(.error, .description))]
	Rejected {
		/// Grant being exchanged.
		grant: GrantType,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// OAuth `error` code.
		error: String,
		/// OAuth `error_description`, when supplied.
		description: Option<String>,
	},
	/// Endpoint returned a non-2xx status without a usable OAuth error payload.
	#[error("Endpoint returned HTTP {status}.")]
	UnexpectedStatus {
		/// HTTP status code.
		status: u16,
		/// Truncated response body.
		body_preview: String,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// HTTP request could not be assembled.
	#[error("HTTP request could not be built.")]
	Request(#[from] oauth2::http::Error),
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the provider.")]
	Io(#[from] std::io::Error),
	/// Endpoint responded with malformed JSON.
	#[error("Provider returned malformed JSON.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Payload parsed but lacks what a token needs.
	#[error("Provider returned an unusable token: {reason}.")]
	MalformedToken {
		/// What was wrong with the payload.
		reason: String,
	},
	/// The exchange exceeded the configured timeout.
	#[error("Provider did not answer within {after}.")]
	Timeout {
		/// Timeout that elapsed.
		after: Duration,
	},
	/// The owning session was torn down while the exchange was in flight.
	#[error("Exchange was cancelled because the session ended.")]
	Cancelled,
}
impl TokenExchangeError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// HTTP status reported by the provider, when one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } | Self::Parse { status, .. } => *status,
			Self::UnexpectedStatus { status, .. } => Some(*status),
			_ => None,
		}
	}
}

fn rejection_detail<'a>(error: &'a str, description: &'a Option<String>) -> &'a str {
	description.as_deref().unwrap_or(error)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn ambiguous_config_lists_every_provider() {
		let err = Error::ConfigAmbiguous { providers: vec!["google".into(), "aaf".into()] };

		assert_eq!(
			err.to_string(),
			"Only one OpenID provider is supported at a time, found 2: google, aaf."
		);
	}

	#[test]
	fn rejected_exchange_prefers_description() {
		let err = TokenExchangeError::Rejected {
			grant: GrantType::AuthorizationCode,
			status: Some(400),
			error: "invalid_grant".into(),
			description: Some("code already used".into()),
		};

		assert_eq!(err.status(), Some(400));
		assert!(err.to_string().contains("code already used"));
	}
}
