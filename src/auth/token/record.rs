//! Opaque access tokens returned by grant handlers.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, ScopeSet, token::secret::TokenSecret},
	provider::GrantType,
};

/// Errors produced by [`AccessTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum AccessTokenBuilderError {
	/// Issued when no bearer value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Provider returned a zero or negative lifetime.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiry,
	/// Issue instant plus lifetime does not fit in a timestamp.
	#[error("The expires_in value overflows the expiry timestamp.")]
	ExpiryOutOfRange,
}

/// Bearer token plus optional refresh token and expiry.
///
/// The chain never inspects token contents; callers attach [`AccessToken::bearer`] to
/// resource requests and consult [`AccessToken::is_expired_at`] before reuse.
#[derive(Serialize, Deserialize, Clone)]
pub struct AccessToken {
	/// Provider alias that issued the token.
	pub provider: ProviderId,
	/// Grant that produced the token.
	pub grant: GrantType,
	/// Bearer secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Token type reported by the provider (usually `bearer`).
	pub token_type: String,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Scopes the provider reported, or the requested scopes when it stayed silent.
	pub scope: ScopeSet,
	/// Instant the token was received.
	pub issued_at: OffsetDateTime,
	/// Expiry instant when the provider supplied `expires_in`.
	pub expires_at: Option<OffsetDateTime>,
}
impl AccessToken {
	/// Returns a builder for the provided provider + grant pair.
	pub fn builder(provider: ProviderId, grant: GrantType) -> AccessTokenBuilder {
		AccessTokenBuilder::new(provider, grant)
	}

	/// Bearer value to place in an `Authorization` header.
	pub fn bearer(&self) -> &str {
		self.access_token.expose()
	}

	/// Returns `true` once `instant` reaches the expiry; tokens without expiry never expire.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expiry| instant >= expiry)
	}

	/// Convenience helper that checks expiry against the current UTC instant.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("provider", &self.provider)
			.field("grant", &self.grant)
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("scope", &self.scope)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`AccessToken`].
#[derive(Clone, Debug)]
pub struct AccessTokenBuilder {
	provider: ProviderId,
	grant: GrantType,
	access_token: Option<TokenSecret>,
	token_type: Option<String>,
	refresh_token: Option<TokenSecret>,
	scope: ScopeSet,
	issued_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl AccessTokenBuilder {
	fn new(provider: ProviderId, grant: GrantType) -> Self {
		Self {
			provider,
			grant,
			access_token: None,
			token_type: None,
			refresh_token: None,
			scope: ScopeSet::default(),
			issued_at: None,
			expires_in: None,
		}
	}

	/// Provides the bearer value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the token type; defaults to `bearer`.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the granted scopes.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets a relative lifetime from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces an [`AccessToken`].
	pub fn build(self) -> Result<AccessToken, AccessTokenBuilderError> {
		let access_token = self
			.access_token
			.filter(|secret| !secret.expose().is_empty())
			.ok_or(AccessTokenBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match self.expires_in {
			Some(delta) if !delta.is_positive() =>
				return Err(AccessTokenBuilderError::NonPositiveExpiry),
			Some(delta) => Some(
				issued_at.checked_add(delta).ok_or(AccessTokenBuilderError::ExpiryOutOfRange)?,
			),
			None => None,
		};

		Ok(AccessToken {
			provider: self.provider,
			grant: self.grant,
			access_token,
			token_type: self.token_type.unwrap_or_else(|| "bearer".into()),
			refresh_token: self.refresh_token,
			scope: self.scope,
			issued_at,
			expires_at,
		})
	}
}
