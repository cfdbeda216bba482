//! Implicit grant; the provider returns the token in the redirect URI fragment.

// crates.io
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, ScopeSet},
	chain::{Exchange, GrantHandler, HandlerFuture},
	error::TokenExchangeError,
	http::TokenHttpClient,
	provider::{GrantType, ResourceDescriptor},
};

/// Parses the token fragment, or asks for the user redirect when no fragment is present yet.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImplicitHandler;
impl<C> GrantHandler<C> for ImplicitHandler
where
	C: ?Sized + TokenHttpClient,
{
	fn grant(&self) -> GrantType {
		GrantType::Implicit
	}

	fn acquire<'a>(&'a self, exchange: Exchange<'a, C>) -> HandlerFuture<'a> {
		Box::pin(async move {
			let Some(fragment) = exchange.request.fragment.as_deref() else {
				return Err(Error::UserRedirectRequired {
					authorization_url: exchange.authorization_url(GrantType::Implicit),
				});
			};

			token_from_fragment(exchange.descriptor, fragment, exchange.request.state.as_deref())
		})
	}
}

/// Builds an [`AccessToken`] from an implicit-grant fragment.
///
/// An `error` parameter becomes [`TokenExchangeError::Rejected`]; a state that differs from
/// `expected_state` becomes [`Error::StateMismatch`].
pub fn token_from_fragment(
	descriptor: &ResourceDescriptor,
	fragment: &str,
	expected_state: Option<&str>,
) -> Result<AccessToken> {
	let params = form_urlencoded::parse(fragment.trim_start_matches('#').as_bytes())
		.into_owned()
		.collect::<HashMap<String, String>>();

	if let Some(error) = params.get("error") {
		return Err(TokenExchangeError::Rejected {
			grant: GrantType::Implicit,
			status: None,
			error: error.to_owned(),
			description: params.get("error_description").cloned(),
		}
		.into());
	}
	if let Some(expected) = expected_state
		&& params.get("state").map(String::as_str) != Some(expected)
	{
		return Err(Error::StateMismatch);
	}

	let access_token = params.get("access_token").ok_or_else(|| {
		TokenExchangeError::MalformedToken { reason: "fragment lacks access_token".into() }
	})?;
	let scope = match params.get("scope") {
		Some(raw) => ScopeSet::from_str(raw)
			.map_err(|err| TokenExchangeError::MalformedToken { reason: err.to_string() })?,
		None => descriptor.scope.clone(),
	};
	let mut builder = AccessToken::builder(descriptor.provider.clone(), GrantType::Implicit)
		.access_token(access_token.to_owned())
		.scope(scope);

	if let Some(token_type) = params.get("token_type") {
		builder = builder.token_type(token_type.to_owned());
	}
	if let Some(raw) = params.get("expires_in") {
		let secs = raw.trim().parse::<i64>().map_err(|_| TokenExchangeError::MalformedToken {
			reason: format!("expires_in is not an integer: {raw}"),
		})?;

		builder = builder.expires_in(Duration::seconds(secs));
	}

	builder
		.build()
		.map_err(|err| TokenExchangeError::MalformedToken { reason: err.to_string() }.into())
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	fn descriptor() -> ResourceDescriptor {
		descriptor_fixture(GrantType::Implicit, "https://x")
	}

	#[test]
	fn fragment_yields_token() {
		let token = token_from_fragment(
			&descriptor(),
			"#access_token=abc&token_type=Bearer&expires_in=3600&state=s-1&scope=openid%20profile",
			Some("s-1"),
		)
		.expect("Well-formed fragments should yield a token.");

		assert_eq!(token.bearer(), "abc");
		assert_eq!(token.token_type, "Bearer");
		assert_eq!(token.grant, GrantType::Implicit);
		assert!(token.scope.contains("profile"));
		assert!(token.expires_at.is_some());
	}

	#[test]
	fn provider_errors_and_state_mismatches_fail() {
		let err = token_from_fragment(
			&descriptor(),
			"error=access_denied&error_description=User%20declined",
			None,
		)
		.expect_err("Error fragments must fail.");

		assert!(matches!(
			err,
			Error::TokenExchangeFailed(TokenExchangeError::Rejected { ref error, .. })
				if error == "access_denied"
		));

		let err = token_from_fragment(&descriptor(), "access_token=abc&state=other", Some("s-1"))
			.expect_err("Foreign states must fail.");

		assert!(matches!(err, Error::StateMismatch));
	}

	#[test]
	fn fragments_without_tokens_are_malformed() {
		let err = token_from_fragment(&descriptor(), "token_type=bearer", None)
			.expect_err("A token is mandatory.");

		assert!(matches!(
			err,
			Error::TokenExchangeFailed(TokenExchangeError::MalformedToken { .. })
		));
	}

	#[test]
	fn oversized_lifetimes_are_malformed() {
		let err = token_from_fragment(
			&descriptor(),
			"access_token=abc&expires_in=9223372036854775807",
			None,
		)
		.expect_err("Lifetimes past the timestamp range must fail.");

		assert!(matches!(
			err,
			Error::TokenExchangeFailed(TokenExchangeError::MalformedToken { .. })
		));
	}
}
