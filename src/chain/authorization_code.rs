//! Authorization Code grant, PKCE-hardened when the descriptor asks for it.

// self
use crate::{
	_prelude::*,
	chain::{Exchange, GrantHandler, HandlerFuture},
	http::TokenHttpClient,
	provider::GrantType,
};

/// Exchanges an authorization code, or asks for the user redirect when no code is present yet.
///
/// A PKCE-enabled descriptor without a challenge fails with [`Error::PkceRequired`] before the
/// provider is contacted.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthorizationCodeHandler;
impl<C> GrantHandler<C> for AuthorizationCodeHandler
where
	C: ?Sized + TokenHttpClient,
{
	fn grant(&self) -> GrantType {
		GrantType::AuthorizationCode
	}

	fn acquire<'a>(&'a self, exchange: Exchange<'a, C>) -> HandlerFuture<'a> {
		Box::pin(async move {
			if exchange.descriptor.pkce_enabled && exchange.pkce.is_none() {
				return Err(Error::PkceRequired);
			}

			let Some(code) = exchange.request.code.as_deref() else {
				return Err(Error::UserRedirectRequired {
					authorization_url: exchange.authorization_url(GrantType::AuthorizationCode),
				});
			};

			exchange.facade.exchange_code(code, exchange.pkce).await
		})
	}
}
