//! Client Credentials grant for app-only tokens.

// self
use crate::{
	chain::{Exchange, GrantHandler, HandlerFuture},
	http::TokenHttpClient,
	provider::GrantType,
};

/// Exchanges the client's own credentials for a token; no user or PKCE involvement.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClientCredentialsHandler;
impl<C> GrantHandler<C> for ClientCredentialsHandler
where
	C: ?Sized + TokenHttpClient,
{
	fn grant(&self) -> GrantType {
		GrantType::ClientCredentials
	}

	fn acquire<'a>(&'a self, exchange: Exchange<'a, C>) -> HandlerFuture<'a> {
		Box::pin(async move { exchange.facade.exchange_client_credentials().await })
	}
}
