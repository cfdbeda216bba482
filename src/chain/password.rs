//! Resource Owner Password Credentials grant.

// self
use crate::{
	_prelude::*,
	chain::{Exchange, GrantHandler, HandlerFuture},
	http::TokenHttpClient,
	provider::GrantType,
};

/// Exchanges resource-owner credentials carried by the request.
#[derive(Clone, Copy, Debug, Default)]
pub struct PasswordHandler;
impl<C> GrantHandler<C> for PasswordHandler
where
	C: ?Sized + TokenHttpClient,
{
	fn grant(&self) -> GrantType {
		GrantType::Password
	}

	fn acquire<'a>(&'a self, exchange: Exchange<'a, C>) -> HandlerFuture<'a> {
		Box::pin(async move {
			let request = exchange.request;
			let (Some(username), Some(password)) = (request.username.as_deref(), &request.password)
			else {
				return Err(Error::CredentialsRequired);
			};

			if username.trim().is_empty() || password.is_blank() {
				return Err(Error::CredentialsRequired);
			}

			exchange.facade.exchange_password(username, password).await
		})
	}
}
