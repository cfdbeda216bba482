//! Ordered grant chain that turns a [`ResourceDescriptor`] into an [`AccessToken`].
//!
//! Handlers are probed in [`GrantType::PRIORITY`] order and the first one that supports the
//! descriptor performs the exchange. The redirect-bound grants come first so a descriptor never
//! falls through to a weaker grant.
//!
//! Every exchange is bounded by [`ExchangeSettings::timeout`] and races the caller's
//! [`CancellationToken`]; failures surface as [`Error::TokenExchangeFailed`] and are never
//! retried here.

pub mod authorization_code;
pub mod client_credentials;
pub mod implicit;
pub mod password;

// crates.io
use rand::{Rng, distr::Alphanumeric};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenSecret},
	config::ExchangeSettings,
	error::TokenExchangeError,
	http::TokenHttpClient,
	oauth::BasicFacade,
	obs::{self, FlowOutcome, FlowSpan, log_event},
	pkce::{PkceChallenge, PkceParams},
	provider::{GrantType, ResourceDescriptor},
};

const STATE_LEN: usize = 32;

/// Boxed future returned by [`GrantHandler::acquire`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<AccessToken>> + 'a + Send>>;

/// Per-call inputs that only some grants consume.
#[derive(Clone, Debug, Default)]
pub struct TokenRequest {
	/// Authorization code returned to the redirect URI.
	pub code: Option<String>,
	/// State value the authorization request was issued with.
	pub state: Option<String>,
	/// Resource-owner username for the password grant.
	pub username: Option<String>,
	/// Resource-owner password for the password grant.
	pub password: Option<TokenSecret>,
	/// URI fragment returned by the implicit grant (without the leading `#`).
	pub fragment: Option<String>,
}
impl TokenRequest {
	/// Sets the authorization code returned by the provider.
	pub fn with_code(mut self, code: impl Into<String>) -> Self {
		self.code = Some(code.into());

		self
	}

	/// Sets the expected state value.
	pub fn with_state(mut self, state: impl Into<String>) -> Self {
		self.state = Some(state.into());

		self
	}

	/// Sets the resource-owner credentials.
	pub fn with_credentials(
		mut self,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		self.username = Some(username.into());
		self.password = Some(TokenSecret::new(password));

		self
	}

	/// Sets the implicit-grant fragment.
	pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
		let fragment = fragment.into();

		self.fragment = Some(fragment.strip_prefix('#').map(str::to_owned).unwrap_or(fragment));

		self
	}
}

/// Everything a handler needs for one exchange.
pub struct Exchange<'a, C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Descriptor the exchange was requested for.
	pub descriptor: &'a ResourceDescriptor,
	/// PKCE challenge consumed for this exchange, if any.
	pub pkce: Option<&'a PkceChallenge>,
	/// Per-call inputs.
	pub request: &'a TokenRequest,
	pub(crate) facade: &'a BasicFacade<C>,
}
impl<C> Exchange<'_, C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Authorization URL for `grant`, carrying the request state (or a fresh one).
	pub fn authorization_url(&self, grant: GrantType) -> Url {
		let state = self.request.state.clone().unwrap_or_else(generate_state);
		let pkce = self.pkce.map(PkceChallenge::params);

		self.facade.authorize_url(grant, &state, pkce.as_ref())
	}
}

/// One grant strategy in the chain.
pub trait GrantHandler<C>
where
	Self: Send + Sync,
	C: ?Sized + TokenHttpClient,
{
	/// Grant this handler performs.
	fn grant(&self) -> GrantType;

	/// Returns `true` when the handler can service `descriptor`.
	fn supports(&self, descriptor: &ResourceDescriptor) -> bool {
		descriptor.requests(self.grant())
	}

	/// Performs the exchange.
	fn acquire<'a>(&'a self, exchange: Exchange<'a, C>) -> HandlerFuture<'a>;
}

/// Ordered list of grant handlers sharing one HTTP transport.
pub struct TokenProviderChain<C>
where
	C: ?Sized + TokenHttpClient,
{
	handlers: Vec<Box<dyn GrantHandler<C>>>,
	http_client: Arc<C>,
	timeout: Duration,
}
impl<C> TokenProviderChain<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Builds the chain with the four standard handlers in priority order.
	pub fn new(http_client: Arc<C>, settings: &ExchangeSettings) -> Self {
		let handlers: Vec<Box<dyn GrantHandler<C>>> = vec![
			Box::new(authorization_code::AuthorizationCodeHandler),
			Box::new(implicit::ImplicitHandler),
			Box::new(password::PasswordHandler),
			Box::new(client_credentials::ClientCredentialsHandler),
		];

		Self { handlers, http_client, timeout: settings.timeout }
	}

	/// Grants of the registered handlers, in probe order.
	pub fn grants(&self) -> Vec<GrantType> {
		self.handlers.iter().map(|handler| handler.grant()).collect()
	}

	/// Timeout applied to every exchange.
	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Acquires a token for `descriptor` without external cancellation.
	pub async fn acquire_token(
		&self,
		descriptor: &ResourceDescriptor,
		pkce: Option<&PkceChallenge>,
		request: &TokenRequest,
	) -> Result<AccessToken> {
		self.acquire_token_cancellable(descriptor, pkce, request, &CancellationToken::new()).await
	}

	/// Acquires a token for `descriptor`, aborting with [`TokenExchangeError::Cancelled`] once
	/// `cancel` fires.
	pub async fn acquire_token_cancellable(
		&self,
		descriptor: &ResourceDescriptor,
		pkce: Option<&PkceChallenge>,
		request: &TokenRequest,
		cancel: &CancellationToken,
	) -> Result<AccessToken> {
		let handler = self
			.handlers
			.iter()
			.find(|handler| handler.supports(descriptor))
			.ok_or(Error::UnsupportedDescriptor { grant: descriptor.grant })?;
		let grant = handler.grant();
		let span = FlowSpan::new(grant, "acquire_token");

		log_event!(debug, "Selected {grant} handler for `{}`.", descriptor.provider);
		obs::record_exchange_outcome(grant, FlowOutcome::Attempt);

		let facade = BasicFacade::from_descriptor(descriptor, self.http_client.clone());
		let exchange = Exchange { descriptor, pkce, request, facade: &facade };
		let result = span.instrument(self.guard(cancel, handler.acquire(exchange))).await;

		match &result {
			Ok(_) => obs::record_exchange_outcome(grant, FlowOutcome::Success),
			// A redirect is the normal first leg of the interactive grants.
			Err(Error::UserRedirectRequired { .. }) => (),
			Err(e) => {
				log_event!(warn, "The {grant} exchange for `{}` failed: {e}.", descriptor.provider);
				obs::record_exchange_outcome(grant, FlowOutcome::Failure);
			},
		}

		result
	}

	pub(crate) fn facade(&self, descriptor: &ResourceDescriptor) -> BasicFacade<C> {
		BasicFacade::from_descriptor(descriptor, self.http_client.clone())
	}

	pub(crate) fn authorization_url(
		&self,
		descriptor: &ResourceDescriptor,
		state: &str,
		pkce: Option<&PkceParams>,
	) -> Url {
		self.facade(descriptor).authorize_url(descriptor.grant, state, pkce)
	}

	/// Bounds `fut` by the exchange timeout and races it against `cancel`.
	pub(crate) async fn guard<F, T>(&self, cancel: &CancellationToken, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		let after = self.timeout;

		tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(TokenExchangeError::Cancelled.into()),
			outcome = tokio::time::timeout(after.unsigned_abs(), fut) =>
				outcome.unwrap_or_else(|_| Err(TokenExchangeError::Timeout { after }.into())),
		}
	}
}
impl<C> Debug for TokenProviderChain<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenProviderChain")
			.field("grants", &self.grants())
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Random alphanumeric value for the OAuth `state` parameter.
pub fn generate_state() -> String {
	rand::rng().sample_iter(&Alphanumeric).take(STATE_LEN).map(char::from).collect()
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, http::ReqwestHttpClient};

	fn chain() -> TokenProviderChain<ReqwestHttpClient> {
		let settings = ExchangeSettings::default();

		TokenProviderChain::new(Arc::new(ReqwestHttpClient::default()), &settings)
	}

	#[test]
	fn handlers_follow_priority_order() {
		assert_eq!(chain().grants(), GrantType::PRIORITY.to_vec());
	}

	#[tokio::test]
	async fn pkce_is_required_before_any_network_call() {
		let descriptor = descriptor_fixture(GrantType::AuthorizationCode, "http://127.0.0.1:9");
		let err = chain()
			.acquire_token(&descriptor, None, &TokenRequest::default().with_code("code"))
			.await
			.expect_err("PKCE-enabled descriptors need a challenge.");

		assert!(matches!(err, Error::PkceRequired));
	}

	#[tokio::test]
	async fn missing_code_requires_a_redirect() {
		let descriptor = descriptor_fixture(GrantType::AuthorizationCode, "https://x");
		let pkce = PkceChallenge::generate(64);
		let err = chain()
			.acquire_token(&descriptor, Some(&pkce), &TokenRequest::default().with_state("s-1"))
			.await
			.expect_err("Without a code the user must be redirected.");
		let Error::UserRedirectRequired { authorization_url } = err else {
			panic!("Unexpected error: {err:?}.");
		};
		let pairs = authorization_url.query_pairs().into_owned().collect::<HashMap<_, _>>();

		assert_eq!(pairs.get("state").map(String::as_str), Some("s-1"));
		assert_eq!(pairs.get("code_challenge").map(String::as_str), Some(pkce.challenge()));
	}

	#[tokio::test]
	async fn cancelled_exchanges_stop_immediately() {
		let descriptor = descriptor_fixture(GrantType::ClientCredentials, "http://127.0.0.1:9");
		let cancel = CancellationToken::new();

		cancel.cancel();

		let err = chain()
			.acquire_token_cancellable(&descriptor, None, &TokenRequest::default(), &cancel)
			.await
			.expect_err("Cancelled exchanges must fail.");

		assert!(matches!(err, Error::TokenExchangeFailed(TokenExchangeError::Cancelled)));
	}

	#[tokio::test]
	async fn guard_times_out_slow_futures() {
		let settings = ExchangeSettings::default().with_timeout(Duration::milliseconds(20));
		let chain =
			TokenProviderChain::new(Arc::new(ReqwestHttpClient::default()), &settings);
		let err = chain
			.guard(&CancellationToken::new(), async {
				tokio::time::sleep(std::time::Duration::from_secs(5)).await;

				Ok(())
			})
			.await
			.expect_err("Slow exchanges must time out.");

		assert!(matches!(err, Error::TokenExchangeFailed(TokenExchangeError::Timeout { .. })));
	}

	#[test]
	fn fragments_drop_the_leading_hash() {
		let request = TokenRequest::default().with_fragment("#access_token=abc");

		assert_eq!(request.fragment.as_deref(), Some("access_token=abc"));
		assert_eq!(generate_state().len(), STATE_LEN);
	}
}
