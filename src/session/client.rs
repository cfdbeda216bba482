//! Provider-scoped REST client bound to one interactive session.

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, SessionId},
	chain::{TokenProviderChain, TokenRequest, generate_state},
	http::TokenHttpClient,
	pkce::{PkceNegotiator, PkceParams},
	provider::{GrantType, ResourceDescriptor},
};

/// Redirect the caller must send the user to, plus the values that come back with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
	/// Fully formed authorization URL.
	pub url: Url,
	/// Opaque state echoed back by the provider.
	pub state: String,
	/// PKCE challenge embedded in the URL, when the provider enables PKCE.
	pub pkce: Option<PkceParams>,
}

struct PendingLogin {
	request: AuthorizationRequest,
	issued_at: OffsetDateTime,
}

/// REST client pre-configured with one provider's descriptor and the grant chain.
///
/// One instance lives per session. Tokens acquired through it are cached until they expire.
pub struct ProviderRestClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	session: SessionId,
	descriptor: ResourceDescriptor,
	chain: Arc<TokenProviderChain<C>>,
	pkce: Arc<PkceNegotiator>,
	cancel: CancellationToken,
	pending: Mutex<Option<PendingLogin>>,
	token: RwLock<Option<AccessToken>>,
}
impl<C> ProviderRestClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	pub(crate) fn new(
		session: SessionId,
		descriptor: ResourceDescriptor,
		chain: Arc<TokenProviderChain<C>>,
		pkce: Arc<PkceNegotiator>,
		cancel: CancellationToken,
	) -> Self {
		Self {
			session,
			descriptor,
			chain,
			pkce,
			cancel,
			pending: Mutex::new(None),
			token: RwLock::new(None),
		}
	}

	/// Descriptor this client was built from.
	pub fn descriptor(&self) -> &ResourceDescriptor {
		&self.descriptor
	}

	/// Returns `true` once the owning session was invalidated.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Starts a redirect-bound login.
	///
	/// Generates the state value and, when the provider enables PKCE, a challenge stored against
	/// the session. Calling it again replaces both.
	pub fn begin_authorization(&self) -> Result<AuthorizationRequest> {
		let grant = self.descriptor.grant;

		if !grant.is_redirect_bound() {
			return Err(Error::UnsupportedDescriptor { grant });
		}

		let state = generate_state();
		let pkce = (grant == GrantType::AuthorizationCode && self.descriptor.pkce_enabled)
			.then(|| self.pkce.issue(&self.session));
		let url = self.chain.authorization_url(&self.descriptor, &state, pkce.as_ref());
		let request = AuthorizationRequest { url, state, pkce };

		*self.pending.lock() = Some(PendingLogin {
			request: request.clone(),
			issued_at: OffsetDateTime::now_utc(),
		});

		Ok(request)
	}

	/// Finishes the authorization-code login with the values returned to the redirect URI.
	///
	/// The session's PKCE verifier is consumed first, then the state is checked against the one
	/// issued by [`Self::begin_authorization`]. A second call with the same values fails with
	/// [`Error::PkceReplay`] when the provider enables PKCE and [`Error::StateMismatch`]
	/// otherwise.
	pub async fn complete_authorization(&self, code: &str, state: &str) -> Result<AccessToken> {
		let pkce = if self.descriptor.pkce_enabled {
			Some(self.pkce.consume(&self.session)?)
		} else {
			None
		};

		self.check_state(state)?;

		let request = TokenRequest::default().with_code(code).with_state(state);
		let token = self
			.chain
			.acquire_token_cancellable(&self.descriptor, pkce.as_ref(), &request, &self.cancel)
			.await?;

		Ok(self.store_token(token))
	}

	/// Finishes an implicit-grant login with the fragment returned to the redirect URI.
	pub async fn complete_implicit(&self, fragment: &str) -> Result<AccessToken> {
		let state = self
			.pending
			.lock()
			.take()
			.map(|login| login.request.state)
			.ok_or(Error::StateMismatch)?;
		let request = TokenRequest::default().with_fragment(fragment).with_state(state);

		self.acquire(&request).await
	}

	/// Runs the chain with caller-supplied inputs, such as password-grant credentials.
	pub async fn acquire(&self, request: &TokenRequest) -> Result<AccessToken> {
		let token = self
			.chain
			.acquire_token_cancellable(&self.descriptor, None, request, &self.cancel)
			.await?;

		Ok(self.store_token(token))
	}

	/// Cached token, or a fresh one when the grant can run without user interaction.
	///
	/// Redirect-bound grants without a live token fail with [`Error::UserRedirectRequired`].
	/// A login still pending within the PKCE TTL is reused, so its callback stays valid;
	/// otherwise a new authorization is started.
	pub async fn access_token(&self) -> Result<AccessToken> {
		if let Some(token) = self.token.read().as_ref().filter(|token| !token.is_expired()) {
			return Ok(token.clone());
		}
		if self.descriptor.grant.is_redirect_bound() {
			let authorization_url = match self.pending_url() {
				Some(url) => url,
				None => self.begin_authorization()?.url,
			};

			return Err(Error::UserRedirectRequired { authorization_url });
		}

		self.acquire(&TokenRequest::default()).await
	}

	/// Fetches the OpenID Connect userinfo document with the session's bearer token.
	pub async fn fetch_user_info(&self) -> Result<serde_json::Value> {
		let token = self.access_token().await?;
		let facade = self.chain.facade(&self.descriptor);

		self.chain.guard(&self.cancel, facade.fetch_user_info(&token)).await
	}

	fn pending_url(&self) -> Option<Url> {
		let now = OffsetDateTime::now_utc();

		self.pending
			.lock()
			.as_ref()
			.filter(|login| now - login.issued_at < self.pkce.ttl())
			.map(|login| login.request.url.clone())
	}

	fn check_state(&self, returned: &str) -> Result<()> {
		match self.pending.lock().take() {
			Some(login) if login.request.state == returned => Ok(()),
			_ => Err(Error::StateMismatch),
		}
	}

	fn store_token(&self, token: AccessToken) -> AccessToken {
		*self.token.write() = Some(token.clone());

		token
	}
}
impl<C> Debug for ProviderRestClient<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderRestClient")
			.field("session", &self.session)
			.field("provider", &self.descriptor.provider)
			.field("grant", &self.descriptor.grant)
			.field("cancelled", &self.cancel.is_cancelled())
			.field("token", &self.token.read().as_ref())
			.finish()
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, config::ExchangeSettings, http::ReqwestHttpClient};

	fn client(grant: GrantType) -> ProviderRestClient<ReqwestHttpClient> {
		let settings = ExchangeSettings::default();
		let config = Arc::new(resolved_config_fixture("https://x"));
		let pkce = Arc::new(PkceNegotiator::new(config, &settings));
		let chain =
			Arc::new(TokenProviderChain::new(Arc::new(ReqwestHttpClient::default()), &settings));

		ProviderRestClient::new(
			SessionId::new("s-1").expect("Session fixture should be valid."),
			descriptor_fixture(grant, "https://x"),
			chain,
			pkce,
			CancellationToken::new(),
		)
	}

	#[test]
	fn begin_authorization_issues_state_and_pkce() {
		let client = client(GrantType::AuthorizationCode);
		let request = client.begin_authorization().expect("Authorization should start.");
		let pkce = request.pkce.as_ref().expect("PKCE-enabled providers get a challenge.");
		let pairs = request.url.query_pairs().into_owned().collect::<HashMap<_, _>>();

		assert_eq!(pairs.get("state"), Some(&request.state));
		assert_eq!(pairs.get("code_challenge"), Some(&pkce.challenge));
		assert_eq!(pairs.get("redirect_uri").map(String::as_str), Some("https://host/cb"));
	}

	#[test]
	fn non_interactive_grants_cannot_begin_authorization() {
		let err = client(GrantType::ClientCredentials)
			.begin_authorization()
			.expect_err("Client credentials never redirect.");

		assert!(matches!(
			err,
			Error::UnsupportedDescriptor { grant: GrantType::ClientCredentials }
		));
	}

	#[tokio::test]
	async fn foreign_state_is_rejected_before_any_exchange() {
		let client = client(GrantType::AuthorizationCode);

		client.begin_authorization().expect("Authorization should start.");

		let err = client
			.complete_authorization("code", "forged")
			.await
			.expect_err("Foreign states must fail.");

		assert!(matches!(err, Error::StateMismatch));
	}

	#[tokio::test]
	async fn replayed_callbacks_fail_as_pkce_replay() {
		let client = client(GrantType::AuthorizationCode);
		let request = client.begin_authorization().expect("Authorization should start.");

		client.pkce.consume(&client.session).expect("Pending verifier should be consumable.");

		let err = client
			.complete_authorization("code", &request.state)
			.await
			.expect_err("A consumed verifier cannot be exchanged again.");

		assert!(matches!(err, Error::PkceReplay));
	}

	#[tokio::test]
	async fn token_lookups_keep_the_pending_login() {
		let client = client(GrantType::AuthorizationCode);
		let request = client.begin_authorization().expect("Authorization should start.");
		let err = client.access_token().await.expect_err("No token was exchanged yet.");
		let Error::UserRedirectRequired { authorization_url } = err else {
			panic!("Unexpected error: {err:?}.");
		};
		let expected = request.pkce.as_ref().expect("PKCE fixture is enabled.");
		let pending = client.pkce.consume(&client.session).expect("Verifier should survive.");

		assert_eq!(authorization_url, request.url);
		assert_eq!(pending.challenge(), expected.challenge);
	}

	#[tokio::test]
	async fn redirect_bound_grants_without_token_ask_for_redirect() {
		let err = client(GrantType::Implicit)
			.access_token()
			.await
			.expect_err("Implicit clients need a redirect first.");

		assert!(matches!(err, Error::UserRedirectRequired { .. }));
	}
}
