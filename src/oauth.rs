//! OAuth 2.0 client facade built from a [`ResourceDescriptor`].
//!
//! The facade wraps the `oauth2` crate's [`BasicClient`] for the token-endpoint grants and
//! issues the bearer-authenticated userinfo request itself. Every failure is mapped into
//! [`TokenExchangeError`] with the upstream status attached when one was received.

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
	EndpointNotSet, EndpointSet, HttpClientError, PkceCodeVerifier, RedirectUrl,
	RequestTokenError, ResourceOwnerPassword, ResourceOwnerUsername, Scope, TokenResponse,
	TokenUrl,
	basic::{BasicClient, BasicRequestTokenError, BasicTokenResponse},
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION},
	},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, ScopeSet, TokenSecret},
	error::TokenExchangeError,
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	pkce::{PkceChallenge, PkceParams},
	provider::{GrantType, ResourceDescriptor},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

const BODY_PREVIEW_LEN: usize = 256;

/// Provider-scoped OAuth 2.0 client.
pub(crate) struct BasicFacade<C>
where
	C: ?Sized + TokenHttpClient,
{
	descriptor: ResourceDescriptor,
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
}
impl<C> BasicFacade<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Builds the facade; the redirect URI and client secret come straight from the descriptor.
	pub(crate) fn from_descriptor(
		descriptor: &ResourceDescriptor,
		http_client: Arc<C>,
	) -> Self {
		let auth_url = AuthUrl::from_url(descriptor.user_authorization_uri.clone());
		let token_url = TokenUrl::from_url(descriptor.access_token_uri.clone());
		let redirect_url = RedirectUrl::from_url(descriptor.pre_established_redirect_uri.clone());
		let oauth_client = BasicClient::new(ClientId::new(descriptor.client_id.clone()))
			.set_client_secret(ClientSecret::new(descriptor.client_secret.expose().to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url);

		Self { descriptor: descriptor.clone(), oauth_client, http_client }
	}

	/// Authorization URL for the redirect-bound grants.
	///
	/// The implicit grant asks for `response_type=token`; PKCE parameters are attached only for
	/// the authorization-code grant.
	pub(crate) fn authorize_url(
		&self,
		grant: GrantType,
		state: &str,
		pkce: Option<&PkceParams>,
	) -> Url {
		let state = state.to_owned();
		let mut request = self.oauth_client.authorize_url(move || CsrfToken::new(state));

		for scope in self.descriptor.scope.iter() {
			request = request.add_scope(Scope::new(scope.to_owned()));
		}

		match grant {
			GrantType::Implicit => request = request.use_implicit_flow(),
			_ =>
				if let Some(pkce) = pkce {
					request = request
						.add_extra_param("code_challenge", pkce.challenge.clone())
						.add_extra_param("code_challenge_method", pkce.method.as_str());
				},
		}

		let (url, _) = request.url();

		url
	}

	pub(crate) async fn exchange_code(
		&self,
		code: &str,
		pkce: Option<&PkceChallenge>,
	) -> Result<AccessToken> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let mut request = self.oauth_client.exchange_code(AuthorizationCode::new(code.to_owned()));

		if let Some(pkce) = pkce {
			request = request.set_pkce_verifier(PkceCodeVerifier::new(pkce.verifier().to_owned()));
		}

		let response = request.request_async(&handle).await.map_err(|err| {
			map_request_error(GrantType::AuthorizationCode, meta.take(), err)
		})?;

		self.token_from_response(GrantType::AuthorizationCode, response)
	}

	pub(crate) async fn exchange_password(
		&self,
		username: &str,
		password: &TokenSecret,
	) -> Result<AccessToken> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let username = ResourceOwnerUsername::new(username.to_owned());
		let password = ResourceOwnerPassword::new(password.expose().to_owned());
		let mut request = self.oauth_client.exchange_password(&username, &password);

		for scope in self.descriptor.scope.iter() {
			request = request.add_scope(Scope::new(scope.to_owned()));
		}

		let response = request
			.request_async(&handle)
			.await
			.map_err(|err| map_request_error(GrantType::Password, meta.take(), err))?;

		self.token_from_response(GrantType::Password, response)
	}

	pub(crate) async fn exchange_client_credentials(&self) -> Result<AccessToken> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let mut request = self.oauth_client.exchange_client_credentials();

		for scope in self.descriptor.scope.iter() {
			request = request.add_scope(Scope::new(scope.to_owned()));
		}

		let response = request
			.request_async(&handle)
			.await
			.map_err(|err| map_request_error(GrantType::ClientCredentials, meta.take(), err))?;

		self.token_from_response(GrantType::ClientCredentials, response)
	}

	/// Bearer-authenticated GET against `userInfoUri`, returning the JSON document.
	pub(crate) async fn fetch_user_info(&self, token: &AccessToken) -> Result<serde_json::Value> {
		let Some(endpoint) = &self.descriptor.user_info_uri else {
			return Err(Error::ConfigMissing {
				provider: self.descriptor.provider.to_string(),
				property: "userInfoUri",
			});
		};
		let request = Request::builder()
			.method(Method::GET)
			.uri(endpoint.as_str())
			.header(AUTHORIZATION, format!("Bearer {}", token.bearer()))
			.header(ACCEPT, "application/json")
			.body(Vec::new())
			.map_err(TokenExchangeError::from)?;
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let response = handle.call(request).await.map_err(map_transport_error)?;
		let status = response.status();

		if !status.is_success() {
			return Err(TokenExchangeError::UnexpectedStatus {
				status: status.as_u16(),
				body_preview: body_preview(response.body()),
			}
			.into());
		}

		let mut deserializer = serde_json::Deserializer::from_slice(response.body());

		serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
			TokenExchangeError::Parse { source, status: meta_status(meta.take().as_ref()) }.into()
		})
	}

	fn token_from_response(
		&self,
		grant: GrantType,
		response: BasicTokenResponse,
	) -> Result<AccessToken> {
		let scope = match response.scopes() {
			Some(scopes) => ScopeSet::new(scopes.iter().map(|scope| scope.as_str()))
				.map_err(|err| TokenExchangeError::MalformedToken { reason: err.to_string() })?,
			None => self.descriptor.scope.clone(),
		};
		let mut builder = AccessToken::builder(self.descriptor.provider.clone(), grant)
			.access_token(response.access_token().secret().to_owned())
			.token_type(response.token_type().as_ref())
			.scope(scope);

		if let Some(expires_in) = response.expires_in() {
			let secs = i64::try_from(expires_in.as_secs()).map_err(|_| {
				TokenExchangeError::MalformedToken { reason: "expires_in is out of range".into() }
			})?;

			builder = builder.expires_in(Duration::seconds(secs));
		}
		if let Some(refresh) = response.refresh_token() {
			builder = builder.refresh_token(refresh.secret().to_owned());
		}

		builder
			.build()
			.map_err(|err| TokenExchangeError::MalformedToken { reason: err.to_string() }.into())
	}
}

fn map_request_error<E>(
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	let status = meta_status(meta.as_ref());
	let mapped = match err {
		RequestTokenError::ServerResponse(response) => TokenExchangeError::Rejected {
			grant,
			status,
			error: response.error().as_ref().to_owned(),
			description: response.error_description().cloned(),
		},
		RequestTokenError::Request(error) => map_transport_error(error),
		RequestTokenError::Parse(source, _body) => TokenExchangeError::Parse { source, status },
		RequestTokenError::Other(message) => match status {
			Some(status) if !(200..300).contains(&status) =>
				TokenExchangeError::UnexpectedStatus { status, body_preview: message },
			_ => TokenExchangeError::MalformedToken { reason: message },
		},
	};

	mapped.into()
}

fn map_transport_error<E>(err: HttpClientError<E>) -> TokenExchangeError
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => TokenExchangeError::network(*inner),
		HttpClientError::Http(inner) => TokenExchangeError::Request(inner),
		HttpClientError::Io(inner) => TokenExchangeError::Io(inner),
		HttpClientError::Other(message) => TokenExchangeError::Network { source: message.into() },
		_ => TokenExchangeError::Network { source: "unknown transport failure".into() },
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn body_preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);

	text.chars().take(BODY_PREVIEW_LEN).collect()
}
