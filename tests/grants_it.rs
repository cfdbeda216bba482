// std
use std::time::Duration as StdDuration;
// crates.io
use httpmock::prelude::*;
// self
use openid_auth::{
	_preludet::*,
	chain::{TokenProviderChain, TokenRequest},
	error::TokenExchangeError,
	http::ReqwestHttpClient,
	provider::GrantType,
};

fn chain() -> TokenProviderChain<ReqwestHttpClient> {
	TokenProviderChain::new(Arc::new(test_reqwest_http_client()), &test_settings())
}

#[tokio::test]
async fn client_credentials_exchange_uses_descriptor_scopes() {
	let server = MockServer::start_async().await;
	let descriptor = descriptor_fixture(GrantType::ClientCredentials, &server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.body_includes("grant_type=client_credentials")
				.body_includes("scope=email+openid");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"app-token\",\"token_type\":\"bearer\",\"expires_in\":600,\"scope\":\"email openid\"}",
			);
		})
		.await;
	let token = chain()
		.acquire_token(&descriptor, None, &TokenRequest::default())
		.await
		.expect("Client credentials exchange should succeed.");

	mock.assert_async().await;

	assert_eq!(token.bearer(), "app-token");
	assert_eq!(token.grant, GrantType::ClientCredentials);
	assert_eq!(token.scope.normalized(), "email openid");
}

#[tokio::test]
async fn password_exchange_requires_credentials() {
	let server = MockServer::start_async().await;
	let descriptor = descriptor_fixture(GrantType::Password, &server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.body_includes("grant_type=password")
				.body_includes("username=jane");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"user-token\",\"token_type\":\"bearer\"}");
		})
		.await;
	let err = chain()
		.acquire_token(&descriptor, None, &TokenRequest::default())
		.await
		.expect_err("Password grants need credentials.");

	assert!(matches!(err, Error::CredentialsRequired));

	let token = chain()
		.acquire_token(
			&descriptor,
			None,
			&TokenRequest::default().with_credentials("jane", "correct horse"),
		)
		.await
		.expect("Password exchange should succeed.");

	mock.assert_async().await;

	assert_eq!(token.bearer(), "user-token");
	assert!(token.expires_at.is_none());
}

#[tokio::test]
async fn server_errors_without_oauth_payload_keep_status() {
	let server = MockServer::start_async().await;
	let descriptor = descriptor_fixture(GrantType::ClientCredentials, &server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(503).header("content-type", "text/plain").body("maintenance");
		})
		.await;
	let err = chain()
		.acquire_token(&descriptor, None, &TokenRequest::default())
		.await
		.expect_err("5xx responses must fail.");

	mock.assert_async().await;

	let Error::TokenExchangeFailed(inner) = err else {
		panic!("Unexpected error: {err:?}.");
	};

	assert_eq!(inner.status(), Some(503));
}

#[tokio::test]
async fn oversized_token_lifetimes_are_malformed() {
	let server = MockServer::start_async().await;
	let descriptor = descriptor_fixture(GrantType::ClientCredentials, &server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"t\",\"token_type\":\"bearer\",\"expires_in\":9223372036854775807}",
			);
		})
		.await;
	let err = chain()
		.acquire_token(&descriptor, None, &TokenRequest::default())
		.await
		.expect_err("Lifetimes past the timestamp range must fail.");

	mock.assert_async().await;

	assert!(matches!(
		err,
		Error::TokenExchangeFailed(TokenExchangeError::MalformedToken { .. })
	));
}

#[tokio::test]
async fn slow_token_endpoints_time_out() {
	let server = MockServer::start_async().await;
	let descriptor = descriptor_fixture(GrantType::ClientCredentials, &server.base_url());
	let settings = test_settings().with_timeout(Duration::milliseconds(200));
	let chain = TokenProviderChain::new(Arc::new(test_reqwest_http_client()), &settings);
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.delay(StdDuration::from_secs(3))
				.header("content-type", "application/json")
				.body("{\"access_token\":\"late\",\"token_type\":\"bearer\"}");
		})
		.await;
	let err = chain
		.acquire_token(&descriptor, None, &TokenRequest::default())
		.await
		.expect_err("Slow exchanges must time out.");

	assert!(matches!(err, Error::TokenExchangeFailed(TokenExchangeError::Timeout { .. })));
}

#[tokio::test]
async fn implicit_grant_reads_the_fragment() {
	let descriptor = descriptor_fixture(GrantType::Implicit, "https://x");
	let err = chain()
		.acquire_token(&descriptor, None, &TokenRequest::default().with_state("s-1"))
		.await
		.expect_err("Implicit grants start with a redirect.");
	let Error::UserRedirectRequired { authorization_url } = err else {
		panic!("Unexpected error: {err:?}.");
	};
	let pairs: HashMap<_, _> = authorization_url.query_pairs().into_owned().collect();

	assert_eq!(pairs.get("response_type"), Some(&"token".into()));

	let token = chain()
		.acquire_token(
			&descriptor,
			None,
			&TokenRequest::default()
				.with_state("s-1")
				.with_fragment("#access_token=frag-token&token_type=bearer&state=s-1"),
		)
		.await
		.expect("Fragments should yield tokens.");

	assert_eq!(token.bearer(), "frag-token");
}
