//! OpenID Connect login core for host web applications: resolve exactly one provider, build
//! PKCE-hardened resource descriptors, and run an ordered OAuth 2.0 grant chain per session.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod chain;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod pkce;
pub mod provider;
pub mod session;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{ProviderId, ScopeSet, TokenSecret},
		config::{ExchangeSettings, PropertyBag, ResolvedConfig},
		http::ReqwestHttpClient,
		provider::{GrantType, ResourceDescriptor},
		session::AuthSessionBinder,
	};

	/// Session binder type used by reqwest-backed integration tests.
	pub type ReqwestTestBinder = AuthSessionBinder<ReqwestHttpClient>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Property bag for a PKCE-enabled `google` provider whose endpoints live under `base`.
	pub fn property_fixture(base: &str) -> PropertyBag {
		PropertyBag::new()
			.with("enabled", "google")
			.with("siteUrl", "https://host")
			.with("preEstablishedRedirUri", "/cb")
			.with("disableUsernamePasswordLogin", "false")
			.with("openid.google.clientId", "abc")
			.with("openid.google.clientSecret", "xyz")
			.with("openid.google.accessTokenUri", format!("{base}/token"))
			.with("openid.google.userAuthUri", format!("{base}/auth"))
			.with("openid.google.userInfoUri", format!("{base}/userinfo"))
			.with("openid.google.scopes", "openid,email")
			.with("openid.google.pkceEnabled", "true")
			.with("openid.google.link", "<a href=\"/openid-login?providerId=google\">Google</a>")
	}

	/// Resolved configuration over [`property_fixture`].
	pub fn resolved_config_fixture(base: &str) -> ResolvedConfig {
		ResolvedConfig::new("openid", property_fixture(base))
	}

	/// Descriptor matching [`property_fixture`] for the requested grant.
	pub fn descriptor_fixture(grant: GrantType, base: &str) -> ResourceDescriptor {
		let url = |path: &str| {
			Url::parse(&format!("{base}{path}")).expect("Fixture URL should parse.")
		};

		ResourceDescriptor {
			provider: ProviderId::new("google").expect("Provider fixture should be valid."),
			grant,
			client_id: "abc".into(),
			client_secret: TokenSecret::new("xyz"),
			access_token_uri: url("/token"),
			user_authorization_uri: url("/auth"),
			scope: ScopeSet::new(["openid", "email"]).expect("Scope fixture should be valid."),
			pre_established_redirect_uri: Url::parse("https://host/cb")
				.expect("Redirect fixture should parse."),
			use_current_uri: false,
			pkce_enabled: true,
			user_info_uri: Some(url("/userinfo")),
		}
	}

	/// Short-timeout settings so failing tests do not hang.
	pub fn test_settings() -> ExchangeSettings {
		ExchangeSettings::default().with_timeout(Duration::seconds(5))
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use httpmock as _;
