//! Session binding: which provider a login transaction targets, and the provider-scoped REST
//! client that serves it.
//!
//! The binder keeps one entry per interactive session. A new login request overwrites the bound
//! provider; invalidating the session cancels in-flight exchanges, discards PKCE state, and drops
//! the cached client.

pub mod client;

pub use client::*;

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::SessionId,
	chain::TokenProviderChain,
	config::{ExchangeSettings, ResolvedConfig},
	http::TokenHttpClient,
	obs::log_event,
	pkce::PkceNegotiator,
	provider::ResourceDescriptorBuilder,
};

/// Request parameter and session attribute carrying the provider alias.
pub const PROVIDER_ID_PARAM: &str = "providerId";

struct SessionEntry<C>
where
	C: ?Sized + TokenHttpClient,
{
	provider: Option<String>,
	client: Option<Arc<ProviderRestClient<C>>>,
	cancel: CancellationToken,
}
impl<C> Default for SessionEntry<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn default() -> Self {
		Self { provider: None, client: None, cancel: CancellationToken::new() }
	}
}

/// Binds provider aliases to sessions and hands out session-scoped REST clients.
pub struct AuthSessionBinder<C>
where
	C: ?Sized + TokenHttpClient,
{
	descriptors: ResourceDescriptorBuilder,
	pkce: Arc<PkceNegotiator>,
	chain: Arc<TokenProviderChain<C>>,
	sessions: RwLock<HashMap<SessionId, SessionEntry<C>>>,
}
impl<C> AuthSessionBinder<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Wires the PKCE negotiator, descriptor builder, and grant chain over `config`.
	pub fn new(
		config: Arc<ResolvedConfig>,
		http_client: Arc<C>,
		settings: &ExchangeSettings,
	) -> Self {
		let pkce = Arc::new(PkceNegotiator::new(config.clone(), settings));
		let descriptors = ResourceDescriptorBuilder::new(config, pkce.clone());
		let chain = Arc::new(TokenProviderChain::new(http_client, settings));

		Self { descriptors, pkce, chain, sessions: RwLock::new(HashMap::new()) }
	}

	/// Descriptor builder shared by every session.
	pub fn descriptors(&self) -> &ResourceDescriptorBuilder {
		&self.descriptors
	}

	/// PKCE negotiator shared by every session.
	pub fn pkce(&self) -> &Arc<PkceNegotiator> {
		&self.pkce
	}

	/// Grant chain shared by every session.
	pub fn chain(&self) -> &Arc<TokenProviderChain<C>> {
		&self.chain
	}

	/// Records `provider` as the session's login target, replacing any earlier value.
	///
	/// The alias is stored as given; [`ResourceDescriptorBuilder::build`] re-validates it.
	pub fn bind_provider(&self, session: &SessionId, provider: impl Into<String>) {
		self.set_provider(session, Some(provider.into()));
	}

	/// Provider alias currently bound to the session.
	pub fn current_provider(&self, session: &SessionId) -> Option<String> {
		self.sessions.read().get(session).and_then(|entry| entry.provider.clone())
	}

	/// Copies the `providerId` request parameter into the session verbatim.
	///
	/// A request without the parameter clears the binding.
	pub fn handle_login_request<I, K, V>(&self, session: &SessionId, params: I) -> Option<String>
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: Into<String>,
	{
		let provider = params
			.into_iter()
			.find(|(key, _)| key.as_ref() == PROVIDER_ID_PARAM)
			.map(|(_, value)| value.into());

		log_event!(debug, "Provider id is: {provider:?}.");
		self.set_provider(session, provider.clone());

		provider
	}

	/// Session-scoped REST client for the bound provider.
	///
	/// The same instance is returned until the bound provider changes or the session is
	/// invalidated.
	pub fn rest_client(&self, session: &SessionId) -> Result<Arc<ProviderRestClient<C>>> {
		let cached = self.sessions.read().get(session).and_then(|entry| entry.client.clone());

		if let Some(client) = cached {
			return Ok(client);
		}

		let mut sessions = self.sessions.write();
		let entry = sessions.entry(session.clone()).or_default();

		if let Some(client) = &entry.client {
			return Ok(client.clone());
		}

		let provider = entry.provider.as_deref().ok_or(Error::ProviderNotBound)?;
		let descriptor = self.descriptors.build(provider)?;
		let client = Arc::new(ProviderRestClient::new(
			session.clone(),
			descriptor,
			self.chain.clone(),
			self.pkce.clone(),
			entry.cancel.child_token(),
		));

		entry.client = Some(client.clone());

		Ok(client)
	}

	/// Tears the session down: cancels in-flight exchanges, discards PKCE state, and drops the
	/// cached client and provider binding.
	pub fn invalidate(&self, session: &SessionId) {
		if let Some(entry) = self.sessions.write().remove(session) {
			entry.cancel.cancel();
		}

		self.pkce.discard(session);
	}

	/// Drops PKCE challenges and replay markers that outlived the configured TTL.
	pub fn purge_expired(&self) {
		self.pkce.purge_expired();
	}

	fn set_provider(&self, session: &SessionId, provider: Option<String>) {
		let mut sessions = self.sessions.write();
		let entry = sessions.entry(session.clone()).or_default();

		if entry.provider != provider {
			entry.client = None;
		}

		entry.provider = provider;
	}
}
impl<C> Debug for AuthSessionBinder<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthSessionBinder")
			.field("chain", &self.chain)
			.field("sessions", &self.sessions.read().len())
			.finish()
	}
}
