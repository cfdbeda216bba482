//! PKCE (RFC 7636) verifier generation, S256 challenge derivation, and the per-session
//! single-use verifier lifecycle.

mod store;

pub use store::PkceStore;

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{SessionId, TokenSecret},
	config::{ExchangeSettings, ResolvedConfig, parse_flag},
	obs::log_event,
};

/// RFC 7636 lower bound for code verifier length.
pub const MIN_VERIFIER_LEN: usize = 43;
/// RFC 7636 upper bound for code verifier length.
pub const MAX_VERIFIER_LEN: usize = 128;

/// Unreserved URI characters allowed in a code verifier.
const UNRESERVED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Supported PKCE challenge methods. `plain` is deliberately absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Code verifier plus its derived challenge.
///
/// Not `Clone`: a challenge moves from generation into the session store and out again into
/// exactly one exchange.
pub struct PkceChallenge {
	verifier: TokenSecret,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkceChallenge {
	/// Generates a fresh verifier of `len` characters (clamped to 43..=128).
	pub fn generate(len: usize) -> Self {
		let len = len.clamp(MIN_VERIFIER_LEN, MAX_VERIFIER_LEN);
		let mut rng = rand::rng();
		let verifier = (0..len)
			.map(|_| char::from(UNRESERVED[rng.random_range(0..UNRESERVED.len())]))
			.collect::<String>();

		Self::from_verifier(verifier)
	}

	/// Rebuilds a challenge from an existing verifier.
	pub fn from_verifier(verifier: impl Into<String>) -> Self {
		let verifier = verifier.into();
		let challenge = derive_challenge(&verifier);

		let method = PkceCodeChallengeMethod::S256;

		Self { verifier: TokenSecret::new(verifier), challenge, method }
	}

	/// Secret verifier sent with the token request. Never log it.
	pub fn verifier(&self) -> &str {
		self.verifier.expose()
	}

	/// Challenge sent with the authorization request.
	pub fn challenge(&self) -> &str {
		&self.challenge
	}

	/// Challenge method (always `S256`).
	pub fn method(&self) -> PkceCodeChallengeMethod {
		self.method
	}

	/// Public half of the challenge for the authorization request.
	pub fn params(&self) -> PkceParams {
		PkceParams { challenge: self.challenge.clone(), method: self.method }
	}

	/// Returns `true` when `verifier` derives to this challenge.
	pub fn matches(&self, verifier: &str) -> bool {
		derive_challenge(verifier) == self.challenge
	}
}
impl Debug for PkceChallenge {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkceChallenge")
			.field("verifier", &"<redacted>")
			.field("challenge", &self.challenge)
			.field("method", &self.method)
			.finish()
	}
}

/// Public half of a challenge, safe to embed in an authorization URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PkceParams {
	/// Derived code challenge.
	pub challenge: String,
	/// Challenge method.
	pub method: PkceCodeChallengeMethod,
}

/// Base64url (no padding) SHA-256 digest of `verifier`.
pub fn derive_challenge(verifier: &str) -> String {
	let digest = Sha256::digest(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(digest)
}

/// Returns `true` when `verifier` has an RFC 7636 length and alphabet.
pub fn is_valid_verifier(verifier: &str) -> bool {
	(MIN_VERIFIER_LEN..=MAX_VERIFIER_LEN).contains(&verifier.len())
		&& verifier.bytes().all(|b| UNRESERVED.contains(&b))
}

/// Decides per provider whether PKCE applies and owns the verifier lifecycle.
#[derive(Debug)]
pub struct PkceNegotiator {
	config: Arc<ResolvedConfig>,
	store: PkceStore,
	verifier_len: usize,
}
impl PkceNegotiator {
	/// Creates a negotiator over the resolved configuration.
	pub fn new(config: Arc<ResolvedConfig>, settings: &ExchangeSettings) -> Self {
		let store = PkceStore::new(settings.pkce_ttl);

		Self { config, store, verifier_len: settings.verifier_len }
	}

	/// Reads `openid.<provider>.pkceEnabled`; absent or malformed values mean `false`.
	pub fn is_required(&self, provider: &str) -> bool {
		let raw = self.config.property(provider, "pkceEnabled");
		let required = parse_flag(raw);

		log_event!(debug, "PKCE flag for `{provider}`: {:?} ({required}).", raw.map(str::trim));

		required
	}

	/// Generates a challenge without storing it.
	pub fn generate(&self) -> PkceChallenge {
		PkceChallenge::generate(self.verifier_len)
	}

	/// Generates a challenge, stores it against `session`, and returns its public half.
	///
	/// Any pending challenge for the session is replaced.
	pub fn issue(&self, session: &SessionId) -> PkceParams {
		let challenge = self.generate();
		let params = challenge.params();

		self.store.insert(session.clone(), challenge);

		params
	}

	/// Consumes the pending challenge for `session` for use in one exchange.
	pub fn consume(&self, session: &SessionId) -> Result<PkceChallenge> {
		self.store.take(session)
	}

	/// Checks `verifier` against the pending challenge, consuming it on a match.
	///
	/// Returns `Ok(false)` on mismatch and [`Error::PkceReplay`] when the verifier was
	/// already consumed.
	pub fn verify(&self, session: &SessionId, verifier: &str) -> Result<bool> {
		self.store.verify(session, verifier)
	}

	/// Drops every PKCE record for `session`.
	pub fn discard(&self, session: &SessionId) {
		self.store.discard(session);
	}

	/// Drops expired challenges and replay markers, plus the sessions left without either.
	///
	/// Issuing a challenge sweeps as well; hosts with bursty logins may also call this from a
	/// periodic session-expiry hook.
	pub fn purge_expired(&self) {
		self.store.purge_expired();
	}

	/// Lifetime of an issued challenge.
	pub fn ttl(&self) -> Duration {
		self.store.ttl()
	}

	/// Number of sessions holding PKCE state.
	pub fn tracked_sessions(&self) -> usize {
		self.store.len()
	}
}
