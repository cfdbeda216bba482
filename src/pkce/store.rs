//! Per-session PKCE storage with consume-once semantics.

// self
use crate::{
	_prelude::*,
	auth::SessionId,
	pkce::{PkceChallenge, derive_challenge},
};

struct Pending {
	challenge: PkceChallenge,
	issued_at: OffsetDateTime,
}

#[derive(Default)]
struct SessionPkce {
	pending: Option<Pending>,
	// Challenges (not verifiers) consumed in this session, keyed to the consume instant.
	consumed: HashMap<String, OffsetDateTime>,
}
impl SessionPkce {
	fn expire(&mut self, ttl: Duration, now: OffsetDateTime) {
		if self.pending.as_ref().is_some_and(|pending| now - pending.issued_at >= ttl) {
			self.pending = None;
		}

		self.consumed.retain(|_, consumed_at| now - *consumed_at < ttl);
	}

	fn is_idle(&self) -> bool {
		self.pending.is_none() && self.consumed.is_empty()
	}
}

/// Thread-safe map from session to its pending and consumed PKCE challenges.
///
/// Every read-modify-write happens under one lock, so two requests racing on the same session
/// cannot both take the same verifier. Pending challenges and consumed markers both live for
/// one TTL; each insert sweeps expired records across all sessions.
pub struct PkceStore {
	sessions: Mutex<HashMap<SessionId, SessionPkce>>,
	ttl: Duration,
}
impl PkceStore {
	/// Creates an empty store whose pending challenges expire after `ttl`.
	pub fn new(ttl: Duration) -> Self {
		Self { sessions: Mutex::new(HashMap::new()), ttl }
	}

	/// Stores `challenge` as the session's pending challenge, replacing any previous one.
	pub fn insert(&self, session: SessionId, challenge: PkceChallenge) {
		self.insert_at(session, challenge, OffsetDateTime::now_utc());
	}

	pub(crate) fn insert_at(
		&self,
		session: SessionId,
		challenge: PkceChallenge,
		now: OffsetDateTime,
	) {
		let mut sessions = self.sessions.lock();

		self.sweep(&mut sessions, now);

		sessions.entry(session).or_default().pending = Some(Pending { challenge, issued_at: now });
	}

	/// Removes and returns the pending challenge.
	///
	/// Fails with [`Error::PkceReplay`] when the session already consumed its challenge and
	/// nothing new was issued, and with [`Error::PkceRequired`] when nothing was ever issued or
	/// the pending challenge expired.
	pub fn take(&self, session: &SessionId) -> Result<PkceChallenge> {
		self.take_at(session, OffsetDateTime::now_utc())
	}

	pub(crate) fn take_at(
		&self,
		session: &SessionId,
		now: OffsetDateTime,
	) -> Result<PkceChallenge> {
		let mut sessions = self.sessions.lock();
		let Some(entry) = sessions.get_mut(session) else {
			return Err(Error::PkceRequired);
		};

		entry.expire(self.ttl, now);

		match entry.pending.take() {
			Some(pending) => {
				entry.consumed.insert(pending.challenge.challenge().to_owned(), now);

				Ok(pending.challenge)
			},
			None if entry.consumed.is_empty() => Err(Error::PkceRequired),
			None => Err(Error::PkceReplay),
		}
	}

	/// Checks `verifier` against the pending challenge, consuming it on a match.
	pub fn verify(&self, session: &SessionId, verifier: &str) -> Result<bool> {
		self.verify_at(session, verifier, OffsetDateTime::now_utc())
	}

	pub(crate) fn verify_at(
		&self,
		session: &SessionId,
		verifier: &str,
		now: OffsetDateTime,
	) -> Result<bool> {
		let derived = derive_challenge(verifier);
		let mut sessions = self.sessions.lock();
		let Some(entry) = sessions.get_mut(session) else {
			return Ok(false);
		};

		entry.expire(self.ttl, now);

		if entry.consumed.contains_key(&derived) {
			return Err(Error::PkceReplay);
		}

		let matched =
			entry.pending.as_ref().is_some_and(|pending| pending.challenge.challenge() == derived);

		if matched {
			entry.pending = None;
			entry.consumed.insert(derived, now);
		}

		Ok(matched)
	}

	/// Drops every record for `session`, e.g. when the host invalidates it.
	pub fn discard(&self, session: &SessionId) {
		self.sessions.lock().remove(session);
	}

	/// Drops pending challenges and consumed markers older than the TTL, then every session
	/// left with neither.
	pub fn purge_expired(&self) {
		self.purge_expired_at(OffsetDateTime::now_utc());
	}

	pub(crate) fn purge_expired_at(&self, now: OffsetDateTime) {
		self.sweep(&mut self.sessions.lock(), now);
	}

	/// Lifetime of pending challenges and consumed markers.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Number of sessions holding any PKCE record.
	pub fn len(&self) -> usize {
		self.sessions.lock().len()
	}

	/// Returns `true` when no session holds a PKCE record.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn sweep(&self, sessions: &mut HashMap<SessionId, SessionPkce>, now: OffsetDateTime) {
		sessions.retain(|_, entry| {
			entry.expire(self.ttl, now);

			!entry.is_idle()
		});
	}

	#[cfg(test)]
	pub(crate) fn peek_verifier(&self, session: &SessionId) -> Option<String> {
		self.sessions
			.lock()
			.get(session)
			.and_then(|entry| entry.pending.as_ref())
			.map(|pending| pending.challenge.verifier().to_owned())
	}
}
impl Debug for PkceStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkceStore")
			.field("sessions", &self.sessions.lock().len())
			.field("ttl", &self.ttl)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn session(id: &str) -> SessionId {
		SessionId::new(id).expect("Session fixture should be valid.")
	}

	#[test]
	fn take_without_issue_requires_pkce() {
		let store = PkceStore::new(Duration::minutes(5));

		assert!(matches!(store.take(&session("none")), Err(Error::PkceRequired)));
	}

	#[test]
	fn expired_challenges_are_not_handed_out() {
		let store = PkceStore::new(Duration::minutes(5));
		let issued = OffsetDateTime::now_utc() - Duration::minutes(6);

		store.insert_at(session("old"), PkceChallenge::generate(64), issued);

		assert!(matches!(
			store.take_at(&session("old"), OffsetDateTime::now_utc()),
			Err(Error::PkceRequired)
		));
	}

	#[test]
	fn reissue_replaces_pending_challenge() {
		let store = PkceStore::new(Duration::minutes(5));
		let first = PkceChallenge::generate(64);
		let second = PkceChallenge::generate(64);
		let second_challenge = second.challenge().to_owned();

		store.insert(session("s"), first);
		store.insert(session("s"), second);

		let taken = store.take(&session("s")).expect("Latest challenge should be pending.");

		assert_eq!(taken.challenge(), second_challenge);
		assert!(matches!(store.take(&session("s")), Err(Error::PkceReplay)));
	}

	#[test]
	fn consumed_verifier_cannot_be_verified_again() {
		let store = PkceStore::new(Duration::minutes(5));

		store.insert(session("v"), PkceChallenge::from_verifier("a".repeat(43)));

		assert!(store.verify(&session("v"), &"a".repeat(43)).expect("First verify should pass."));
		assert!(matches!(store.verify(&session("v"), &"a".repeat(43)), Err(Error::PkceReplay)));
	}

	#[test]
	fn concurrent_takes_hand_out_one_challenge() {
		let store = Arc::new(PkceStore::new(Duration::minutes(5)));

		store.insert(session("race"), PkceChallenge::generate(64));

		let handles = (0..8)
			.map(|_| {
				let store = store.clone();

				std::thread::spawn(move || store.take(&session("race")).is_ok())
			})
			.collect::<Vec<_>>();
		let successes = handles
			.into_iter()
			.map(|handle| handle.join().expect("Taker thread should not panic."))
			.filter(|ok| *ok)
			.count();

		assert_eq!(successes, 1);
	}

	#[test]
	fn discard_and_purge_drop_records() {
		let store = PkceStore::new(Duration::minutes(5));

		store.insert(session("gone"), PkceChallenge::generate(64));
		store.discard(&session("gone"));

		assert!(matches!(store.take(&session("gone")), Err(Error::PkceRequired)));

		store.insert_at(
			session("stale"),
			PkceChallenge::generate(64),
			OffsetDateTime::now_utc() - Duration::hours(1),
		);
		store.purge_expired();

		assert!(store.peek_verifier(&session("stale")).is_none());
		assert!(store.is_empty());
	}

	#[test]
	fn completed_sessions_are_dropped_once_idle_past_the_ttl() {
		let store = PkceStore::new(Duration::minutes(5));
		let start = OffsetDateTime::now_utc();

		store.insert_at(session("done"), PkceChallenge::generate(64), start);
		store.take_at(&session("done"), start).expect("Fresh challenge should be taken.");

		assert!(matches!(
			store.take_at(&session("done"), start + Duration::minutes(1)),
			Err(Error::PkceReplay)
		));

		store.purge_expired_at(start + Duration::minutes(4));

		assert_eq!(store.len(), 1, "Consumed markers outlive the login until the TTL.");

		store.insert_at(session("other"), PkceChallenge::generate(64), start + Duration::minutes(6));

		assert_eq!(store.len(), 1, "Inserts sweep idle sessions.");
		assert!(matches!(
			store.take_at(&session("done"), start + Duration::minutes(6)),
			Err(Error::PkceRequired)
		));
	}
}
