//! Process-wide holder for the current bearer credential.
//!
//! Readers load the stored [`Credential`] without taking a lock. Writes replace the whole value
//! and are only issued by the acquisition coordinator's settling path (plus invalidation from the
//! request gateway), so no external locking is needed.

// crates.io
use arc_swap::ArcSwapOption;
// self
use crate::{_prelude::*, credential::Credential};

/// Single-slot credential store shared by the coordinator and the request gateway.
#[derive(Default)]
pub struct TokenStore(ArcSwapOption<Credential>);
impl TokenStore {
	/// Creates a store seeded with `credential`.
	pub fn with_credential(credential: Credential) -> Self {
		Self(ArcSwapOption::from_pointee(credential))
	}

	/// Returns the stored credential if it is present, not invalidated, and not expired.
	pub fn current(&self) -> Option<Credential> {
		self.current_at(OffsetDateTime::now_utc())
	}

	/// Same as [`current`](Self::current) against an explicit instant.
	pub fn current_at(&self, now: OffsetDateTime) -> Option<Credential> {
		self.0
			.load()
			.as_deref()
			.filter(|credential| credential.is_usable_at(now))
			.cloned()
	}

	/// Returns the stored credential regardless of its validity.
	pub fn snapshot(&self) -> Option<Credential> {
		self.0.load_full().map(|credential| (*credential).clone())
	}

	/// Overwrites the stored credential; the new value starts out valid.
	pub fn replace(&self, mut credential: Credential) {
		credential.invalidated_at = None;

		self.0.store(Some(Arc::new(credential)));
	}

	/// Marks the stored credential (if any) as unusable without removing it.
	///
	/// Returns `true` when a credential was present.
	pub fn invalidate(&self) -> bool {
		let now = OffsetDateTime::now_utc();
		let previous = self.0.rcu(|current| {
			current.as_ref().map(|credential| {
				let mut invalidated = (**credential).clone();

				if !invalidated.is_invalidated() {
					invalidated.invalidate(now);
				}

				Arc::new(invalidated)
			})
		});

		previous.is_some()
	}

	/// Invalidates the stored credential only if it still carries the token of `rejected`.
	///
	/// Returns `true` when this call flipped the stored credential to invalidated.
	pub fn invalidate_if_current(&self, rejected: &Credential) -> bool {
		let now = OffsetDateTime::now_utc();
		let previous = self.0.rcu(|current| match current.as_ref() {
			Some(credential) if credential.same_token(rejected) && !credential.is_invalidated() => {
				let mut invalidated = (**credential).clone();

				invalidated.invalidate(now);

				Some(Arc::new(invalidated))
			},
			_ => current.clone(),
		});

		previous
			.as_deref()
			.is_some_and(|credential| credential.same_token(rejected) && !credential.is_invalidated())
	}
}
impl Debug for TokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenStore").field(&self.0.load().as_deref()).finish()
	}
}
