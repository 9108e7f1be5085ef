//! Bearer credential values, lifecycle helpers, and the redacting secret wrapper.

// crates.io
use reqwest::header::HeaderValue;
// self
use crate::_prelude::*;

/// Redacted secret wrapper keeping tokens and API keys out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);
impl Secret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` if the secret is empty or whitespace only.
	pub fn is_blank(&self) -> bool {
		self.0.trim().is_empty()
	}
}
impl AsRef<str> for Secret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Secret").field(&"<redacted>").finish()
	}
}
impl Display for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Current lifecycle status for a credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// Credential may be attached to requests.
	Active,
	/// Credential passed the expiry reported by the token endpoint.
	Expired,
	/// A business endpoint rejected the credential.
	Invalidated,
}

/// Bearer credential issued by the token endpoint.
///
/// Credentials are replaced wholesale; the only in-place change is the invalidation stamp
/// applied when a business endpoint rejects the token.
#[derive(Clone)]
pub struct Credential {
	/// Bearer token value.
	pub token: Secret,
	/// Instant the credential was issued, when known.
	pub issued_at: Option<OffsetDateTime>,
	/// Expiry instant derived from the endpoint's `expires_in`, when reported.
	pub expires_at: Option<OffsetDateTime>,
	/// Instant the credential was marked unusable.
	pub invalidated_at: Option<OffsetDateTime>,
}
impl Credential {
	/// Creates an active credential with no lifetime metadata.
	pub fn new(token: impl Into<String>) -> Self {
		Self { token: Secret::new(token), issued_at: None, expires_at: None, invalidated_at: None }
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Convenience helper that stamps `issued_at` with the current clock.
	pub fn issued_now(self) -> Self {
		self.issued_at(OffsetDateTime::now_utc())
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry from `issued_at` (or from now when no issue instant is known).
	///
	/// Expiries beyond the representable range saturate; use
	/// [`checked_expires_in`](Self::checked_expires_in) to detect that case.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		let base = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);

		self.expires_at = Some(base.saturating_add(duration));

		self
	}

	/// Same as [`expires_in`](Self::expires_in) but returns `None` when the expiry overflows.
	pub fn checked_expires_in(mut self, duration: Duration) -> Option<Self> {
		let base = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);

		self.expires_at = Some(base.checked_add(duration)?);

		Some(self)
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> CredentialStatus {
		if self.invalidated_at.is_some() {
			return CredentialStatus::Invalidated;
		}
		if self.expires_at.is_some_and(|expiry| instant >= expiry) {
			return CredentialStatus::Expired;
		}

		CredentialStatus::Active
	}

	/// Checks the status using the current UTC instant.
	pub fn status(&self) -> CredentialStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the credential is active at the provided instant.
	pub fn is_usable_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), CredentialStatus::Active)
	}

	/// Returns `true` if the credential has been invalidated.
	pub fn is_invalidated(&self) -> bool {
		self.invalidated_at.is_some()
	}

	/// Marks the credential as unusable.
	pub fn invalidate(&mut self, instant: OffsetDateTime) {
		self.invalidated_at = Some(instant);
	}

	/// Returns `true` when both credentials carry the same token value.
	pub fn same_token(&self, other: &Credential) -> bool {
		self.token == other.token
	}

	/// Renders the `Authorization: Bearer <token>` header value, flagged as sensitive.
	pub fn authorization_header(&self) -> Option<HeaderValue> {
		let mut value = HeaderValue::from_str(&format!("Bearer {}", self.token.expose())).ok()?;

		value.set_sensitive(true);

		Some(value)
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("invalidated_at", &self.invalidated_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = Secret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "Secret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert!(!secret.is_blank());
		assert!(Secret::new("  ").is_blank());
	}

	#[test]
	fn status_transitions_cover_all_states() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let mut credential =
			Credential::new("abc123").issued_at(issued).expires_in(Duration::hours(1));

		assert_eq!(credential.expires_at, Some(macros::datetime!(2025-01-01 01:00 UTC)));
		assert_eq!(
			credential.status_at(macros::datetime!(2025-01-01 00:30 UTC)),
			CredentialStatus::Active
		);
		assert_eq!(
			credential.status_at(macros::datetime!(2025-01-01 01:00 UTC)),
			CredentialStatus::Expired
		);

		credential.invalidate(macros::datetime!(2025-01-01 00:10 UTC));

		assert_eq!(
			credential.status_at(macros::datetime!(2025-01-01 00:30 UTC)),
			CredentialStatus::Invalidated
		);
	}

	#[test]
	fn oversized_lifetimes_saturate_or_report_overflow() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let huge = Duration::seconds(999_999_999_999);
		let saturated = Credential::new("abc123").issued_at(issued).expires_in(huge);

		assert!(saturated.expires_at.is_some_and(|expiry| expiry > issued));
		assert!(Credential::new("abc123").issued_at(issued).checked_expires_in(huge).is_none());
		assert_eq!(
			Credential::new("abc123")
				.issued_at(issued)
				.checked_expires_in(Duration::minutes(5))
				.and_then(|credential| credential.expires_at),
			Some(macros::datetime!(2025-01-01 00:05 UTC))
		);
	}

	#[test]
	fn credential_without_expiry_stays_active() {
		let credential = Credential::new("abc123");

		assert!(credential.is_usable_at(macros::datetime!(2100-01-01 00:00 UTC)));
		assert!(!credential.is_invalidated());
	}

	#[test]
	fn authorization_header_is_bearer_and_sensitive() {
		let header = Credential::new("abc123")
			.authorization_header()
			.expect("Plain ASCII token should render as a header.");

		assert_eq!(header.to_str().expect("Header should be visible ASCII."), "Bearer abc123");
		assert!(header.is_sensitive());
		assert!(Credential::new("line\nbreak").authorization_header().is_none());
	}

	#[test]
	fn debug_output_redacts_token() {
		let rendered = format!("{:?}", Credential::new("abc123"));

		assert!(!rendered.contains("abc123"));
		assert!(rendered.contains("<redacted>"));
	}
}
