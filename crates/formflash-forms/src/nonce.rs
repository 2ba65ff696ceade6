//! Anti-forgery tokens bound to an action name.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Default POST key of the token.
pub const DEFAULT_NONCE_NAME: &str = "form-nonce";

/// Default action the token is bound to.
pub const DEFAULT_NONCE_ACTION: &str = "form";

/// Creates and verifies anti-forgery tokens.
pub trait NonceVerifier: Send + Sync {
	fn create(&self, action: &str) -> String;

	fn verify(&self, token: &str, action: &str) -> bool;
}

/// HMAC-SHA256 tokens over the action and a time tick.
///
/// A token stays valid for the tick it was created in and the following
/// one.
///
/// # Examples
///
/// ```
/// use formflash_forms::nonce::{HmacNonce, NonceVerifier};
///
/// let nonce = HmacNonce::new(b"secret", 3600);
/// let token = nonce.create("form");
///
/// assert!(nonce.verify(&token, "form"));
/// assert!(!nonce.verify(&token, "other"));
/// assert!(!nonce.verify("deadbeef", "form"));
/// ```
#[derive(Clone)]
pub struct HmacNonce {
	secret: Vec<u8>,
	lifetime_secs: u64,
}

impl HmacNonce {
	pub fn new(secret: &[u8], lifetime_secs: u64) -> Self {
		Self {
			secret: secret.to_vec(),
			lifetime_secs: lifetime_secs.max(1),
		}
	}

	/// Token for `action` at the Unix time `now`.
	pub fn create_at(&self, action: &str, now: i64) -> String {
		hex::encode(self.compute(action, self.tick(now)))
	}

	/// Verify `token` for `action` at the Unix time `now`.
	pub fn verify_at(&self, token: &str, action: &str, now: i64) -> bool {
		let Ok(provided) = hex::decode(token) else {
			return false;
		};

		let tick = self.tick(now);
		[tick, tick.saturating_sub(1)]
			.iter()
			.any(|&t| bool::from(self.compute(action, t).as_slice().ct_eq(&provided)))
	}

	fn tick(&self, now: i64) -> u64 {
		u64::try_from(now).unwrap_or(0) / self.lifetime_secs
	}

	fn compute(&self, action: &str, tick: u64) -> Vec<u8> {
		let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
			return Vec::new();
		};
		mac.update(action.as_bytes());
		mac.update(b":");
		mac.update(tick.to_string().as_bytes());
		mac.finalize().into_bytes().to_vec()
	}
}

impl std::fmt::Debug for HmacNonce {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HmacNonce")
			.field("lifetime_secs", &self.lifetime_secs)
			.finish_non_exhaustive()
	}
}

impl NonceVerifier for HmacNonce {
	fn create(&self, action: &str) -> String {
		self.create_at(action, Utc::now().timestamp())
	}

	fn verify(&self, token: &str, action: &str) -> bool {
		self.verify_at(token, action, Utc::now().timestamp())
	}
}
