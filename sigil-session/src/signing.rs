//! HMAC-SHA256 signers
//!
//! [`Signer`] appends a MAC to a value so tampering is detectable. [`TimestampSigner`]
//! additionally embeds the signing time so a signature can be rejected once it is older
//! than a caller-supplied `max_age`.
//!
//! Wire format (all parts URL-safe base64 without padding except `value`):
//!
//! ```text
//! plain:        value.signature
//! timestamped:  value.timestamp.signature
//! ```

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::digest::{Key, KeyInit};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

const SEPARATOR: char = '.';

/// Salt mixed into the derived HMAC key
pub const DEFAULT_SALT: &str = "sigil.signer";

/// Signature verification failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Bad signature: {0}")]
    BadSignature(String),
    #[error("Signature age {age}s exceeds max age {max_age}s")]
    SignatureExpired { age: i64, max_age: i64 },
}

/// Secret key shared by all signers in a process
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(**********)")
    }
}

impl From<&str> for SecretKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&String> for SecretKey {
    fn from(value: &String) -> Self {
        Self(value.clone())
    }
}

/// Source of the current Unix time in seconds
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Settable clock for simulating the passage of time
///
/// Clones share the same underlying instant.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self(Arc::new(AtomicI64::new(start)))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.0.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Signs values without an expiry
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(secret: impl Into<SecretKey>) -> Self {
        Self::with_salt(secret, DEFAULT_SALT)
    }

    /// Signers with different salts never accept each other's signatures.
    pub fn with_salt(secret: impl Into<SecretKey>, salt: &str) -> Self {
        let secret = secret.into();
        let digest = Sha256::new()
            .chain_update(salt.as_bytes())
            .chain_update(b"signer")
            .chain_update(secret.expose().as_bytes())
            .finalize();

        // HMAC zero-pads keys shorter than the block size
        let mut key = Key::<HmacSha256>::default();
        key[..digest.len()].copy_from_slice(&digest);

        Self {
            mac: <HmacSha256 as KeyInit>::new(&key),
        }
    }

    fn signature(&self, value: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(value.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    pub fn sign(&self, value: &str) -> String {
        format!("{}{}{}", value, SEPARATOR, self.signature(value))
    }

    /// Verify `signed` and return the value it carries
    pub fn unsign(&self, signed: &str) -> Result<String, SignatureError> {
        let (value, signature) = signed
            .rsplit_once(SEPARATOR)
            .ok_or_else(|| SignatureError::BadSignature("no separator found".to_string()))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SignatureError::BadSignature("signature is not base64".to_string()))?;

        let mut mac = self.mac.clone();
        mac.update(value.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SignatureError::BadSignature("signature does not match".to_string()))?;

        Ok(value.to_string())
    }
}

/// Signs values together with the time of signing
#[derive(Debug, Clone)]
pub struct TimestampSigner {
    signer: Signer,
    clock: Arc<dyn Clock>,
}

impl TimestampSigner {
    pub fn new(secret: impl Into<SecretKey>) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: impl Into<SecretKey>, clock: Arc<dyn Clock>) -> Self {
        Self {
            signer: Signer::new(secret),
            clock,
        }
    }

    /// Replace the clock, keeping the key
    pub fn using_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current time according to this signer's clock
    pub fn get_timestamp(&self) -> i64 {
        self.clock.now()
    }

    pub fn sign(&self, value: &str) -> String {
        self.sign_at(value, self.get_timestamp())
    }

    /// Sign `value` as if at `timestamp`
    pub fn sign_at(&self, value: &str, timestamp: i64) -> String {
        let timestamp = encode_timestamp(timestamp);
        self.signer.sign(&format!("{}{}{}", value, SEPARATOR, timestamp))
    }

    /// Verify `signed` and reject it when older than `max_age` seconds
    pub fn unsign(&self, signed: &str, max_age: i64) -> Result<String, SignatureError> {
        let value = self.signer.unsign(signed)?;

        let (value, timestamp) = value
            .rsplit_once(SEPARATOR)
            .ok_or_else(|| SignatureError::BadSignature("timestamp missing".to_string()))?;

        let timestamp = decode_timestamp(timestamp)
            .ok_or_else(|| SignatureError::BadSignature("malformed timestamp".to_string()))?;

        let age = self.get_timestamp() - timestamp;
        // A timestamp from the future is as unusable as a stale one
        if age > max_age || age < 0 {
            return Err(SignatureError::SignatureExpired { age, max_age });
        }

        Ok(value.to_string())
    }
}

/// Big-endian bytes with leading zeros stripped
fn encode_timestamp(timestamp: i64) -> String {
    let bytes = timestamp.max(0).to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    URL_SAFE_NO_PAD.encode(&bytes[first..])
}

fn decode_timestamp(encoded: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    if bytes.is_empty() || bytes.len() > 8 {
        return None;
    }
    let mut buf = [0u8; 8];
    buf[8 - bytes.len()..].copy_from_slice(&bytes);
    i64::try_from(u64::from_be_bytes(buf)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: i64 = 1_700_000_000;

    #[test]
    fn test_plain_sign_and_unsign() {
        let signer = Signer::new("secret");
        let signed = signer.sign("hello");

        assert!(signed.starts_with("hello."));
        assert_eq!(signer.unsign(&signed).unwrap(), "hello");
    }

    #[test]
    fn test_plain_rejects_tampering_and_wrong_key() {
        let signer = Signer::new("secret");
        let signed = signer.sign("hello");

        let tampered = signed.replacen("hello", "hellp", 1);
        assert!(matches!(
            signer.unsign(&tampered),
            Err(SignatureError::BadSignature(_))
        ));

        let other = Signer::new("another secret");
        assert!(other.unsign(&signed).is_err());

        let salted = Signer::with_salt("secret", "other.salt");
        assert!(salted.unsign(&signed).is_err());

        assert!(signer.unsign("no-separator").is_err());
        assert!(signer.unsign("value.!!!").is_err());
    }

    #[test]
    fn test_timestamp_round_trip() {
        let clock = ManualClock::new(START);
        let signer = TimestampSigner::with_clock("secret", Arc::new(clock.clone()));

        let signed = signer.sign("payload");
        assert_eq!(signed.matches('.').count(), 2);
        assert_eq!(signer.unsign(&signed, 60).unwrap(), "payload");
        assert_eq!(signer.get_timestamp(), START);
    }

    #[test]
    fn test_timestamp_expiry_boundary() {
        let clock = ManualClock::new(START);
        let signer = TimestampSigner::with_clock("secret", Arc::new(clock.clone()));
        let signed = signer.sign("payload");

        clock.advance(60);
        assert!(signer.unsign(&signed, 60).is_ok());

        clock.advance(1);
        assert_eq!(
            signer.unsign(&signed, 60),
            Err(SignatureError::SignatureExpired {
                age: 61,
                max_age: 60
            })
        );
    }

    #[test]
    fn test_timestamp_from_future_is_expired() {
        let clock = ManualClock::new(START);
        let signer = TimestampSigner::with_clock("secret", Arc::new(clock.clone()));
        let signed = signer.sign("payload");

        clock.set(START - 10);
        assert!(matches!(
            signer.unsign(&signed, 60),
            Err(SignatureError::SignatureExpired { .. })
        ));
    }

    #[test]
    fn test_plain_signature_is_not_a_timestamp_signature() {
        let plain = Signer::new("secret");
        let timed = TimestampSigner::new("secret");

        assert!(matches!(
            timed.unsign(&plain.sign("payload"), 60),
            Err(SignatureError::BadSignature(_))
        ));
    }

    #[test]
    fn test_timestamp_encoding() {
        assert_eq!(decode_timestamp(&encode_timestamp(START)), Some(START));
        assert_eq!(decode_timestamp(&encode_timestamp(0)), Some(0));
        assert_eq!(decode_timestamp(""), None);
        assert_eq!(decode_timestamp("AAAAAAAAAAAA"), None);
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let key = SecretKey::from("hunter2");
        assert!(!format!("{:?}", key).contains("hunter2"));
        assert_eq!(key.expose(), "hunter2");
    }
}
