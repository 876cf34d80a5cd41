//! Stateless `payload.signature` tokens.
//!
//! The admin cookie and both passkey ceremonies carry server state as a
//! base64url-encoded JSON payload followed by an HMAC-SHA256 signature over
//! the encoded payload. Verification recomputes the MAC and compares it in
//! constant time; nothing is stored server-side.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;

use crate::config::MIN_SECRET_LENGTH;
use crate::error::{AuthError, AuthResult};

type HmacSha256 = Hmac<Sha256>;

/// Seals and opens signed tokens with a single HMAC key.
#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
}

impl TokenSigner {
    /// Create a signer. The key must be at least 32 bytes.
    pub fn new(secret: &str) -> AuthResult<Self> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(AuthError::config(format!(
                "signing secret must be at least {} bytes, got {}",
                MIN_SECRET_LENGTH,
                secret.len()
            )));
        }
        Ok(Self {
            key: secret.as_bytes().to_vec(),
        })
    }

    fn mac(&self) -> HmacSha256 {
        // Hmac::new_from_slice only fails on invalid key lengths, and
        // HMAC-SHA256 accepts any length.
        HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length")
    }

    /// Serialize `claims`, base64url-encode, and append the signature:
    /// `payload.signature`.
    pub fn seal<T: Serialize>(&self, claims: &T) -> AuthResult<String> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{}.{}", payload, signature))
    }

    /// Verify and decode a sealed token.
    ///
    /// Returns `None` for any malformed split, bad signature, bad decode,
    /// or claims that do not deserialize. The caller decides which named
    /// error (or nullable outcome) a rejection maps to.
    pub fn open<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        let (payload, signature) = token.split_once('.')?;
        if payload.is_empty() || signature.contains('.') {
            return None;
        }

        let provided = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        // Mac::verify_slice is a constant-time comparison.
        mac.verify_slice(&provided).ok()?;

        let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenSigner")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Claims {
        sub: String,
        n: u64,
    }

    fn signer() -> TokenSigner {
        TokenSigner::new("0123456789012345678901234567890X").unwrap()
    }

    #[test]
    fn rejects_short_keys() {
        assert!(TokenSigner::new("short").is_err());
    }

    #[test]
    fn seal_open_round_trip() {
        let claims = Claims {
            sub: "user-1".into(),
            n: 7,
        };
        let token = signer().seal(&claims).unwrap();
        assert_eq!(signer().open::<Claims>(&token), Some(claims));
    }

    #[test]
    fn flipping_any_signature_byte_fails() {
        let token = signer()
            .seal(&Claims {
                sub: "user-1".into(),
                n: 7,
            })
            .unwrap();
        let dot = token.find('.').unwrap();
        for i in dot + 1..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert_eq!(signer().open::<Claims>(&tampered), None, "byte {}", i);
        }
    }

    #[test]
    fn flipping_any_payload_byte_fails() {
        let token = signer()
            .seal(&Claims {
                sub: "user-1".into(),
                n: 7,
            })
            .unwrap();
        let dot = token.find('.').unwrap();
        for i in 0..dot {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert_eq!(signer().open::<Claims>(&tampered), None, "byte {}", i);
        }
    }

    #[test]
    fn rejects_malformed_tokens() {
        let s = signer();
        assert_eq!(s.open::<Claims>(""), None);
        assert_eq!(s.open::<Claims>("no-dot"), None);
        assert_eq!(s.open::<Claims>(".sig-only"), None);
        assert_eq!(s.open::<Claims>("a.b.c"), None);
    }

    #[test]
    fn tokens_from_a_different_key_fail() {
        let other = TokenSigner::new("X0123456789012345678901234567890").unwrap();
        let token = other
            .seal(&Claims {
                sub: "user-1".into(),
                n: 7,
            })
            .unwrap();
        assert_eq!(signer().open::<Claims>(&token), None);
    }
}
