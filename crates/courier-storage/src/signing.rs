//! Signed read tokens for objects served by this service.
//!
//! Payload: expiry_ts (u64 BE). MAC: HMAC-SHA256(secret, expiry_ts || key).
//! Token = base64url(expiry_ts || MAC) = 40 bytes before encoding.
//!
//! The key is bound by the MAC but not carried in the token, so a token only
//! verifies against the key it was issued for.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const EXPIRY_LEN: usize = 8;
const MAC_LEN: usize = 32; // SHA256
const TOKEN_LEN: usize = EXPIRY_LEN + MAC_LEN;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid file token")]
    Malformed,

    #[error("Invalid file token")]
    BadSignature,

    #[error("File link has expired")]
    Expired,
}

/// Issues and verifies read tokens bound to a single storage key.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Token for `key` that expires `expires_in` from now.
    pub fn sign(&self, key: &str, expires_in: Duration) -> String {
        let expiry_ts = SystemTime::now()
            .checked_add(expires_in)
            .unwrap_or(UNIX_EPOCH)
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.sign_until(key, expiry_ts)
    }

    /// Token for `key` that expires at the given unix timestamp.
    pub fn sign_until(&self, key: &str, expiry_ts: u64) -> String {
        let expiry = expiry_ts.to_be_bytes();
        let tag = self.mac(&expiry, key).finalize().into_bytes();

        let mut token_bytes = [0u8; TOKEN_LEN];
        token_bytes[..EXPIRY_LEN].copy_from_slice(&expiry);
        token_bytes[EXPIRY_LEN..].copy_from_slice(&tag);

        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
    }

    /// Verify a token for `key`; returns its expiry timestamp.
    pub fn verify(&self, key: &str, token: &str) -> Result<u64, TokenError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.verify_at(key, token, now)
    }

    pub fn verify_at(&self, key: &str, token: &str, now_ts: u64) -> Result<u64, TokenError> {
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| TokenError::Malformed)?;
        if decoded.len() != TOKEN_LEN {
            return Err(TokenError::Malformed);
        }
        let (expiry, tag) = decoded.split_at(EXPIRY_LEN);

        self.mac(expiry, key)
            .verify_slice(tag)
            .map_err(|_| TokenError::BadSignature)?;

        let mut expiry_bytes = [0u8; EXPIRY_LEN];
        expiry_bytes.copy_from_slice(expiry);
        let expiry_ts = u64::from_be_bytes(expiry_bytes);
        if now_ts > expiry_ts {
            return Err(TokenError::Expired);
        }
        Ok(expiry_ts)
    }

    fn mac(&self, expiry: &[u8], key: &str) -> HmacSha256 {
        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(expiry);
        mac.update(key.as_bytes());
        mac
    }
}
