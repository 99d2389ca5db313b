//! AES-256-GCM sealing of token secrets at rest.
//!
//! The `sealed_secret` column holds `nonce (12) || ciphertext || tag (16)`.
//! The token id is bound as additional authenticated data, so a sealed
//! secret copied onto another row fails to open.

use std::fmt;

use authenticator_core::Secret;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::StoreError;

/// AES-256-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Store key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Minimum valid sealed length: nonce + one byte of ciphertext + tag.
/// Secrets are never empty.
const MIN_SEALED_LEN: usize = NONCE_LEN + 1 + TAG_LEN;

// ── Store key ──────────────────────────────────────────────────────

/// 256-bit key sealing every secret in one store.
///
/// The caller owns where it comes from (platform keychain, derived from a
/// passphrase, ...). Zeroized on drop and masked in `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct StoreKey([u8; KEY_LEN]);

impl StoreKey {
    /// Wrap raw key bytes.
    #[must_use]
    pub const fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Copy a key from a slice.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Seal`] if `bytes` is not exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, StoreError> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            StoreError::Seal(format!(
                "invalid key length: {} bytes (expected {KEY_LEN})",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Fresh random key from the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Seal`] if the CSPRNG fails.
    pub fn generate() -> Result<Self, StoreError> {
        let mut bytes = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| StoreError::Seal(format!("CSPRNG fill failed: {e}")))?;
        Ok(Self(bytes))
    }

    fn aead_key(&self) -> Result<aead::LessSafeKey, StoreError> {
        let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &self.0)
            .map_err(|_| StoreError::Seal("failed to create AES-256-GCM key".into()))?;
        Ok(aead::LessSafeKey::new(unbound))
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StoreKey(***)")
    }
}

// ── Seal / open ────────────────────────────────────────────────────

/// Encrypt `secret` under `key` with a random nonce, binding `aad`.
///
/// # Errors
///
/// Returns [`StoreError::Seal`] if the CSPRNG or AEAD fails.
pub fn seal(secret: &Secret, key: &StoreKey, aad: &[u8]) -> Result<Vec<u8>, StoreError> {
    let aead_key = key.aead_key()?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce_bytes)
        .map_err(|e| StoreError::Seal(format!("CSPRNG fill failed: {e}")))?;
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    // Encrypt in place: the buffer becomes ciphertext.
    let mut in_out = secret.expose().to_vec();
    let Ok(tag) = aead_key.seal_in_place_separate_tag(nonce, aead::Aad::from(aad), &mut in_out)
    else {
        in_out.zeroize();
        return Err(StoreError::Seal("AES-256-GCM encryption failed".into()));
    };

    let capacity = NONCE_LEN
        .saturating_add(in_out.len())
        .saturating_add(TAG_LEN);
    let mut out = Vec::with_capacity(capacity);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&in_out);
    out.extend_from_slice(tag.as_ref());
    Ok(out)
}

/// Decrypt and authenticate a sealed secret.
///
/// # Errors
///
/// Returns [`StoreError::Decryption`] if the blob is truncated, was sealed
/// under another key or `aad`, or was tampered with.
pub fn open(sealed: &[u8], key: &StoreKey, aad: &[u8]) -> Result<Secret, StoreError> {
    if sealed.len() < MIN_SEALED_LEN {
        return Err(StoreError::Decryption);
    }
    let aead_key = key.aead_key()?;

    let (nonce_bytes, ct_tag) = sealed.split_at(NONCE_LEN);
    let nonce =
        aead::Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| StoreError::Decryption)?;

    let mut buffer = ct_tag.to_vec();
    let result = aead_key
        .open_in_place(nonce, aead::Aad::from(aad), &mut buffer)
        .map_err(|_| StoreError::Decryption)
        .and_then(|plaintext| Secret::new(plaintext).map_err(StoreError::from));
    buffer.zeroize();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: [u8; KEY_LEN] = [0xAA; KEY_LEN];
    const WRONG_KEY: [u8; KEY_LEN] = [0xBB; KEY_LEN];

    fn secret() -> Secret {
        Secret::new(b"12345678901234567890").unwrap()
    }

    #[test]
    fn seal_produces_wire_format_length() {
        let sealed = seal(&secret(), &StoreKey::new(TEST_KEY), b"id").unwrap();
        assert_eq!(sealed.len(), NONCE_LEN + 20 + TAG_LEN);
    }

    #[test]
    fn seal_open_roundtrip() {
        let key = StoreKey::new(TEST_KEY);
        let sealed = seal(&secret(), &key, b"token-1").unwrap();
        let opened = open(&sealed, &key, b"token-1").unwrap();
        assert_eq!(opened, secret());
    }

    #[test]
    fn nonces_differ_between_calls() {
        let key = StoreKey::new(TEST_KEY);
        let a = seal(&secret(), &key, b"id").unwrap();
        let b = seal(&secret(), &key, b"id").unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = seal(&secret(), &StoreKey::new(TEST_KEY), b"id").unwrap();
        let result = open(&sealed, &StoreKey::new(WRONG_KEY), b"id");
        assert!(matches!(result, Err(StoreError::Decryption)));
    }

    #[test]
    fn wrong_aad_fails() {
        let key = StoreKey::new(TEST_KEY);
        let sealed = seal(&secret(), &key, b"token-1").unwrap();
        assert!(matches!(
            open(&sealed, &key, b"token-2"),
            Err(StoreError::Decryption)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = StoreKey::new(TEST_KEY);
        let mut sealed = seal(&secret(), &key, b"id").unwrap();
        sealed[NONCE_LEN] ^= 0xFF;
        assert!(matches!(open(&sealed, &key, b"id"), Err(StoreError::Decryption)));
    }

    #[test]
    fn truncated_blob_fails() {
        let key = StoreKey::new(TEST_KEY);
        assert!(matches!(open(&[0u8; 20], &key, b"id"), Err(StoreError::Decryption)));
        assert!(matches!(open(&[], &key, b"id"), Err(StoreError::Decryption)));
    }

    #[test]
    fn key_from_slice_checks_length() {
        assert!(StoreKey::from_slice(&[0u8; 32]).is_ok());
        assert!(matches!(
            StoreKey::from_slice(&[0u8; 16]),
            Err(StoreError::Seal(_))
        ));
    }

    #[test]
    fn generated_keys_differ() {
        let a = StoreKey::generate().unwrap();
        let b = StoreKey::generate().unwrap();
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn key_debug_is_masked() {
        let key = StoreKey::new(TEST_KEY);
        assert_eq!(format!("{key:?}"), "StoreKey(***)");
    }
}
