//! Shared-secret key material for OTP tokens.
//!
//! [`Secret`] owns the raw HMAC key of one token. It:
//! - zeroes its memory on drop (via [`secrecy`] / [`zeroize`])
//! - locks its pages in RAM via `mlock` where the platform allows it
//! - masks itself in `Debug`/`Display` so it never reaches a log line
//!
//! Users see secrets as RFC 4648 Base32 strings; [`Secret::from_base32`]
//! accepts them the way people type them (lowercase, grouped with spaces or
//! dashes, with or without `=` padding).

use std::fmt;

use data_encoding::{Encoding, Specification, BASE32_NOPAD};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretSlice};
use zeroize::Zeroize;

use crate::error::OtpError;

/// Default secret length in bytes (160 bits, the RFC 4226 recommendation).
pub const DEFAULT_SECRET_LEN: usize = 20;

/// RFC 4648 Base32 alphabet.
const BASE32_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

// ---------------------------------------------------------------------------
// Platform-specific memory locking
// ---------------------------------------------------------------------------

/// RAII guard that unlocks memory on drop.
///
/// Locking is best-effort: when `mlock` fails (quota, privileges) the region
/// is simply left unlocked.
struct LockedRegion {
    ptr: *const u8,
    len: usize,
    locked: bool,
}

// SAFETY: The pointer is only handed to mlock/munlock, which are thread-safe.
// The pointed-to bytes are owned by the enclosing `Secret` and never read
// through this struct.
unsafe impl Send for LockedRegion {}
unsafe impl Sync for LockedRegion {}

impl LockedRegion {
    fn try_lock(ptr: *const u8, len: usize) -> Self {
        let locked = platform::try_mlock(ptr, len);
        Self { ptr, len, locked }
    }
}

impl Drop for LockedRegion {
    fn drop(&mut self) {
        if self.locked {
            platform::try_munlock(self.ptr, self.len);
        }
    }
}

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// HMAC key of a single OTP token. Never empty.
pub struct Secret {
    // Declared first so the region is unlocked before `inner` frees it.
    lock: LockedRegion,
    inner: SecretSlice<u8>,
}

impl Secret {
    /// Copy `bytes` into a new locked, zeroize-on-drop allocation.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::InvalidSecret`] if `bytes` is empty.
    pub fn new(bytes: &[u8]) -> Result<Self, OtpError> {
        if bytes.is_empty() {
            return Err(OtpError::InvalidSecret("secret must not be empty".into()));
        }
        Ok(Self::from_vec(bytes.to_vec()))
    }

    /// Decode a user-facing Base32 string.
    ///
    /// Case is ignored, as are spaces, tabs, and `-` group separators.
    /// Trailing `=` padding is optional. Unused trailing bits in the last
    /// symbol are tolerated, since hand-typed keys often carry them.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::InvalidSecret`] if the string is empty after
    /// normalization, contains characters outside the Base32 alphabet, or
    /// has a length no Base32 encoding can produce.
    pub fn from_base32(encoded: &str) -> Result<Self, OtpError> {
        let mut normalized: String = encoded
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        let unpadded_len = normalized.trim_end_matches('=').len();
        normalized.truncate(unpadded_len);

        if normalized.is_empty() {
            return Err(OtpError::InvalidSecret("secret must not be empty".into()));
        }

        let decoded = lenient_base32()?.decode(normalized.as_bytes());
        normalized.zeroize();

        let bytes =
            decoded.map_err(|e| OtpError::InvalidSecret(format!("invalid Base32: {e}")))?;
        if bytes.is_empty() {
            return Err(OtpError::InvalidSecret("secret must not be empty".into()));
        }
        Ok(Self::from_vec(bytes))
    }

    /// Generate `len` random bytes from the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::InvalidSecret`] if `len` is zero or the CSPRNG
    /// fails.
    pub fn random(len: usize) -> Result<Self, OtpError> {
        if len == 0 {
            return Err(OtpError::InvalidSecret("secret must not be empty".into()));
        }
        let mut bytes = vec![0u8; len];
        if let Err(e) = OsRng.try_fill_bytes(&mut bytes) {
            bytes.zeroize();
            return Err(OtpError::InvalidSecret(format!("CSPRNG fill failed: {e}")));
        }
        Ok(Self::from_vec(bytes))
    }

    /// Unpadded uppercase Base32, the form used in `otpauth://` URIs.
    #[must_use]
    pub fn to_base32(&self) -> String {
        BASE32_NOPAD.encode(self.expose())
    }

    /// Borrow the raw key bytes for an HMAC computation.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }

    /// Key length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.expose().len()
    }

    /// Always `false`: construction rejects empty keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    /// Whether the key pages are currently `mlock`ed.
    #[must_use]
    pub const fn is_mlocked(&self) -> bool {
        self.lock.locked
    }

    fn from_vec(bytes: Vec<u8>) -> Self {
        let inner: SecretSlice<u8> = bytes.into();
        let exposed = inner.expose_secret();
        let lock = LockedRegion::try_lock(exposed.as_ptr(), exposed.len());
        Self { inner, lock }
    }
}

impl Clone for Secret {
    fn clone(&self) -> Self {
        Self::from_vec(self.expose().to_vec())
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        crate::otp::constant_time_eq(self.expose(), other.expose())
    }
}

impl Eq for Secret {}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Unpadded Base32 decoder that ignores non-zero trailing bits.
fn lenient_base32() -> Result<Encoding, OtpError> {
    let mut spec = Specification::new();
    spec.symbols.push_str(BASE32_ALPHABET);
    spec.check_trailing_bits = false;
    spec.encoding()
        .map_err(|e| OtpError::InvalidSecret(format!("Base32 decoder unavailable: {e}")))
}

#[cfg(unix)]
mod platform {
    pub(super) fn try_mlock(ptr: *const u8, len: usize) -> bool {
        if len == 0 {
            return true;
        }
        // SAFETY: mlock accepts any pointer/length pair; an invalid range is
        // reported through the return value.
        unsafe { libc::mlock(ptr.cast(), len) == 0 }
    }

    pub(super) fn try_munlock(ptr: *const u8, len: usize) {
        if len == 0 {
            return;
        }
        // SAFETY: munlock on a range we previously locked. Failure is harmless.
        unsafe {
            libc::munlock(ptr.cast(), len);
        }
    }
}

#[cfg(not(unix))]
mod platform {
    pub(super) fn try_mlock(_ptr: *const u8, _len: usize) -> bool {
        false
    }

    pub(super) fn try_munlock(_ptr: *const u8, _len: usize) {}
}
