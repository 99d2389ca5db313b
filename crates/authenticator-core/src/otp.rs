//! RFC 4226 HOTP and RFC 6238 TOTP code engine.
//!
//! Every function here is pure: all inputs (secret, counter or current time,
//! parameters) are passed in explicitly and nothing is retained between
//! calls. Mutable per-token state (the HOTP counter, the last accepted TOTP
//! step) belongs to the caller, which uses the [`Verification`] returned by
//! [`validate`] to advance it.
//!
//! HMAC-SHA1, HMAC-SHA256 and HMAC-SHA512 are provided by `ring::hmac`.

use std::fmt;
use std::str::FromStr;

use ring::hmac;

use crate::error::OtpError;

// ── Constants ───────────────────────────────────────────────────────

/// Default TOTP period in seconds (RFC 6238 §4).
pub const DEFAULT_PERIOD: u32 = 30;

/// Default TOTP validation window: one step either side of "now".
pub const DEFAULT_DRIFT_WINDOW: u32 = 1;

/// Default HOTP look-ahead: counters `C..=C + 10` are accepted.
pub const DEFAULT_LOOK_AHEAD: u32 = 10;

/// `10^n` for every supported code length (index = digit count).
const POWERS_OF_TEN: [u32; 10] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
];

// ── Types ───────────────────────────────────────────────────────────

/// Keyed-hash function used for the HMAC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Digest {
    /// HMAC-SHA1 (RFC 4226 default, used by most issuers).
    #[default]
    Sha1,
    /// HMAC-SHA256.
    Sha256,
    /// HMAC-SHA512.
    Sha512,
}

impl Digest {
    /// Canonical name as used in `otpauth://` URIs and storage.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }

    /// Parse a digest name. Case-insensitive; `SHA-256` style dashes are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::UnsupportedAlgorithm`] for any other name (e.g. `MD5`).
    pub fn from_name(name: &str) -> Result<Self, OtpError> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(OtpError::UnsupportedAlgorithm(format!("digest {name:?}"))),
        }
    }

    fn hmac_algorithm(self) -> hmac::Algorithm {
        match self {
            Self::Sha1 => hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
            Self::Sha256 => hmac::HMAC_SHA256,
            Self::Sha512 => hmac::HMAC_SHA512,
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Digest {
    type Err = OtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// Number of decimal digits in a code.
///
/// Dynamic truncation yields a 31-bit value, so at most 9 digits carry
/// information (`10^9 < 2^31 < 10^10`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeLength(u8);

impl CodeLength {
    /// Shortest supported code.
    pub const MIN: u8 = 1;
    /// Longest supported code.
    pub const MAX: u8 = 9;
    /// 6-digit code (the common default).
    pub const SIX: Self = Self(6);
    /// 8-digit code.
    pub const EIGHT: Self = Self(8);

    /// Validate a digit count.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::InvalidParameters`] if `digits` is outside `1..=9`.
    pub fn new(digits: u8) -> Result<Self, OtpError> {
        if (Self::MIN..=Self::MAX).contains(&digits) {
            Ok(Self(digits))
        } else {
            Err(OtpError::InvalidParameters(format!(
                "code length {digits} outside {}..={}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    /// The digit count.
    #[must_use]
    pub const fn digits(self) -> u8 {
        self.0
    }

    const fn modulus(self) -> u32 {
        POWERS_OF_TEN[self.0 as usize]
    }
}

impl Default for CodeLength {
    fn default() -> Self {
        Self::SIX
    }
}

impl TryFrom<u32> for CodeLength {
    type Error = OtpError;

    fn try_from(digits: u32) -> Result<Self, Self::Error> {
        let digits = u8::try_from(digits)
            .map_err(|_| OtpError::InvalidParameters(format!("code length {digits} too large")))?;
        Self::new(digits)
    }
}

impl fmt::Display for CodeLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// TOTP time-step parameters: step duration and reference epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimeStep {
    period: u32,
    epoch: u64,
}

impl TimeStep {
    /// 30-second steps counted from the Unix epoch.
    pub const DEFAULT: Self = Self {
        period: DEFAULT_PERIOD,
        epoch: 0,
    };

    /// Create a time step of `period` seconds counted from `epoch` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::InvalidParameters`] if `period` is zero.
    pub fn new(period: u32, epoch: u64) -> Result<Self, OtpError> {
        if period == 0 {
            return Err(OtpError::InvalidParameters("period must be > 0".into()));
        }
        Ok(Self { period, epoch })
    }

    /// Step duration in seconds (never zero).
    #[must_use]
    pub const fn period(self) -> u32 {
        self.period
    }

    /// Reference epoch in Unix seconds.
    #[must_use]
    pub const fn epoch(self) -> u64 {
        self.epoch
    }

    /// `floor((time - epoch) / period)`.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::InvalidParameters`] if `time` precedes the epoch.
    pub fn counter_at(self, time: u64) -> Result<u64, OtpError> {
        let elapsed = time.checked_sub(self.epoch).ok_or_else(|| {
            OtpError::InvalidParameters(format!(
                "time {time} precedes TOTP epoch {}",
                self.epoch
            ))
        })?;
        // period is non-zero by construction.
        #[allow(clippy::arithmetic_side_effects)]
        let step = elapsed / u64::from(self.period);
        Ok(step)
    }

    /// Seconds until the code shown at `time` rolls over (`1..=period`).
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::InvalidParameters`] if `time` precedes the epoch.
    pub fn seconds_remaining(self, time: u64) -> Result<u32, OtpError> {
        let elapsed = time.checked_sub(self.epoch).ok_or_else(|| {
            OtpError::InvalidParameters(format!(
                "time {time} precedes TOTP epoch {}",
                self.epoch
            ))
        })?;
        // period is non-zero by construction; the remainder is < period.
        #[allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)]
        let into_step = (elapsed % u64::from(self.period)) as u32;
        Ok(self.period.saturating_sub(into_step))
    }

    /// Unix time at which `step` begins, or `None` if it does not fit in `u64`.
    #[must_use]
    pub fn step_start(self, step: u64) -> Option<u64> {
        step.checked_mul(u64::from(self.period))?
            .checked_add(self.epoch)
    }
}

impl Default for TimeStep {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// How the moving factor of a token is derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Counter-based (RFC 4226): the moving factor *is* the counter.
    Hotp,
    /// Time-based (RFC 6238): the moving factor is a Unix time.
    Totp(TimeStep),
}

impl Algorithm {
    /// Map a moving factor (counter or Unix time) to the HOTP counter.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::InvalidParameters`] if a TOTP time precedes its epoch.
    pub fn counter_for(self, moving_factor: u64) -> Result<u64, OtpError> {
        match self {
            Self::Hotp => Ok(moving_factor),
            Self::Totp(step) => step.counter_at(moving_factor),
        }
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::Totp(TimeStep::DEFAULT)
    }
}

/// Outcome of [`validate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verification {
    /// No counter in the window produced the candidate code.
    NoMatch,
    /// The candidate matched the counter `reference + offset`.
    ///
    /// For HOTP the offset is always `>= 0`; for TOTP it is the clock drift
    /// in steps (negative when the code came from an earlier step).
    MatchAtOffset(i64),
}

impl Verification {
    /// Whether the candidate was accepted.
    #[must_use]
    pub const fn is_match(self) -> bool {
        matches!(self, Self::MatchAtOffset(_))
    }

    /// Absolute counter that matched, given the reference counter the window
    /// was centred on.
    #[must_use]
    pub const fn matched_counter(self, reference: u64) -> Option<u64> {
        match self {
            Self::NoMatch => None,
            Self::MatchAtOffset(offset) => reference.checked_add_signed(offset),
        }
    }
}

// ── Generation ──────────────────────────────────────────────────────

/// Generate an HOTP code per RFC 4226.
///
/// # Errors
///
/// Returns [`OtpError::InvalidSecret`] if `secret` is empty.
#[must_use = "OTP code should be used or stored"]
pub fn hotp(
    secret: &[u8],
    counter: u64,
    digest: Digest,
    length: CodeLength,
) -> Result<String, OtpError> {
    if secret.is_empty() {
        return Err(OtpError::InvalidSecret("secret must not be empty".into()));
    }

    // HMAC(K, C) with C as 8-byte big-endian (RFC 4226 §5.2).
    let key = hmac::Key::new(digest.hmac_algorithm(), secret);
    let tag = hmac::sign(&key, &counter.to_be_bytes());

    let binary_code = truncate(tag.as_ref());

    // modulus is a power of ten between 10 and 10^9, never zero.
    #[allow(clippy::arithmetic_side_effects)]
    let code = binary_code % length.modulus();
    let width = usize::from(length.digits());

    Ok(format!("{code:0>width$}"))
}

/// Generate a TOTP code per RFC 6238 for Unix time `time`.
///
/// # Errors
///
/// Returns [`OtpError::InvalidSecret`] if `secret` is empty, or
/// [`OtpError::InvalidParameters`] if `time` precedes the step epoch.
#[must_use = "OTP code should be used or stored"]
pub fn totp(
    secret: &[u8],
    time: u64,
    step: TimeStep,
    digest: Digest,
    length: CodeLength,
) -> Result<String, OtpError> {
    hotp(secret, step.counter_at(time)?, digest, length)
}

/// Generate the code for `moving_factor` (a counter for HOTP, a Unix time
/// for TOTP).
///
/// # Errors
///
/// See [`hotp`] and [`totp`].
#[must_use = "OTP code should be used or stored"]
pub fn generate(
    secret: &[u8],
    algorithm: Algorithm,
    digest: Digest,
    moving_factor: u64,
    length: CodeLength,
) -> Result<String, OtpError> {
    hotp(secret, algorithm.counter_for(moving_factor)?, digest, length)
}

// ── Validation ──────────────────────────────────────────────────────

/// Check `candidate` against every counter in the acceptance window.
///
/// - TOTP: steps `T - window ..= T + window` around the step of `moving_factor`.
/// - HOTP: counters `C ..= C + window` (look-ahead only).
///
/// The whole window is always computed and every comparison is
/// constant-time, so the time taken does not depend on whether or where
/// the candidate matched. When several counters match, the one closest to
/// the reference wins (earlier step first on a tie).
///
/// A candidate of the wrong length or containing non-digits is simply
/// [`Verification::NoMatch`].
///
/// # Errors
///
/// Returns [`OtpError::InvalidSecret`] if `secret` is empty, or
/// [`OtpError::InvalidParameters`] if a TOTP time precedes its epoch.
#[must_use = "validation result should be checked"]
pub fn validate(
    secret: &[u8],
    algorithm: Algorithm,
    digest: Digest,
    length: CodeLength,
    candidate: &str,
    moving_factor: u64,
    window: u32,
) -> Result<Verification, OtpError> {
    if secret.is_empty() {
        return Err(OtpError::InvalidSecret("secret must not be empty".into()));
    }
    let reference = algorithm.counter_for(moving_factor)?;
    let symmetric = matches!(algorithm, Algorithm::Totp(_));

    let mut matched = None;
    for offset in search_order(window, symmetric) {
        // Steps before 0 or past u64::MAX do not exist.
        let Some(counter) = reference.checked_add_signed(offset) else {
            continue;
        };
        let expected = hotp(secret, counter, digest, length)?;
        let hit = constant_time_eq(expected.as_bytes(), candidate.as_bytes());
        if hit && matched.is_none() {
            matched = Some(offset);
        }
    }

    Ok(matched.map_or(Verification::NoMatch, Verification::MatchAtOffset))
}

/// Offsets in the order they are tried: `0, -1, 1, -2, 2, ...` when
/// symmetric, `0, 1, 2, ...` otherwise.
fn search_order(window: u32, symmetric: bool) -> impl Iterator<Item = i64> {
    (0..=i64::from(window)).flat_map(move |distance| {
        let behind = (symmetric && distance != 0).then(|| distance.wrapping_neg());
        behind.into_iter().chain(std::iter::once(distance))
    })
}

// ── Internals ───────────────────────────────────────────────────────

/// Dynamic truncation (RFC 4226 §5.3).
///
/// `tag` is an HMAC output of at least 20 bytes, so `offset + 3 <= 18` is
/// always in bounds.
fn truncate(tag: &[u8]) -> u32 {
    let offset = usize::from(tag[tag.len().wrapping_sub(1)] & 0x0F);

    // 4 bytes at offset, high bit cleared to avoid sign ambiguity.
    u32::from_be_bytes([
        tag[offset] & 0x7F,
        tag[offset.wrapping_add(1)],
        tag[offset.wrapping_add(2)],
        tag[offset.wrapping_add(3)],
    ])
}

/// Constant-time byte comparison.
///
/// Returns `true` iff both slices have equal length and identical contents.
/// The length check may return early: code length is public, only the
/// digits are secret.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    std::hint::black_box(diff) == 0
}

// ── Tests ───────────────────────────────────────────────────────────
