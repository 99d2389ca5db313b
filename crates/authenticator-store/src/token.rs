//! Token model.
//!
//! A [`Token`] is one account in the authenticator: its display metadata,
//! OTP parameters, the secret, and the mutable state the store keeps for it
//! (the HOTP counter and the last TOTP step that was accepted).

use std::fmt;

use authenticator_core::{hotp, totp, Algorithm, CodeLength, Digest, OtpError, Secret, TimeStep};
use rand::rngs::OsRng;
use rand::RngCore;

// ── Kinds and sections ─────────────────────────────────────────────

/// OTP flavour of a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Time-based (RFC 6238).
    Totp,
    /// Counter-based (RFC 4226).
    Hotp,
}

impl TokenKind {
    /// The section tokens of this kind are listed in.
    #[must_use]
    pub const fn section(self) -> Section {
        match self {
            Self::Totp => Section::TimeBased,
            Self::Hotp => Section::CounterBased,
        }
    }

    /// Lowercase name used as the `otpauth://` host.
    #[must_use]
    pub const fn uri_name(self) -> &'static str {
        match self {
            Self::Totp => "totp",
            Self::Hotp => "hotp",
        }
    }
}

/// One of the two ordered token lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Section {
    /// TOTP tokens; their codes refresh on their own.
    TimeBased,
    /// HOTP tokens; their codes advance on request.
    CounterBased,
}

impl Section {
    /// Both sections in display order.
    pub const ALL: [Self; 2] = [Self::TimeBased, Self::CounterBased];

    /// Token kind held by this section.
    #[must_use]
    pub const fn kind(self) -> TokenKind {
        match self {
            Self::TimeBased => TokenKind::Totp,
            Self::CounterBased => TokenKind::Hotp,
        }
    }

    /// Value of the `section` column.
    #[must_use]
    pub const fn as_db_str(self) -> &'static str {
        match self {
            Self::TimeBased => "time",
            Self::CounterBased => "counter",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TimeBased => "time-based",
            Self::CounterBased => "counter-based",
        })
    }
}

// ── Token ──────────────────────────────────────────────────────────

/// A single OTP account.
///
/// `Debug` is safe to log: the secret prints as `Secret(***)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    id: String,
    name: String,
    issuer: Option<String>,
    kind: TokenKind,
    digest: Digest,
    length: CodeLength,
    step: TimeStep,
    counter: u64,
    last_accepted_step: Option<u64>,
    secret: Secret,
}

impl Token {
    /// New time-based token with SHA-1, 6 digits and 30-second steps.
    #[must_use]
    pub fn totp(name: impl Into<String>, secret: Secret) -> Self {
        Self::with_kind(TokenKind::Totp, name.into(), secret, 0)
    }

    /// New counter-based token starting at `counter`, with SHA-1 and 6 digits.
    #[must_use]
    pub fn hotp(name: impl Into<String>, secret: Secret, counter: u64) -> Self {
        Self::with_kind(TokenKind::Hotp, name.into(), secret, counter)
    }

    fn with_kind(kind: TokenKind, name: String, secret: Secret, counter: u64) -> Self {
        Self {
            id: generate_uuid(),
            name,
            issuer: None,
            kind,
            digest: Digest::default(),
            length: CodeLength::default(),
            step: TimeStep::DEFAULT,
            counter,
            last_accepted_step: None,
            secret,
        }
    }

    /// Set the issuer (service name). Empty strings clear it.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();
        self.issuer = (!issuer.is_empty()).then_some(issuer);
        self
    }

    /// Set the HMAC digest.
    #[must_use]
    pub fn with_digest(mut self, digest: Digest) -> Self {
        self.digest = digest;
        self
    }

    /// Set the code length.
    #[must_use]
    pub fn with_length(mut self, length: CodeLength) -> Self {
        self.length = length;
        self
    }

    /// Set the TOTP period in seconds. Ignored by HOTP code generation but kept
    /// so a token survives an `otpauth://` round trip unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::InvalidParameters`] if `period` is zero.
    pub fn with_period(mut self, period: u32) -> Result<Self, OtpError> {
        self.step = TimeStep::new(period, self.step.epoch())?;
        Ok(self)
    }

    /// Rebuild a token loaded from storage.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: String,
        name: String,
        issuer: Option<String>,
        kind: TokenKind,
        digest: Digest,
        length: CodeLength,
        step: TimeStep,
        counter: u64,
        last_accepted_step: Option<u64>,
        secret: Secret,
    ) -> Self {
        Self {
            id,
            name,
            issuer,
            kind,
            digest,
            length,
            step,
            counter,
            last_accepted_step,
            secret,
        }
    }

    // -- Accessors --

    /// Stable identifier (UUID v4).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Account name (e.g. `alice@example.com`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Service name, if any.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// `issuer:name`, or just `name` without an issuer.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.issuer {
            Some(issuer) => format!("{issuer}:{}", self.name),
            None => self.name.clone(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Section this token is listed in.
    #[must_use]
    pub const fn section(&self) -> Section {
        self.kind.section()
    }

    #[must_use]
    pub const fn digest(&self) -> Digest {
        self.digest
    }

    #[must_use]
    pub const fn length(&self) -> CodeLength {
        self.length
    }

    /// TOTP period in seconds.
    #[must_use]
    pub const fn period(&self) -> u32 {
        self.step.period()
    }

    /// Next HOTP counter to be used. Always 0 for TOTP tokens.
    #[must_use]
    pub const fn counter(&self) -> u64 {
        self.counter
    }

    /// Last TOTP step accepted by verification, if any.
    #[must_use]
    pub const fn last_accepted_step(&self) -> Option<u64> {
        self.last_accepted_step
    }

    #[must_use]
    pub const fn secret(&self) -> &Secret {
        &self.secret
    }

    /// Engine algorithm for this token.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        match self.kind {
            TokenKind::Totp => Algorithm::Totp(self.step),
            TokenKind::Hotp => Algorithm::Hotp,
        }
    }

    /// Code displayed for this token at Unix time `now`.
    ///
    /// TOTP tokens use the step containing `now`; HOTP tokens ignore `now`
    /// and use the stored counter.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::InvalidParameters`] if `now` precedes the TOTP epoch.
    pub fn code_at(&self, now: u64) -> Result<String, OtpError> {
        match self.kind {
            TokenKind::Totp => totp(self.secret.expose(), now, self.step, self.digest, self.length),
            TokenKind::Hotp => hotp(self.secret.expose(), self.counter, self.digest, self.length),
        }
    }

    /// Seconds until the code of a TOTP token changes, `None` for HOTP.
    #[must_use]
    pub fn seconds_remaining(&self, now: u64) -> Option<u32> {
        match self.kind {
            TokenKind::Totp => self.step.seconds_remaining(now).ok(),
            TokenKind::Hotp => None,
        }
    }

    // -- Store-internal mutation --

    pub(crate) fn set_counter(&mut self, counter: u64) {
        self.counter = counter;
    }

    pub(crate) fn set_last_accepted_step(&mut self, step: u64) {
        self.last_accepted_step = Some(step);
    }
}

/// Generate a random UUID v4 string.
pub(crate) fn generate_uuid() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);

    // Set version (4) and variant (RFC 4122).
    bytes[6] = (bytes[6] & 0x0F) | 0x40;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
