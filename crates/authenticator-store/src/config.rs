//! Verification policy and defaults for new tokens, stored as plain JSON.
//!
//! Nothing in here is secret, so the file lives next to the database and
//! can be read before the store key is available.

use std::fs;
use std::path::Path;

use authenticator_core::{
    CodeLength, Digest, OtpError, Secret, DEFAULT_DRIFT_WINDOW, DEFAULT_LOOK_AHEAD, DEFAULT_PERIOD,
};
use serde::{Deserialize, Serialize};

use crate::token::{Token, TokenKind};

// ── Store configuration ────────────────────────────────────────────

/// Tunables of a token store.
///
/// Persisted to `{data_dir}/store.json`. All fields have defaults, so a
/// partial file only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// TOTP steps accepted either side of the current one.
    #[serde(default = "default_drift_window")]
    pub totp_drift_window: u32,

    /// HOTP counters accepted ahead of the stored one.
    #[serde(default = "default_look_ahead")]
    pub hotp_look_ahead: u32,

    /// Digest name for new tokens (`"SHA1"`, `"SHA256"`, `"SHA512"`).
    #[serde(default = "default_digest")]
    pub default_digest: String,

    /// Code length for new tokens (1–9).
    #[serde(default = "default_digits")]
    pub default_digits: u8,

    /// TOTP period in seconds for new tokens.
    #[serde(default = "default_period")]
    pub default_period: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            totp_drift_window: default_drift_window(),
            hotp_look_ahead: default_look_ahead(),
            default_digest: default_digest(),
            default_digits: default_digits(),
            default_period: default_period(),
        }
    }
}

const fn default_drift_window() -> u32 {
    DEFAULT_DRIFT_WINDOW
}
const fn default_look_ahead() -> u32 {
    DEFAULT_LOOK_AHEAD
}
fn default_digest() -> String {
    Digest::default().name().into()
}
const fn default_digits() -> u8 {
    6
}
const fn default_period() -> u32 {
    DEFAULT_PERIOD
}

impl StoreConfig {
    /// Build a new token of `kind` using the configured defaults.
    ///
    /// # Errors
    ///
    /// Returns an [`OtpError`] if the configured digest, digit count or
    /// period is invalid.
    pub fn new_token(
        &self,
        kind: TokenKind,
        name: impl Into<String>,
        secret: Secret,
    ) -> Result<Token, OtpError> {
        let token = match kind {
            TokenKind::Totp => Token::totp(name, secret),
            TokenKind::Hotp => Token::hotp(name, secret, 0),
        };
        token
            .with_digest(Digest::from_name(&self.default_digest)?)
            .with_length(CodeLength::new(self.default_digits)?)
            .with_period(self.default_period)
    }
}

// ── File I/O ───────────────────────────────────────────────────────

const CONFIG_FILE: &str = "store.json";

impl StoreConfig {
    /// Load the configuration from `{data_dir}/store.json`.
    ///
    /// Returns [`Default::default()`] when the file is missing or
    /// contains invalid JSON.
    #[must_use]
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(CONFIG_FILE);
        fs::read_to_string(&path).map_or_else(
            |_| Self::default(),
            |contents| {
                serde_json::from_str(&contents).unwrap_or_else(|e| {
                    tracing::warn!(path = %path.display(), "ignoring corrupt store config: {e}");
                    Self::default()
                })
            },
        )
    }

    /// Persist the configuration to `{data_dir}/store.json`.
    ///
    /// Writes to a `.tmp` file first and renames it over the target.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the directory does not exist or the
    /// file system rejects the write/rename.
    pub fn save(&self, data_dir: &Path) -> std::io::Result<()> {
        let path = data_dir.join(CONFIG_FILE);
        let tmp = data_dir.join(".store.json.tmp");

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(&tmp, &json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &path)?;

        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────
