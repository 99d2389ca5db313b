//! Store error types for `authenticator-store`.

use authenticator_core::OtpError;
use thiserror::Error;

use crate::token::Section;

/// Errors produced by token store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// OTP engine rejected a secret or parameter (delegated from core).
    #[error(transparent)]
    Otp(#[from] OtpError),

    /// `SQLite` error.
    #[error("database error: {0}")]
    Database(String),

    /// Migration error during schema upgrade.
    #[error("migration error: {0}")]
    Migration(String),

    /// An index outside the bounds of its section.
    #[error("index {index} out of bounds for {section} section of {len} tokens")]
    IndexOutOfBounds {
        /// Section the index was applied to.
        section: Section,
        /// The offending index.
        index: usize,
        /// Number of tokens in the section.
        len: usize,
    },

    /// A token with this id is already in the store.
    #[error("duplicate token: {0}")]
    DuplicateToken(String),

    /// Malformed `otpauth://` URI.
    #[error("invalid otpauth URI: {0}")]
    InvalidUri(String),

    /// Sealing a secret failed (bad key length or AEAD failure).
    #[error("seal error: {0}")]
    Seal(String),

    /// A sealed secret could not be opened: wrong store key or tampered row.
    #[error("decryption failed")]
    Decryption,

    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}
