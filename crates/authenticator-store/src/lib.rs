//! `authenticator-store`: token storage for the authenticator.
//!
//! Keeps the user's OTP tokens in two ordered sections (time-based and
//! counter-based), persists them in `SQLite` with secrets sealed under a
//! caller-supplied key, imports and exports `otpauth://` URIs, and verifies
//! codes with replay protection.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod config;
pub mod db;
pub mod error;
pub mod manager;
pub mod seal;
pub mod token;
pub mod uri;

pub use config::StoreConfig;
pub use db::TokenDb;
pub use error::StoreError;
pub use manager::TokenManager;
pub use seal::StoreKey;
pub use token::{Section, Token, TokenKind};
pub use uri::{build_otpauth_uri, parse_otpauth_uri, parse_otpauth_uris};

/// Current Unix time in seconds.
///
/// The only place the crate reads the system clock; everything else takes
/// `now` as a parameter. A clock set before 1970 reads as 0.
#[must_use]
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
