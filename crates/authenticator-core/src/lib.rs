//! `authenticator-core`: one-time password engine for the authenticator.
//!
//! HOTP (RFC 4226) and TOTP (RFC 6238) code generation and constant-time,
//! drift-tolerant validation, plus the [`Secret`] type holding token keys.
//!
//! This crate is pure: no I/O, no clocks, no global state. Callers pass the
//! current time in and own any per-token state.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod otp;
pub mod secret;

pub use error::OtpError;
pub use otp::{
    generate, hotp, totp, validate, Algorithm, CodeLength, Digest, TimeStep, Verification,
    DEFAULT_DRIFT_WINDOW, DEFAULT_LOOK_AHEAD, DEFAULT_PERIOD,
};
pub use secret::{Secret, DEFAULT_SECRET_LEN};
