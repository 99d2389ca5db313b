//! Error types for `authenticator-core`.

use thiserror::Error;

/// Errors produced by the OTP engine and secret handling.
///
/// All variants are local validation failures raised before any HMAC is
/// computed. Messages never include secret bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtpError {
    /// Key material is empty or not valid Base32.
    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    /// Code length, time step, or moving factor is outside the supported range.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Digest or OTP type name that the engine does not implement.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
}
