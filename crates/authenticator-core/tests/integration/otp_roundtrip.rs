//! Integration tests for the OTP engine.
//!
//! Covers the generate → validate lifecycle, drift windows on both sides,
//! and the HOTP counter hand-off that callers rely on for replay protection.

use authenticator_core::{
    generate, hotp, totp, validate, Algorithm, CodeLength, Digest, OtpError, Secret, TimeStep,
    Verification, DEFAULT_DRIFT_WINDOW, DEFAULT_LOOK_AHEAD,
};

const SECRET_20: &[u8] = b"12345678901234567890";
const SECRET_64: &[u8] = b"1234567890123456789012345678901234567890123456789012345678901234";

/// Generate → validate at the same time succeeds with zero offset.
#[test]
fn generate_then_validate_same_time() {
    let time = 1_700_000_000u64;
    let algorithm = Algorithm::Totp(TimeStep::DEFAULT);
    let code = generate(SECRET_20, algorithm, Digest::Sha1, time, CodeLength::SIX).unwrap();
    let result = validate(
        SECRET_20,
        algorithm,
        Digest::Sha1,
        CodeLength::SIX,
        &code,
        time,
        DEFAULT_DRIFT_WINDOW,
    )
    .unwrap();
    assert_eq!(result, Verification::MatchAtOffset(0));
}

/// A code from the previous step is accepted with the default window and
/// rejected with a zero window.
#[test]
fn previous_step_and_drift_window() {
    let time = 1_700_000_000u64;
    let algorithm = Algorithm::Totp(TimeStep::DEFAULT);
    let code = generate(SECRET_20, algorithm, Digest::Sha1, time - 30, CodeLength::SIX).unwrap();

    let lenient = validate(
        SECRET_20,
        algorithm,
        Digest::Sha1,
        CodeLength::SIX,
        &code,
        time,
        1,
    )
    .unwrap();
    assert_eq!(lenient, Verification::MatchAtOffset(-1));

    let strict = validate(
        SECRET_20,
        algorithm,
        Digest::Sha1,
        CodeLength::SIX,
        &code,
        time,
        0,
    )
    .unwrap();
    assert_eq!(strict, Verification::NoMatch);
}

/// Generate → validate three steps later fails with the default window.
#[test]
fn generate_then_validate_three_steps_later_fails() {
    let time = 1_700_000_000u64;
    let algorithm = Algorithm::Totp(TimeStep::DEFAULT);
    let code = generate(SECRET_20, algorithm, Digest::Sha1, time, CodeLength::SIX).unwrap();
    let result = validate(
        SECRET_20,
        algorithm,
        Digest::Sha1,
        CodeLength::SIX,
        &code,
        time + 90,
        DEFAULT_DRIFT_WINDOW,
    )
    .unwrap();
    assert_eq!(result, Verification::NoMatch);
}

/// Each digest validates its own code and the three codes are not all equal.
#[test]
fn cross_digest_differentiation() {
    let time = 1_234_567_890u64;
    let step = TimeStep::DEFAULT;
    let algorithm = Algorithm::Totp(step);

    let codes: Vec<(Digest, String)> = [Digest::Sha1, Digest::Sha256, Digest::Sha512]
        .into_iter()
        .map(|d| (d, totp(SECRET_64, time, step, d, CodeLength::EIGHT).unwrap()))
        .collect();

    for (digest, code) in &codes {
        let result = validate(
            SECRET_64,
            algorithm,
            *digest,
            CodeLength::EIGHT,
            code,
            time,
            0,
        )
        .unwrap();
        assert!(result.is_match(), "{digest} code must validate under {digest}");
    }

    let all_same = codes.windows(2).all(|w| w[0].1 == w[1].1);
    assert!(!all_same, "different digests should produce different codes");
}

/// TOTP(secret, t) == HOTP(secret, t / period), also for 60-second steps.
#[test]
fn totp_hotp_consistency() {
    let time = 2_000_000_000u64;
    let step = TimeStep::new(60, 0).unwrap();

    let totp_code = totp(SECRET_20, time, step, Digest::Sha256, CodeLength::SIX).unwrap();
    let hotp_code = hotp(SECRET_20, time / 60, Digest::Sha256, CodeLength::SIX).unwrap();
    assert_eq!(totp_code, hotp_code);
}

/// Replay: once the caller advances its stored counter past the matched one,
/// the same code no longer validates.
#[test]
fn hotp_replay_is_rejected_after_counter_advance() {
    let secret = Secret::from_base32("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ").unwrap();
    let mut stored_counter = 4u64;

    // The user pressed the button twice without logging in: counter 6.
    let candidate = "287922";
    let first = validate(
        secret.expose(),
        Algorithm::Hotp,
        Digest::Sha1,
        CodeLength::SIX,
        candidate,
        stored_counter,
        DEFAULT_LOOK_AHEAD,
    )
    .unwrap();
    assert_eq!(first, Verification::MatchAtOffset(2));

    let matched = first.matched_counter(stored_counter).unwrap();
    assert_eq!(matched, 6);
    stored_counter = matched + 1;

    let second = validate(
        secret.expose(),
        Algorithm::Hotp,
        Digest::Sha1,
        CodeLength::SIX,
        candidate,
        stored_counter,
        DEFAULT_LOOK_AHEAD,
    )
    .unwrap();
    assert_eq!(second, Verification::NoMatch);
}

/// Validation of a zero period fails before any HMAC is computed.
#[test]
fn zero_period_is_rejected_up_front() {
    assert!(matches!(
        TimeStep::new(0, 0),
        Err(OtpError::InvalidParameters(_))
    ));
}

/// Invalid Base32 surfaces as `InvalidSecret` before generation.
#[test]
fn malformed_base32_is_invalid_secret() {
    assert!(matches!(
        Secret::from_base32("NOT*BASE32"),
        Err(OtpError::InvalidSecret(_))
    ));
}
