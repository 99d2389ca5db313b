//! Fuzz target for code validation with attacker-controlled candidates.
//!
//! The first byte picks the code length, the next eight the moving factor;
//! the rest is the candidate string. `validate` must never panic and must
//! only accept a candidate equal to a code inside the window.
//!
//! # Usage
//!
//! ```sh
//! cd crates/authenticator-store
//! cargo +nightly fuzz run validate_candidate
//! ```

#![no_main]

use authenticator_core::{hotp, validate, Algorithm, CodeLength, Digest, TimeStep};
use libfuzzer_sys::fuzz_target;

const SECRET: &[u8] = b"12345678901234567890";

fuzz_target!(|data: &[u8]| {
    let Some((&len_byte, rest)) = data.split_first() else {
        return;
    };
    let Some((factor_bytes, candidate)) = rest.split_first_chunk::<8>() else {
        return;
    };
    let Ok(candidate) = std::str::from_utf8(candidate) else {
        return;
    };
    let Ok(length) = CodeLength::new(len_byte % 10) else {
        return;
    };
    let moving_factor = u64::from_be_bytes(*factor_bytes);

    for algorithm in [Algorithm::Hotp, Algorithm::Totp(TimeStep::DEFAULT)] {
        let result = validate(SECRET, algorithm, Digest::Sha1, length, candidate, moving_factor, 2)
            .expect("non-empty secret never errors");
        if let Some(counter) = algorithm
            .counter_for(moving_factor)
            .ok()
            .and_then(|reference| result.matched_counter(reference))
        {
            let expected = hotp(SECRET, counter, Digest::Sha1, length).expect("hotp");
            assert_eq!(expected, candidate);
        }
    }
});
