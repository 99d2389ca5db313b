//! Fuzz target for the `otpauth://` URI parser and Base32 secret decoder.
//!
//! Feeds arbitrary strings to `parse_otpauth_uri` and `Secret::from_base32`;
//! neither may panic. Parsed tokens must survive an export/import
//! round trip.
//!
//! # Usage
//!
//! ```sh
//! cd crates/authenticator-store
//! cargo +nightly fuzz run otpauth_uri -- -max_len=4096
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = authenticator_core::Secret::from_base32(s);

        if let Ok(token) = authenticator_store::parse_otpauth_uri(s) {
            let uri = authenticator_store::build_otpauth_uri(&token);
            let again = authenticator_store::parse_otpauth_uri(&uri)
                .expect("exported URI must parse");
            assert_eq!(again.name(), token.name());
            assert_eq!(again.issuer(), token.issuer());
            assert_eq!(again.secret(), token.secret());
            assert_eq!(again.digest(), token.digest());
            assert_eq!(again.length(), token.length());
        }
    }
});
