//! Secrets must never reach formatted output.

use authenticator_core::{OtpError, Secret};

#[test]
fn debug_output_is_constant_regardless_of_content() {
    let a = Secret::new(&[0xDE; 64]).unwrap();
    let b = Secret::new(&[0x42; 64]).unwrap();
    assert_eq!(format!("{a:?}"), format!("{b:?}"));
    assert_eq!(format!("{a:?}"), "Secret(***)");
    assert_eq!(format!("{a}"), "Secret(***)");
}

#[test]
fn base32_error_does_not_echo_input() {
    let input = "SECRETSECRETSECRET1";
    let err = Secret::from_base32(input).unwrap_err();
    assert!(matches!(err, OtpError::InvalidSecret(_)));
    assert!(!err.to_string().contains(input));
}
