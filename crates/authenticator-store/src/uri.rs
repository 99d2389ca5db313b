//! `otpauth://` key URIs, as used in provisioning QR codes.
//!
//! Format (Google Authenticator key-URI format):
//! `otpauth://TYPE/ISSUER:ACCOUNT?secret=BASE32&issuer=ISSUER&algorithm=SHA1&digits=6&period=30`
//! with `counter=N` instead of `period` for HOTP.

use authenticator_core::{CodeLength, Digest, Secret, DEFAULT_PERIOD};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::error::StoreError;
use crate::token::{Token, TokenKind};

/// Characters left unescaped in labels and issuers: RFC 3986 unreserved.
const LABEL_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

// ── Parse ──────────────────────────────────────────────────────────

/// Parse an `otpauth://` URI into a new [`Token`].
///
/// Missing `algorithm`, `digits` and `period` fall back to SHA-1, 6 and 30;
/// a missing HOTP `counter` starts at 0. When both the label prefix and the
/// `issuer` parameter name an issuer, the parameter wins.
///
/// # Errors
///
/// Returns [`StoreError::InvalidUri`] for a wrong scheme, an unknown type,
/// an empty account name, a missing or malformed secret, or out-of-range
/// parameters.
pub fn parse_otpauth_uri(uri: &str) -> Result<Token, StoreError> {
    let url = Url::parse(uri.trim()).map_err(|e| StoreError::InvalidUri(e.to_string()))?;

    if url.scheme() != "otpauth" {
        return Err(StoreError::InvalidUri(format!(
            "expected scheme 'otpauth', got '{}'",
            url.scheme()
        )));
    }

    let kind = match url.host_str().map(str::to_ascii_lowercase).as_deref() {
        Some("totp") => TokenKind::Totp,
        Some("hotp") => TokenKind::Hotp,
        other => {
            return Err(StoreError::InvalidUri(format!("unknown OTP type {other:?}")));
        }
    };

    let (label_issuer, name) = split_label(raw_label(uri.trim()))?;
    if name.is_empty() {
        return Err(StoreError::InvalidUri("missing account name".into()));
    }

    let mut secret = None;
    let mut param_issuer = None;
    let mut digest = Digest::default();
    let mut length = CodeLength::default();
    let mut period = DEFAULT_PERIOD;
    let mut counter = 0u64;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "secret" => {
                secret = Some(
                    Secret::from_base32(&value)
                        .map_err(|e| StoreError::InvalidUri(e.to_string()))?,
                );
            }
            "issuer" => param_issuer = Some(value.trim().to_string()),
            "algorithm" => {
                digest =
                    Digest::from_name(&value).map_err(|e| StoreError::InvalidUri(e.to_string()))?;
            }
            "digits" => {
                let digits: u8 = value
                    .parse()
                    .map_err(|_| StoreError::InvalidUri(format!("bad digits {value:?}")))?;
                length =
                    CodeLength::new(digits).map_err(|e| StoreError::InvalidUri(e.to_string()))?;
            }
            "period" => {
                period = value
                    .parse()
                    .ok()
                    .filter(|p| *p > 0)
                    .ok_or_else(|| StoreError::InvalidUri(format!("bad period {value:?}")))?;
            }
            "counter" => {
                counter = value
                    .parse()
                    .map_err(|_| StoreError::InvalidUri(format!("bad counter {value:?}")))?;
            }
            _ => {}
        }
    }

    let secret = secret.ok_or_else(|| StoreError::InvalidUri("missing secret".into()))?;

    // Some providers percent-encode the separator too: `Example%3Aalice`
    // with `issuer=Example`.
    let name = match (&label_issuer, &param_issuer) {
        (None, Some(issuer)) if !issuer.is_empty() => name
            .strip_prefix(issuer.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .map(str::trim)
            .filter(|rest| !rest.is_empty())
            .map_or(name.clone(), str::to_string),
        _ => name,
    };

    let token = match kind {
        TokenKind::Totp => Token::totp(name, secret),
        TokenKind::Hotp => Token::hotp(name, secret, counter),
    };
    let token = token
        .with_digest(digest)
        .with_length(length)
        .with_period(period)?;

    Ok(match param_issuer.or(label_issuer) {
        Some(issuer) => token.with_issuer(issuer),
        None => token,
    })
}

/// The label exactly as written: everything between `otpauth://TYPE/` and
/// the query or fragment. `Url::path` cannot be used, since it collapses
/// `.` and `..` segments.
fn raw_label(uri: &str) -> &str {
    let rest = uri.split_once("://").map_or(uri, |(_, rest)| rest);
    rest.split(['?', '#'])
        .next()
        .and_then(|before_query| before_query.split_once('/'))
        .map_or("", |(_, label)| label)
}

/// Split a still-encoded label on its first literal `:` into issuer prefix
/// and account name, then decode each half. An escaped `%3A` stays part of
/// the half it appears in.
fn split_label(label: &str) -> Result<(Option<String>, String), StoreError> {
    let decode = |part: &str| {
        percent_decode_str(part)
            .decode_utf8()
            .map(|s| s.trim().to_string())
            .map_err(|e| StoreError::InvalidUri(format!("label is not UTF-8: {e}")))
    };
    match label.split_once(':') {
        Some((issuer, name)) => Ok((Some(decode(issuer)?), decode(name)?)),
        None => Ok((None, decode(label)?)),
    }
}

/// Parse one URI per line, skipping blank lines and `#` comments.
#[must_use]
pub fn parse_otpauth_uris(text: &str) -> Vec<Result<Token, StoreError>> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(parse_otpauth_uri)
        .collect()
}

// ── Build ──────────────────────────────────────────────────────────

/// Build the `otpauth://` URI for `token`. All parameters are written out
/// explicitly so importers that ignore defaults still agree.
///
/// The URI contains the secret in Base32: treat it like the secret itself.
#[must_use]
pub fn build_otpauth_uri(token: &Token) -> String {
    let name = utf8_percent_encode(token.name(), LABEL_ESCAPE);
    let kind = token.kind().uri_name();

    let secret = token.secret().to_base32();

    let mut uri = match token.issuer() {
        Some(issuer) => {
            let issuer = utf8_percent_encode(issuer, LABEL_ESCAPE).to_string();
            format!("otpauth://{kind}/{issuer}:{name}?secret={secret}&issuer={issuer}")
        }
        None => format!("otpauth://{kind}/{name}?secret={secret}"),
    };

    uri.push_str("&algorithm=");
    uri.push_str(token.digest().name());
    uri.push_str("&digits=");
    uri.push_str(&token.length().to_string());
    match token.kind() {
        TokenKind::Totp => {
            uri.push_str("&period=");
            uri.push_str(&token.period().to_string());
        }
        TokenKind::Hotp => {
            uri.push_str("&counter=");
            uri.push_str(&token.counter().to_string());
        }
    }
    uri
}
