// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

/// Maximum byte length of client id accepted here.
///
/// The specification only guarantees 1 to 23 bytes, but almost every broker
/// accepts longer ids, so the limit is relaxed to 255 bytes.
pub const MAX_CLIENT_ID_LEN: usize = 255;

/// Generate a random alphanumeric string with `len` chars.
#[must_use]
pub fn random_string(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringError {
    TooManyData,
    InvalidChar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientIdError {
    IsEmpty,
    TooLong,
}

/// Check string data requirements.
///
/// The character data in a UTF-8 Encoded String MUST be well-formed UTF-8
/// as defined by the Unicode specification and restated in RFC 3629.
/// In particular it MUST NOT include encodings of code points between
/// U+D800 and U+DFFF [MQTT-1.5.3-1], and MUST NOT include an encoding of
/// the null character U+0000 [MQTT-1.5.3-2].
///
/// # Errors
///
/// Returns error if `s` is longer than 64k or contains null characters.
pub fn validate_utf8_string(s: &str) -> Result<(), StringError> {
    if s.len() > u16::MAX as usize {
        return Err(StringError::TooManyData);
    }
    if s.chars().any(|c| c == '\u{0000}') {
        return Err(StringError::InvalidChar);
    }
    Ok(())
}

/// Convert byte slice into a checked UTF-8 string.
///
/// # Errors
///
/// Returns error if `bytes` is not a valid string.
pub fn to_utf8_string(bytes: &[u8]) -> Result<String, StringError> {
    let s = String::from_utf8(bytes.to_vec()).map_err(|_err| StringError::InvalidChar)?;
    validate_utf8_string(&s)?;
    Ok(s)
}

/// Check length of binary data fields with a two byte length prefix.
///
/// # Errors
///
/// Returns error if `data` is longer than 64k.
pub fn validate_two_bytes_data(data: &[u8]) -> Result<(), StringError> {
    if data.len() > u16::MAX as usize {
        Err(StringError::TooManyData)
    } else {
        Ok(())
    }
}

/// Check client id requirements.
///
/// An empty client id is only valid together with a clean session flag,
/// so emptiness is checked by the caller which knows that flag.
///
/// # Errors
///
/// Returns error if `client_id` is too long.
pub fn validate_client_id(client_id: &str) -> Result<(), ClientIdError> {
    if client_id.len() > MAX_CLIENT_ID_LEN {
        return Err(ClientIdError::TooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_string() {
        let s = random_string(8);
        assert_eq!(s.len(), 8);
        assert!(s.chars().all(char::is_alphanumeric));
    }

    #[test]
    fn test_validate_utf8_string() {
        assert!(validate_utf8_string("mqtt/test").is_ok());
        assert_eq!(
            validate_utf8_string("bad\u{0000}str"),
            Err(StringError::InvalidChar)
        );
    }

    #[test]
    fn test_validate_client_id() {
        assert!(validate_client_id("mqtt").is_ok());
        let long_id = "a".repeat(256);
        assert_eq!(validate_client_id(&long_id), Err(ClientIdError::TooLong));
    }
}
