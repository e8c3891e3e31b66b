// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! URL-safe base64 used by every session token segment.
//!
//! Encoding uses the URL alphabet (`-`, `_`) without padding. Decoding
//! restores `=` padding to a multiple of four before running the padded
//! decoder, so tokens minted by clients that strip or keep padding both
//! decode the same way.

use base64ct::{Base64Url, Base64UrlUnpadded, Encoding};

/// Malformed base64 input (bad alphabet or truncated quantum).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid url-safe base64: {0}")]
pub struct DecodeError(String);

/// Encode bytes as unpadded URL-safe base64.
pub fn encode_url_safe_base64(bytes: &[u8]) -> String {
    Base64UrlUnpadded::encode_string(bytes)
}

/// Decode URL-safe base64, restoring any stripped `=` padding first.
pub fn decode_url_safe_base64(input: &str) -> Result<Vec<u8>, DecodeError> {
    let missing = (4 - input.len() % 4) % 4;
    let mut padded = String::with_capacity(input.len() + missing);
    padded.push_str(input);
    padded.extend(std::iter::repeat_n('=', missing));

    Base64Url::decode_vec(&padded).map_err(|e| DecodeError(e.to_string()))
}
