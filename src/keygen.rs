//! Credential generation for Official Account callbacks.
//!
//! Generates the two secrets an account owner pastes into the developer
//! console:
//! - Token: an alphanumeric string (default 32 chars; max 32), used for the
//!   SHA1 URL signature.
//! - EncodingAESKey: a 43-character Base64 string (letters/digits only, no
//!   padding) that decodes to exactly 32 bytes once a single '=' is
//!   appended. Seeds the AES-256 message cryptor.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use rand::RngCore;

const ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate an alphanumeric Token of given length (default 32; allowed 1..=32).
pub fn generate_token(len: usize) -> String {
    let len = if len == 0 || len > 32 { 32 } else { len };
    let mut buf = vec![0u8; len];
    rand::rng().fill_bytes(&mut buf);
    buf.iter()
        .map(|&b| ALNUM[b as usize % ALNUM.len()] as char)
        .collect()
}

/// Generate a 43-character EncodingAESKey from 32 random bytes.
///
/// The console only accepts [A-Za-z0-9], so keys whose Base64 form contains
/// '+' or '/' are rejected and redrawn.
pub fn generate_encoding_aes_key() -> String {
    loop {
        let mut key_bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut key_bytes);

        let trimmed = STANDARD_NO_PAD.encode(key_bytes);
        if trimmed.len() == 43 && trimmed.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return trimmed;
        }
    }
}

/// Verify the EncodingAESKey format: exactly 43 characters that decode to
/// 32 bytes after appending '='.
pub fn verify_encoding_aes_key(key: &str) -> bool {
    if key.len() != 43 {
        return false;
    }
    match STANDARD.decode(format!("{key}=").as_bytes()) {
        Ok(bytes) => bytes.len() == 32,
        Err(_) => false,
    }
}
