//! Message cryptor for WeChat Official Account callbacks.
//!
//! Implements the platform's secure-envelope scheme:
//! - SHA1 signature over sorted parts (URL verification and message signing)
//! - AES-256-CBC with the 43-char EncodingAESKey (key = base64(key + "="),
//!   iv = first 16 bytes of the key), auto-padding disabled
//! - the inner envelope `random(16) | msg_len(4, BE) | msg | appid`, padded
//!   to 32 bytes with [`Pkcs7Padding`]
//!
//! A decrypted envelope whose trailing appid differs from the configured one
//! is an expected branch (a message addressed to someone else, or a forgery),
//! not an error: `decrypt` reports it as [`Decrypted::ReceiverMismatch`] so
//! callers must handle it explicitly, separate from cipher-level failures.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::debug;

use aes::Aes256;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::padding::Pkcs7Padding;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid cryptor configuration: {0}")]
    Config(&'static str),
    #[error("invalid base64: {0}")]
    Base64(String),
    #[error("invalid aes key length: {0} bytes, expected 32")]
    InvalidKeyLength(usize),
    #[error("cipher error")]
    Cipher,
    #[error("utf8 decode error: {0}")]
    Utf8(String),
    #[error("bad envelope format")]
    BadEnvelope,
}

/// Outcome of [`MsgCrypt::decrypt`].
///
/// `ReceiverMismatch` is deliberately a value, not an error variant: it maps
/// to the same HTTP 400 as a signature mismatch but is detected after
/// decryption, and callers (and their logs) keep the two distinguishable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decrypted {
    /// Envelope was addressed to the configured appid; inner message text.
    Message(String),
    /// Envelope decrypted cleanly but carries a different appid.
    ReceiverMismatch,
}

/// Compute SHA1 signature by sorting parts lexicographically and concatenating.
pub fn sha1_signature(parts: &[&str]) -> String {
    let mut v = parts.to_vec();
    v.sort_unstable();
    let mut hasher = Sha1::new();
    for p in v {
        hasher.update(p.as_bytes());
    }
    let digest = hasher.finalize();
    // lowercase hex
    let mut s = String::with_capacity(digest.len() * 2);
    for b in digest {
        use core::fmt::Write;
        let _ = write!(&mut s, "{:02x}", b);
    }
    s
}

/// Signature for plain (unencrypted) URL verification: no payload element.
pub fn url_signature(token: &str, timestamp: &str, nonce: &str) -> String {
    sha1_signature(&[token, timestamp, nonce])
}

/// Stateless cryptor for one Official Account.
///
/// Key, IV and appid are fixed at construction and never mutated, so a
/// single instance is safe to share across concurrent requests.
#[derive(Clone)]
pub struct MsgCrypt {
    appid: String,
    token: String,
    key: [u8; 32],
    padding: Pkcs7Padding,
}

impl MsgCrypt {
    /// Create a cryptor from the appid, callback Token and 43-char
    /// EncodingAESKey, with the platform's default 32-byte padding block.
    pub fn new(appid: &str, token: &str, encoding_aes_key: &str) -> Result<Self, CryptoError> {
        Self::with_padding(appid, token, encoding_aes_key, Pkcs7Padding::default())
    }

    /// Same as [`MsgCrypt::new`] but with an explicit padding block size.
    pub fn with_padding(
        appid: &str,
        token: &str,
        encoding_aes_key: &str,
        padding: Pkcs7Padding,
    ) -> Result<Self, CryptoError> {
        if appid.is_empty() {
            return Err(CryptoError::Config("appid must not be empty"));
        }
        if token.is_empty() {
            return Err(CryptoError::Config("token must not be empty"));
        }
        if encoding_aes_key.is_empty() {
            return Err(CryptoError::Config("encoding_aes_key must not be empty"));
        }
        let key = decode_aes_key(encoding_aes_key)?;
        Ok(Self {
            appid: appid.to_string(),
            token: token.to_string(),
            key,
            padding,
        })
    }

    /// The configured application identifier.
    pub fn appid(&self) -> &str {
        &self.appid
    }

    /// Signature over {token, timestamp, nonce, payload}, where `payload` is
    /// the encrypted echostr (handshake) or the base64 ciphertext (delivery).
    pub fn signature(&self, timestamp: &str, nonce: &str, payload: &str) -> String {
        let signature = sha1_signature(&[&self.token, timestamp, nonce, payload]);
        debug!(timestamp, nonce, signature, "computed message signature");
        signature
    }

    /// Encrypt a message into a base64 envelope.
    ///
    /// A fresh random 16-byte nonce prefixes every envelope, so two calls
    /// with the same message yield different ciphertext.
    pub fn encrypt(&self, message: &str) -> Result<String, CryptoError> {
        let mut random = [0u8; 16];
        rand::rng().fill_bytes(&mut random);

        let msg = message.as_bytes();
        let mut envelope = Vec::with_capacity(20 + msg.len() + self.appid.len());
        envelope.extend_from_slice(&random);
        envelope.extend_from_slice(&(msg.len() as u32).to_be_bytes());
        envelope.extend_from_slice(msg);
        envelope.extend_from_slice(self.appid.as_bytes());

        // Padding is the envelope's own scheme, the cipher runs unpadded.
        let mut buf = self.padding.pad(&envelope);
        let len = buf.len();
        let cipher = Aes256CbcEnc::new_from_slices(&self.key, &self.key[..16])
            .map_err(|_| CryptoError::Cipher)?;
        cipher
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map_err(|_| CryptoError::Cipher)?;

        Ok(BASE64.encode(&buf))
    }

    /// Decrypt a base64 envelope and check the trailing receiver appid.
    pub fn decrypt(&self, ciphered: &str) -> Result<Decrypted, CryptoError> {
        let mut buf = decode_b64_lenient(ciphered)?;
        if buf.is_empty() || buf.len() % 16 != 0 {
            return Err(CryptoError::BadEnvelope);
        }

        let cipher = Aes256CbcDec::new_from_slices(&self.key, &self.key[..16])
            .map_err(|_| CryptoError::Cipher)?;
        cipher
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| CryptoError::Cipher)?;

        let plaintext = self.padding.unpad(&buf);
        if plaintext.len() < 20 {
            return Err(CryptoError::BadEnvelope);
        }

        // Skip the 16-byte random prefix, then 4-byte BE message length.
        let content = &plaintext[16..];
        let msg_len = u32::from_be_bytes([content[0], content[1], content[2], content[3]]) as usize;
        if content.len() < 4 + msg_len {
            return Err(CryptoError::BadEnvelope);
        }

        let msg = &content[4..4 + msg_len];
        let receiver = &content[4 + msg_len..];
        if receiver != self.appid.as_bytes() {
            debug!(
                expected = %self.appid,
                got = %String::from_utf8_lossy(receiver),
                "decrypted envelope addressed to a different appid"
            );
            return Ok(Decrypted::ReceiverMismatch);
        }

        let message =
            String::from_utf8(msg.to_vec()).map_err(|e| CryptoError::Utf8(e.to_string()))?;
        Ok(Decrypted::Message(message))
    }
}

/// Decode the EncodingAESKey (43 chars).
/// The AES key is base64(EncodingAESKey + "=") -> 32 bytes.
fn decode_aes_key(encoding_aes_key: &str) -> Result<[u8; 32], CryptoError> {
    let key_b64 = if encoding_aes_key.ends_with('=') {
        encoding_aes_key.to_string()
    } else {
        // The official key is 43 chars and needs one '=' padding
        let mut s = encoding_aes_key.to_string();
        s.push('=');
        s
    };
    let key = BASE64
        .decode(key_b64.as_bytes())
        .map_err(|e| CryptoError::Base64(e.to_string()))?;
    let len = key.len();
    key.as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength(len))
}

/// Normalize and decode base64: tolerates the URL-safe alphabet
/// ('-' -> '+', '_' -> '/') and missing padding.
fn decode_b64_lenient(input: &str) -> Result<Vec<u8>, CryptoError> {
    let mut t = input.trim().replace('-', "+").replace('_', "/");
    match t.len() % 4 {
        2 => t.push_str("=="),
        3 => t.push('='),
        1 => t.push_str("==="),
        _ => {}
    }
    BASE64
        .decode(t.as_bytes())
        .map_err(|e| CryptoError::Base64(e.to_string()))
}
