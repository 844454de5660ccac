//! Encrypted capability tokens for level2 job targets.
//!
//! A token is `base64url(nonce[16] || tag[16] || ciphertext)` where the
//! ciphertext is AES-EAX over the JSON payload `{"ScanID", "FreqMode",
//! "Project"}`. Only holders of the shared secret can read or forge one, so
//! the token is both the address and the access check for a job's result
//! submission. Encoding and decoding are pure; no state is kept anywhere.

use std::fmt;

use aes::{Aes128, Aes192, Aes256};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD, URL_SAFE};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use eax::aead::generic_array::GenericArray;
use eax::aead::{AeadCore, AeadInPlace, KeyInit, OsRng};
use eax::Eax;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 16;

/// Accepts tokens with or without trailing padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors from token encoding and decoding.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Secret is not base64 or has an unsupported length.
    #[error("Invalid secret key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed")]
    Encrypt,

    /// Token is not base64url or is too short.
    #[error("Malformed token: {0}")]
    Decode(String),

    /// Authentication tag did not verify (wrong key or tampered token).
    #[error("Token verification failed")]
    Verification,

    /// Decrypted payload is not the expected JSON.
    #[error("Invalid token payload: {0}")]
    Payload(String),
}

/// What a level2 target token carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPayload {
    #[serde(rename = "ScanID")]
    pub scan_id: i64,
    #[serde(rename = "FreqMode")]
    pub freqmode: u32,
    #[serde(rename = "Project")]
    pub project: String,
}

#[derive(Clone)]
enum Cipher {
    Aes128(Eax<Aes128>),
    Aes192(Eax<Aes192>),
    Aes256(Eax<Aes256>),
}

impl Cipher {
    fn from_secret(secret: &str) -> Result<Self, TokenError> {
        let key = STANDARD
            .decode(secret.trim())
            .map_err(|e| TokenError::InvalidKey(e.to_string()))?;

        let invalid = |_| TokenError::InvalidKey("key rejected by cipher".to_string());
        match key.len() {
            16 => Ok(Cipher::Aes128(Eax::new_from_slice(&key).map_err(invalid)?)),
            24 => Ok(Cipher::Aes192(Eax::new_from_slice(&key).map_err(invalid)?)),
            32 => Ok(Cipher::Aes256(Eax::new_from_slice(&key).map_err(invalid)?)),
            n => Err(TokenError::InvalidKey(format!(
                "expected a 16, 24 or 32 byte key, got {} bytes",
                n
            ))),
        }
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, TokenError> {
        match self {
            Cipher::Aes128(c) => seal(c, plaintext),
            Cipher::Aes192(c) => seal(c, plaintext),
            Cipher::Aes256(c) => seal(c, plaintext),
        }
    }

    fn open(&self, blob: &[u8]) -> Result<Vec<u8>, TokenError> {
        match self {
            Cipher::Aes128(c) => open(c, blob),
            Cipher::Aes192(c) => open(c, blob),
            Cipher::Aes256(c) => open(c, blob),
        }
    }

    fn encrypt_token(&self, plaintext: &[u8]) -> Result<String, TokenError> {
        Ok(URL_SAFE.encode(self.seal(plaintext)?))
    }

    fn decrypt_token(&self, token: &str) -> Result<Vec<u8>, TokenError> {
        let blob = URL_SAFE_LENIENT
            .decode(token.trim())
            .map_err(|e| TokenError::Decode(e.to_string()))?;
        self.open(&blob)
    }
}

fn seal<C: AeadInPlace>(cipher: &C, plaintext: &[u8]) -> Result<Vec<u8>, TokenError> {
    // Fresh random nonce on every call.
    let nonce = C::generate_nonce(&mut OsRng);
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(&nonce, b"", &mut buffer)
        .map_err(|_| TokenError::Encrypt)?;

    let mut out = Vec::with_capacity(nonce.len() + tag.len() + buffer.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&tag);
    out.extend_from_slice(&buffer);
    Ok(out)
}

fn open<C: AeadInPlace>(cipher: &C, blob: &[u8]) -> Result<Vec<u8>, TokenError> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(TokenError::Decode(format!(
            "token is {} bytes, shorter than nonce and tag",
            blob.len()
        )));
    }
    let (nonce, rest) = blob.split_at(NONCE_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            b"",
            &mut buffer,
            GenericArray::from_slice(tag),
        )
        .map_err(|_| TokenError::Verification)?;
    Ok(buffer)
}

/// Encrypt `plaintext` under the base64 `secret` into a token.
pub fn encrypt(plaintext: &[u8], secret: &str) -> Result<String, TokenError> {
    Cipher::from_secret(secret)?.encrypt_token(plaintext)
}

/// Reverse of [`encrypt`]; fails on a wrong secret or a modified token.
pub fn decrypt(token: &str, secret: &str) -> Result<Vec<u8>, TokenError> {
    Cipher::from_secret(secret)?.decrypt_token(token)
}

/// Builds and reads level2 submit addresses for one secret.
#[derive(Clone)]
pub struct JobAddressEncoder {
    cipher: Cipher,
    api_root: String,
}

impl fmt::Debug for JobAddressEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobAddressEncoder")
            .field("cipher", &"<redacted>")
            .field("api_root", &self.api_root)
            .finish()
    }
}

impl JobAddressEncoder {
    /// Create an encoder from base64 key text and the API root that hosts
    /// the submit endpoint.
    pub fn new(secret: &str, api_root: &str) -> Result<Self, TokenError> {
        Ok(Self {
            cipher: Cipher::from_secret(secret)?,
            api_root: api_root.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Encrypt a serialized payload into a token.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, TokenError> {
        self.cipher.encrypt_token(plaintext)
    }

    /// Decrypt and verify a token.
    pub fn decrypt(&self, token: &str) -> Result<Vec<u8>, TokenError> {
        self.cipher.decrypt_token(token)
    }

    /// The token for one job's target.
    pub fn encode_target_token(
        &self,
        scan_id: i64,
        freqmode: u32,
        project: &str,
    ) -> Result<String, TokenError> {
        let payload = TargetPayload {
            scan_id,
            freqmode,
            project: project.to_string(),
        };
        let json = serde_json::to_vec(&payload).map_err(|e| TokenError::Payload(e.to_string()))?;
        self.encrypt(&json)
    }

    /// Submit address for one job: `<api_root>/v5/level2?d=<token>`.
    pub fn encode_target(
        &self,
        scan_id: i64,
        freqmode: u32,
        project: &str,
    ) -> Result<String, TokenError> {
        let token = self.encode_target_token(scan_id, freqmode, project)?;
        Ok(format!("{}/v5/level2?d={}", self.api_root, token))
    }

    /// Read a target back, from either a full submit address or a bare token.
    pub fn decode_target(&self, target: &str) -> Result<TargetPayload, TokenError> {
        let token = extract_token(target);
        let plaintext = self.decrypt(token)?;
        serde_json::from_slice(&plaintext).map_err(|e| TokenError::Payload(e.to_string()))
    }
}

fn extract_token(target: &str) -> &str {
    match target.split_once('?') {
        Some((_, query)) => query
            .split('&')
            .find_map(|pair| pair.strip_prefix("d="))
            .unwrap_or(""),
        None => target,
    }
}
