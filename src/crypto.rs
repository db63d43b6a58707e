//! Protection of property values
//!
//! `CryptoGateway` is the seam to whatever capability actually protects
//! values. The pipeline only ever asks two questions of it: is this value
//! already protected, and what is its protected form.

use crate::error::{ProtectError, Result};
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// A value in protected form, ready to be written back to the repository
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtectedString(String);

impl ProtectedString {
    /// Wrap a value the caller knows to be protected
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for ProtectedString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProtectedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ProtectedString> for String {
    fn from(value: ProtectedString) -> Self {
        value.0
    }
}

/// Trait for the external protect/unprotect capability
pub trait CryptoGateway: Send + Sync {
    /// Whether `value` is already in protected form
    fn is_protected(&self, value: &str) -> Result<bool>;

    /// Transform plaintext into protected form
    ///
    /// The empty string is a valid input.
    fn protect(&self, value: &str) -> Result<ProtectedString>;

    /// Recover the plaintext of a protected value
    fn unprotect(&self, value: &str) -> Result<String>;
}

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Check that a key id can be embedded in a protected envelope
///
/// Ids must be non-empty and free of whitespace, `:`, `{` and `}`;
/// otherwise protected values would not be recognised as protected.
pub fn validate_key_id(key_id: &str) -> Result<()> {
    let invalid = |c: char| c.is_whitespace() || matches!(c, ':' | '{' | '}');
    if key_id.is_empty() || key_id.contains(invalid) {
        return Err(ProtectError::Config(format!("Invalid key id '{}'", key_id)));
    }
    Ok(())
}

/// Parsed `{<key_id>:<base64(nonce || ciphertext)>}` envelope
#[derive(Debug)]
struct Envelope<'a> {
    key_id: &'a str,
    body: Vec<u8>,
}

impl<'a> Envelope<'a> {
    /// `None` when the value does not have the envelope shape at all
    fn parse(value: &'a str) -> Option<Result<Self>> {
        let inner = value.strip_prefix('{')?.strip_suffix('}')?;
        let (key_id, encoded) = inner.split_once(':')?;
        if key_id.is_empty() || key_id.contains(char::is_whitespace) {
            return None;
        }

        let body = match BASE64.decode(encoded) {
            Ok(body) => body,
            Err(e) => {
                return Some(Err(ProtectError::Crypto(format!(
                    "Malformed protected value for key '{}': {}",
                    key_id, e
                ))))
            }
        };
        if body.len() < NONCE_LEN + TAG_LEN {
            return Some(Err(ProtectError::Crypto(format!(
                "Malformed protected value for key '{}': body too short",
                key_id
            ))));
        }

        Some(Ok(Self { key_id, body }))
    }

    fn encode(key_id: &str, nonce: &[u8], ciphertext: &[u8]) -> String {
        let mut body = Vec::with_capacity(nonce.len() + ciphertext.len());
        body.extend_from_slice(nonce);
        body.extend_from_slice(ciphertext);
        format!("{{{}:{}}}", key_id, BASE64.encode(body))
    }
}

/// AES-256-GCM gateway with key rotation support
///
/// Protects with the active key, unprotects with any registered key.
/// Every call uses a fresh random nonce, so protecting the same plaintext
/// twice yields different protected strings.
pub struct Aes256GcmGateway {
    /// Active key ID for protection
    active_key_id: String,

    /// All registered keys (key_id → cipher)
    keys: RwLock<HashMap<String, Aes256Gcm>>,
}

impl Aes256GcmGateway {
    /// Create a new gateway with a single key
    ///
    /// Fails if `key_id` is not a valid envelope key id.
    pub fn new(key_id: impl Into<String>, key: &[u8; 32]) -> Result<Self> {
        let key_id = key_id.into();
        validate_key_id(&key_id)?;
        let mut keys = HashMap::new();
        keys.insert(key_id.clone(), Aes256Gcm::new(key.into()));

        Ok(Self {
            active_key_id: key_id,
            keys: RwLock::new(keys),
        })
    }

    /// Add a key for unprotecting (key rotation)
    ///
    /// Old keys remain available for values protected before rotation.
    pub fn add_key(&self, key_id: impl Into<String>, key: &[u8; 32]) -> Result<()> {
        let key_id = key_id.into();
        validate_key_id(&key_id)?;
        let mut keys = self.keys.write().map_err(|e| {
            ProtectError::Crypto(format!("Failed to acquire key lock: {}", e))
        })?;
        keys.insert(key_id, Aes256Gcm::new(key.into()));
        Ok(())
    }

    /// Rotate to a new active key
    ///
    /// The new key must already be registered via `add_key()`.
    pub fn rotate_to(&mut self, key_id: &str) -> Result<()> {
        let keys = self.keys.read().map_err(|e| {
            ProtectError::Crypto(format!("Failed to acquire key lock: {}", e))
        })?;
        if !keys.contains_key(key_id) {
            return Err(ProtectError::Config(format!(
                "Key '{}' not registered, add it first",
                key_id
            )));
        }
        drop(keys);
        self.active_key_id = key_id.to_string();
        tracing::info!(key_id = %key_id, "Rotated active protection key");
        Ok(())
    }

    /// The key ID used for new protections
    pub fn active_key_id(&self) -> &str {
        &self.active_key_id
    }

    /// List all registered key IDs
    pub fn key_ids(&self) -> Vec<String> {
        self.keys
            .read()
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl CryptoGateway for Aes256GcmGateway {
    fn is_protected(&self, value: &str) -> Result<bool> {
        match Envelope::parse(value) {
            None => Ok(false),
            Some(parsed) => parsed.map(|_| true),
        }
    }

    fn protect(&self, value: &str) -> Result<ProtectedString> {
        let keys = self.keys.read().map_err(|e| {
            ProtectError::Crypto(format!("Failed to acquire key lock: {}", e))
        })?;
        let cipher = keys.get(&self.active_key_id).ok_or_else(|| {
            ProtectError::Crypto(format!("Active key '{}' not found", self.active_key_id))
        })?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, value.as_bytes())
            .map_err(|e| ProtectError::Crypto(format!("Encryption failed: {}", e)))?;

        Ok(ProtectedString(Envelope::encode(
            &self.active_key_id,
            &nonce,
            &ciphertext,
        )))
    }

    fn unprotect(&self, value: &str) -> Result<String> {
        let envelope = Envelope::parse(value)
            .ok_or_else(|| ProtectError::Crypto("Value is not protected".to_string()))??;

        let keys = self.keys.read().map_err(|e| {
            ProtectError::Crypto(format!("Failed to acquire key lock: {}", e))
        })?;
        let cipher = keys.get(envelope.key_id).ok_or_else(|| {
            ProtectError::Crypto(format!(
                "Decryption key '{}' not registered",
                envelope.key_id
            ))
        })?;

        let (nonce, ciphertext) = envelope.body.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| ProtectError::Crypto(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| ProtectError::Crypto(format!("Decrypted value is not UTF-8: {}", e)))
    }
}
