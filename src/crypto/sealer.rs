//! At-rest sealing of secret keys with AES-256-GCM.
//!
//! Sealed layout: `nonce (12 bytes) ‖ tag (16 bytes) ‖ ciphertext`.
//! The prefix is fixed-width, so no length field is stored.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce, Tag};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// AES-GCM nonce length (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length (128 bits).
pub const TAG_LEN: usize = 16;

/// Derived symmetric key length (256 bits).
pub const KEY_LEN: usize = 32;

/// Errors raised while sealing or unsealing.
#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed: sealed secret was tampered with or the key is wrong")]
    Authentication,

    #[error("Malformed sealed secret: {len} bytes, expected at least {min}")]
    Format { len: usize, min: usize },
}

/// An opaque sealed secret, safe to store at rest.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedSecret(Vec<u8>);

impl SealedSecret {
    /// Wraps a stored blob, checking it is long enough to hold the fixed prefix.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SealError> {
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(SealError::Format {
                len: bytes.len(),
                min: NONCE_LEN + TAG_LEN,
            });
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn nonce(&self) -> &[u8] {
        &self.0[..NONCE_LEN]
    }

    pub fn tag(&self) -> &[u8] {
        &self.0[NONCE_LEN..NONCE_LEN + TAG_LEN]
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.0[NONCE_LEN + TAG_LEN..]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SealedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SealedSecret({} bytes)", self.0.len())
    }
}

/// Seals and unseals secrets under one master key.
#[derive(Clone)]
pub struct SecretSealer {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl SecretSealer {
    /// Builds a sealer from operator-supplied key material.
    ///
    /// Accepted forms, in order:
    /// 1. 64 hex characters, decoded to 32 bytes
    /// 2. base64 that decodes to exactly 32 bytes
    /// 3. exactly 32 raw bytes, used as-is
    /// 4. anything else is treated as a passphrase and hashed with SHA-256
    pub fn from_material(material: &str) -> Result<Self, SealError> {
        if material.is_empty() {
            return Err(SealError::Configuration(
                "master key material is empty".into(),
            ));
        }
        Ok(Self {
            key: derive_key(material.as_bytes()),
        })
    }

    /// Like [`SecretSealer::from_material`], treating absent material as a
    /// configuration error.
    pub fn from_optional_material(material: Option<&str>) -> Result<Self, SealError> {
        match material {
            Some(m) => Self::from_material(m),
            None => Err(SealError::Configuration(
                "master key material is not set".into(),
            )),
        }
    }

    /// Encrypts `secret` under a fresh random nonce.
    pub fn seal(&self, secret: &[u8]) -> Result<SealedSecret, SealError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_slice()));

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let mut out = Vec::with_capacity(NONCE_LEN + TAG_LEN + secret.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&[0u8; TAG_LEN]);
        out.extend_from_slice(secret);

        let tag = cipher
            .encrypt_in_place_detached(
                Nonce::from_slice(&nonce),
                b"",
                &mut out[NONCE_LEN + TAG_LEN..],
            )
            .map_err(|_| SealError::Configuration("AES-GCM encryption failed".into()))?;
        out[NONCE_LEN..NONCE_LEN + TAG_LEN].copy_from_slice(tag.as_slice());

        Ok(SealedSecret(out))
    }

    /// Decrypts a sealed secret, verifying its tag before returning anything.
    pub fn unseal(&self, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>, SealError> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(SealError::Format {
                len: sealed.len(),
                min: NONCE_LEN + TAG_LEN,
            });
        }

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_slice()));
        let nonce = Nonce::from_slice(&sealed[..NONCE_LEN]);
        let tag = Tag::from_slice(&sealed[NONCE_LEN..NONCE_LEN + TAG_LEN]);

        let mut plaintext = Zeroizing::new(sealed[NONCE_LEN + TAG_LEN..].to_vec());
        cipher
            .decrypt_in_place_detached(nonce, b"", plaintext.as_mut_slice(), tag)
            .map_err(|_| SealError::Authentication)?;

        Ok(plaintext)
    }
}

impl std::fmt::Debug for SecretSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretSealer(<redacted>)")
    }
}

/// Seals `secret` under key material in one call.
pub fn seal(secret: &[u8], material: &str) -> Result<SealedSecret, SealError> {
    SecretSealer::from_material(material)?.seal(secret)
}

/// Unseals `sealed` under key material in one call.
pub fn unseal(sealed: &[u8], material: &str) -> Result<Zeroizing<Vec<u8>>, SealError> {
    SecretSealer::from_material(material)?.unseal(sealed)
}

fn derive_key(material: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);

    if material.len() == KEY_LEN * 2 {
        if let Ok(decoded) = hex::decode(material) {
            key.copy_from_slice(&decoded);
            return key;
        }
    }

    if (43..=44).contains(&material.len()) {
        if let Some(decoded) = decode_base64_key(material) {
            key.copy_from_slice(&decoded[..]);
            return key;
        }
    }

    if material.len() == KEY_LEN {
        key.copy_from_slice(material);
        return key;
    }

    key.copy_from_slice(&Sha256::digest(material));
    key
}

fn decode_base64_key(material: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
    use base64::engine::general_purpose::STANDARD_NO_PAD;

    let decoded = BASE64
        .decode(material)
        .or_else(|_| STANDARD_NO_PAD.decode(material))
        .ok()
        .map(Zeroizing::new)?;
    (decoded.len() == KEY_LEN).then_some(decoded)
}
