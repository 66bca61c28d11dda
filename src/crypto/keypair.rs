//! Ed25519 keypair generation.

use ed25519_dalek::{SigningKey, KEYPAIR_LENGTH, SECRET_KEY_LENGTH};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use super::address::encode_address;

/// Length of a Solana secret key (32-byte seed followed by the 32-byte public key).
pub const SECRET_KEY_LEN: usize = KEYPAIR_LENGTH;

/// A freshly generated keypair and its base-58 address.
#[derive(Clone)]
pub struct Keypair {
    /// The Ed25519 signing key (zeroized on drop)
    signing_key: SigningKey,
    /// The derived base-58 address
    public_id: String,
}

impl Keypair {
    /// Generates a new random keypair.
    ///
    /// Uses the thread-local CSPRNG, which is seeded from the operating system.
    #[inline]
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    /// Generates a new random keypair from the given CSPRNG.
    #[inline]
    pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_signing_key(SigningKey::generate(rng))
    }

    /// Wraps an existing signing key.
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_id = encode_address(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            public_id,
        }
    }

    /// Builds a keypair from a 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(seed))
    }

    /// Returns the base-58 address.
    #[inline]
    pub fn public_id(&self) -> &str {
        &self.public_id
    }

    /// Returns the raw 32-byte public key.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Returns the 64-byte secret key in Solana layout (seed ‖ public key).
    pub fn secret_key_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_LEN]> {
        Zeroizing::new(self.signing_key.to_keypair_bytes())
    }

    /// Consumes the keypair into a transient search candidate.
    pub fn into_candidate(self) -> KeypairCandidate {
        KeypairCandidate {
            secret_key: self.secret_key_bytes(),
            public_id: self.public_id,
        }
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_id", &self.public_id)
            .finish_non_exhaustive()
    }
}

/// A matched keypair on its way to the sealer. Never persisted in this form.
pub struct KeypairCandidate {
    pub public_id: String,
    pub secret_key: Zeroizing<[u8; SECRET_KEY_LEN]>,
}

impl std::fmt::Debug for KeypairCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypairCandidate")
            .field("public_id", &self.public_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
