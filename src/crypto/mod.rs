//! Cryptographic operations for the vanity keypair pool.
//!
//! This module provides:
//! - Ed25519 keypair generation from a CSPRNG
//! - Base-58 (Solana) address encoding
//! - AES-256-GCM sealing of secret keys before they reach storage

mod address;
mod keypair;
mod sealer;

pub use address::{
    decode_address, encode_address, encode_address_into, is_base58, BASE58_ALPHABET,
    MAX_ADDRESS_LEN, PUBLIC_KEY_LEN,
};
pub use keypair::{Keypair, KeypairCandidate, SECRET_KEY_LEN};
pub use sealer::{seal, unseal, SealError, SealedSecret, SecretSealer, NONCE_LEN, TAG_LEN};
