//! Solana address (base-58 public key) encoding.

/// Length of a raw Ed25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Longest possible base-58 encoding of a 32-byte public key.
pub const MAX_ADDRESS_LEN: usize = 44;

/// The base-58 alphabet used by Solana (Bitcoin ordering).
pub const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Encodes a public key as a base-58 address.
#[inline]
pub fn encode_address(public_key: &[u8; PUBLIC_KEY_LEN]) -> String {
    let mut out = String::with_capacity(MAX_ADDRESS_LEN);
    encode_address_into(public_key, &mut out);
    out
}

/// Encodes a public key into `buf`, replacing its contents.
///
/// Lets the search loop reuse one buffer instead of allocating per candidate.
#[inline]
pub fn encode_address_into(public_key: &[u8; PUBLIC_KEY_LEN], buf: &mut String) {
    buf.clear();
    // A String target grows as needed, so this cannot fail.
    let _ = bs58::encode(public_key).onto(&mut *buf);
}

/// Decodes a base-58 address back to its raw public key bytes.
pub fn decode_address(address: &str) -> Option<[u8; PUBLIC_KEY_LEN]> {
    let bytes = bs58::decode(address).into_vec().ok()?;
    bytes.try_into().ok()
}

/// Returns true if every character of `s` is in the base-58 alphabet.
pub fn is_base58(s: &str) -> bool {
    s.chars().all(|c| BASE58_ALPHABET.contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_key_encoding() {
        // The all-zero key is the System Program id.
        let addr = encode_address(&[0u8; PUBLIC_KEY_LEN]);
        assert_eq!(addr, "11111111111111111111111111111111");
    }

    #[test]
    fn test_encode_into_reuses_buffer() {
        let mut buf = String::from("stale contents");
        encode_address_into(&[0u8; PUBLIC_KEY_LEN], &mut buf);
        assert_eq!(buf, "11111111111111111111111111111111");

        encode_address_into(&[0xff; PUBLIC_KEY_LEN], &mut buf);
        assert_eq!(buf, encode_address(&[0xff; PUBLIC_KEY_LEN]));
        assert!(buf.len() <= MAX_ADDRESS_LEN);
    }

    #[test]
    fn test_decode_roundtrip() {
        let key = [7u8; PUBLIC_KEY_LEN];
        let addr = encode_address(&key);
        assert_eq!(decode_address(&addr), Some(key));
        assert_eq!(decode_address("0OIl"), None);
    }

    #[test]
    fn test_base58_alphabet() {
        assert!(is_base58("SNOW"));
        assert!(is_base58("SB"));
        assert!(!is_base58("0x"));
        assert!(!is_base58("IOl"));
        assert_eq!(BASE58_ALPHABET.len(), 58);
    }
}
