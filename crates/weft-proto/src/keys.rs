//! Header string forms for keys, signatures, and hashes.
//!
//! Cryptographic material crosses the wire inside headers as URL-safe
//! base64 over the raw bytes. Keys and hashes are 32 bytes, signatures 64;
//! decoders reject anything else. The bytes themselves are opaque here;
//! verification is the router's job.

use base64::{Engine, engine::general_purpose::URL_SAFE};

use crate::WireError;

/// Verifying-key and hash length in bytes.
pub const KEY_LEN: usize = 32;

/// Signature length in bytes.
pub const SIG_LEN: usize = 64;

/// Format a 32-byte verifying key for a header.
pub fn fmt_key(key: &[u8]) -> String {
    URL_SAFE.encode(key)
}

/// Decode a verifying key, rejecting wrong lengths.
pub fn unfmt_key(key: &str) -> Result<Vec<u8>, WireError> {
    decode_exact(key, KEY_LEN)
}

/// Format a 64-byte signature for a header.
pub fn fmt_sig(sig: &[u8]) -> String {
    URL_SAFE.encode(sig)
}

/// Decode a signature, rejecting wrong lengths.
pub fn unfmt_sig(sig: &str) -> Result<Vec<u8>, WireError> {
    decode_exact(sig, SIG_LEN)
}

/// Format a 32-byte object hash for a header.
pub fn fmt_hash(hash: &[u8]) -> String {
    URL_SAFE.encode(hash)
}

/// Decode an object hash, rejecting wrong lengths.
pub fn unfmt_hash(hash: &str) -> Result<Vec<u8>, WireError> {
    decode_exact(hash, KEY_LEN)
}

fn decode_exact(s: &str, expected: usize) -> Result<Vec<u8>, WireError> {
    let bytes = URL_SAFE.decode(s)?;
    if bytes.len() != expected {
        return Err(WireError::BadByteLength { expected, actual: bytes.len() });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trip() {
        let key: Vec<u8> = (0..32).collect();
        assert_eq!(unfmt_key(&fmt_key(&key)).unwrap(), key);
    }

    #[test]
    fn sig_round_trip() {
        let sig: Vec<u8> = (0..64).collect();
        assert_eq!(unfmt_sig(&fmt_sig(&sig)).unwrap(), sig);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let short = URL_SAFE.encode([0u8; 16]);
        assert_eq!(
            unfmt_key(&short),
            Err(WireError::BadByteLength { expected: 32, actual: 16 })
        );
        let key_sized = URL_SAFE.encode([0u8; 32]);
        assert!(unfmt_sig(&key_sized).is_err());
    }

    #[test]
    fn damaged_base64_is_rejected() {
        assert!(matches!(unfmt_hash("not/base64!"), Err(WireError::Base64(_))));
    }
}
