//! Ethereum signature verification
//!
//! Recovers the signer address from an EIP-191 personal-message signature
//! and checks it against a claimed address. Also hosts the CSPRNG helpers
//! for nonces and refresh secrets.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;
use sha2::Sha256;
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Challenge message template. Protocol constant shared with the client;
/// must match byte-for-byte on both sides.
pub const CHALLENGE_PREFIX: &str = "Sign this message to confirm your identity: ";

/// EIP-191 personal-message prefix applied by wallets before signing.
const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Errors that can occur during signature verification
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Signature recovery failed")]
    RecoveryFailed,
}

/// Build the canonical challenge message for a nonce.
pub fn challenge_message(nonce: &str) -> String {
    format!("{}{}", CHALLENGE_PREFIX, nonce)
}

/// Check `0x` + 40 hex characters (20-byte address, any case).
pub fn is_valid_address(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Check `0x` + 130 hex characters (65 raw bytes: r, s, v).
pub fn is_valid_signature(signature: &str) -> bool {
    signature.len() == 132
        && signature.starts_with("0x")
        && signature[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Normalize an address to its canonical lowercase form.
pub fn normalize_address(address: &str) -> String {
    address.to_ascii_lowercase()
}

/// Keccak-256 digest of the EIP-191 prefixed message.
pub fn personal_message_hash(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_MESSAGE_PREFIX.as_bytes());
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

/// Derive the lowercase `0x` address for a secp256k1 public key.
pub fn address_from_verifying_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 uncompressed-point tag; address is the last 20 bytes
    // of the keccak256 of the raw 64-byte public key.
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&digest[12..]))
}

/// Recover the signer address from a message and a `0x`-hex signature.
pub fn recover_address(message: &str, signature: &str) -> Result<String, CryptoError> {
    if !is_valid_signature(signature) {
        return Err(CryptoError::InvalidSignatureFormat(
            "expected 0x + 130 hex characters".to_string(),
        ));
    }

    let bytes = hex::decode(&signature[2..])
        .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;

    let mut sig =
        Signature::from_slice(&bytes[..64]).map_err(|_| CryptoError::RecoveryFailed)?;

    // Wallets emit v as 27/28; raw recovery ids 0/1 are also accepted.
    let v = bytes[64];
    let mut rec_byte = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        _ => {
            return Err(CryptoError::InvalidSignatureFormat(format!(
                "unsupported recovery id: {}",
                v
            )))
        }
    };

    // Low-s normalization flips the recovery id parity (EIP-2).
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        rec_byte ^= 1;
    }

    let recovery_id = RecoveryId::from_byte(rec_byte).ok_or(CryptoError::RecoveryFailed)?;

    let digest = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;

    Ok(address_from_verifying_key(&key))
}

/// Verify that `signature` over the challenge for `nonce` was produced by
/// the key behind `claimed_address`. Comparison is case-insensitive.
///
/// Fails closed: any malformed input or recovery error is a plain `false`,
/// never a panic or a bypass.
pub fn verify_signature(claimed_address: &str, nonce: &str, signature: &str) -> bool {
    if !is_valid_address(claimed_address) {
        return false;
    }

    let message = challenge_message(nonce);
    match recover_address(&message, signature) {
        Ok(recovered) => recovered == normalize_address(claimed_address),
        Err(e) => {
            tracing::debug!(error = %e, "Signature recovery failed");
            false
        }
    }
}

/// Generate a single-use challenge nonce: 16 random bytes as 32 hex chars.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate an opaque refresh secret: 40 random bytes as 80 hex chars.
pub fn generate_refresh_secret() -> String {
    let mut bytes = [0u8; 40];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a refresh secret for storage and lookup.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    fn sign_message(key: &SigningKey, message: &str) -> String {
        let digest = personal_message_hash(message);
        let (sig, recovery_id) = key.sign_prehash_recoverable(&digest).unwrap();
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(27 + recovery_id.to_byte());
        format!("0x{}", hex::encode(bytes))
    }

    #[test]
    fn test_address_format_validation() {
        assert!(is_valid_address(
            "0x71c7656ec7ab88b098defb751b7401b5f6d8976f"
        ));
        assert!(is_valid_address(
            "0x71C7656EC7ab88b098defB751B7401B5f6d8976F"
        ));
        assert!(!is_valid_address("71c7656ec7ab88b098defb751b7401b5f6d8976f"));
        assert!(!is_valid_address("0x71c7656e"));
        assert!(!is_valid_address(
            "0xzzc7656ec7ab88b098defb751b7401b5f6d8976f"
        ));
        assert!(!is_valid_address(""));
    }

    #[test]
    fn test_signature_format_validation() {
        let valid = format!("0x{}", "ab".repeat(65));
        assert!(is_valid_signature(&valid));
        assert!(!is_valid_signature(&format!("0x{}", "ab".repeat(64))));
        assert!(!is_valid_signature(&"ab".repeat(66)));
        assert!(!is_valid_signature(""));
    }

    #[test]
    fn test_challenge_message_template() {
        assert_eq!(
            challenge_message("abc123"),
            "Sign this message to confirm your identity: abc123"
        );
    }

    #[test]
    fn test_sign_and_recover_round_trip() {
        let key = SigningKey::random(&mut OsRng);
        let address = address_from_verifying_key(key.verifying_key());
        let message = challenge_message("deadbeef");
        let signature = sign_message(&key, &message);

        let recovered = recover_address(&message, &signature).unwrap();
        assert_eq!(recovered, address);
    }

    #[test]
    fn test_verify_signature_success_and_case_insensitive() {
        let key = SigningKey::random(&mut OsRng);
        let address = address_from_verifying_key(key.verifying_key());
        let nonce = generate_nonce();
        let signature = sign_message(&key, &challenge_message(&nonce));

        assert!(verify_signature(&address, &nonce, &signature));
        assert!(verify_signature(&address.to_uppercase().replacen("0X", "0x", 1), &nonce, &signature));
    }

    #[test]
    fn test_verify_signature_wrong_key_fails() {
        let key = SigningKey::random(&mut OsRng);
        let other = SigningKey::random(&mut OsRng);
        let address = address_from_verifying_key(key.verifying_key());
        let nonce = generate_nonce();
        let signature = sign_message(&other, &challenge_message(&nonce));

        assert!(!verify_signature(&address, &nonce, &signature));
    }

    #[test]
    fn test_verify_signature_fails_closed_on_garbage() {
        let key = SigningKey::random(&mut OsRng);
        let address = address_from_verifying_key(key.verifying_key());

        assert!(!verify_signature(&address, "nonce", "0x1234"));
        assert!(!verify_signature(&address, "nonce", ""));
        assert!(!verify_signature(
            &address,
            "nonce",
            &format!("0x{}", "zz".repeat(65))
        ));
        // Structurally valid hex but not a signature over anything
        assert!(!verify_signature(
            &address,
            "nonce",
            &format!("0x{}1b", "11".repeat(64))
        ));
    }

    #[test]
    fn test_nonce_generation() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_refresh_secret_generation() {
        let secret = generate_refresh_secret();
        assert_eq!(secret.len(), 80);
        assert_ne!(secret, generate_refresh_secret());
    }

    #[test]
    fn test_hash_secret_is_deterministic() {
        let secret = generate_refresh_secret();
        assert_eq!(hash_secret(&secret), hash_secret(&secret));
        assert_ne!(hash_secret(&secret), hash_secret("other"));
        assert_eq!(hash_secret(&secret).len(), 64);
    }
}
