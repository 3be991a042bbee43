//! Raw public key generation and fingerprint utilities, exposed via the public
//! `certificate` module.
//!
//! ECDHE-ECDSA peers authenticate with bare P-256 keys: the Certificate message
//! carries a DER SubjectPublicKeyInfo instead of an X.509 chain.

use std::fmt;

use p256::pkcs8::{EncodePrivateKey, EncodePublicKey};
use p256::SecretKey;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Certificate utility error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateError {
    /// Key generation or encoding failed
    GenerationFailed,
}

impl fmt::Display for CertificateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateError::GenerationFailed => write!(f, "Key generation failed"),
        }
    }
}

impl std::error::Error for CertificateError {}

/// P-256 key pair for raw public key authentication.
#[derive(Clone)]
pub struct RawPublicKey {
    /// Public key as DER SubjectPublicKeyInfo, sent in the Certificate message
    pub public_key: Vec<u8>,
    /// Private key in PKCS#8 DER format
    pub private_key: Vec<u8>,
}

/// Generate a fresh P-256 key pair.
pub fn generate_raw_public_key() -> Result<RawPublicKey, CertificateError> {
    let secret = SecretKey::random(&mut OsRng);

    let private_key = secret
        .to_pkcs8_der()
        .map_err(|_| CertificateError::GenerationFailed)?
        .as_bytes()
        .to_vec();

    let public_key = secret
        .public_key()
        .to_public_key_der()
        .map_err(|_| CertificateError::GenerationFailed)?
        .as_bytes()
        .to_vec();

    Ok(RawPublicKey {
        public_key,
        private_key,
    })
}

/// SHA-256 over a DER encoded public key.
pub fn calculate_fingerprint(der: &[u8]) -> [u8; 32] {
    Sha256::digest(der).into()
}

/// Format a fingerprint as a colon-separated hex string
/// Example: "AF:12:F6:..."
pub fn format_fingerprint(fingerprint: &[u8]) -> String {
    fingerprint
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<String>>()
        .join(":")
}

impl RawPublicKey {
    /// SHA-256 fingerprint of the public key.
    pub fn fingerprint(&self) -> [u8; 32] {
        calculate_fingerprint(&self.public_key)
    }

    /// Fingerprint as uppercase hex pairs separated by colons.
    pub fn fingerprint_str(&self) -> String {
        format_fingerprint(&self.fingerprint())
    }
}

impl fmt::Debug for RawPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawPublicKey")
            .field("public_key", &self.public_key.len())
            .field("private_key", &self.private_key.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_der() {
        let key = generate_raw_public_key().unwrap();

        // SEQUENCE tags
        assert_eq!(key.public_key[0], 0x30);
        assert_eq!(key.private_key[0], 0x30);
        // 26 bytes of P-256 SPKI prefix + 65 byte uncompressed point
        assert_eq!(key.public_key.len(), 91);

        let other = generate_raw_public_key().unwrap();
        assert_ne!(key.fingerprint(), other.fingerprint());
    }

    #[test]
    fn test_fingerprint_formatting() {
        let formatted = format_fingerprint(&[0xAF, 0x12, 0xF6, 0x38, 0x2A]);
        assert_eq!(formatted, "AF:12:F6:38:2A");

        let key = generate_raw_public_key().unwrap();
        let formatted = key.fingerprint_str();
        assert_eq!(formatted.len(), 95);
        for segment in formatted.split(':') {
            assert!(u8::from_str_radix(segment, 16).is_ok());
        }
    }

    #[test]
    fn debug_hides_key_material() {
        let key = generate_raw_public_key().unwrap();
        let dbg = format!("{:?}", key);
        assert_eq!(
            dbg,
            format!(
                "RawPublicKey {{ public_key: {}, private_key: {} }}",
                key.public_key.len(),
                key.private_key.len()
            )
        );
    }
}
