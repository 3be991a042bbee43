//! Signing and key loading implementations using RustCrypto.

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey};

use crate::buffer::Buf;
use crate::crypto::provider::{KeyProvider, SignatureVerifier, SigningKey as SigningKeyTrait};

/// ECDSA P-256 signing key.
struct EcdsaP256(SigningKey);

impl std::fmt::Debug for EcdsaP256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EcdsaP256").finish()
    }
}

impl SigningKeyTrait for EcdsaP256 {
    fn sign(&mut self, data: &[u8], out: &mut Buf) -> Result<(), String> {
        // SHA-256 is applied by the P-256 signer.
        let signature: Signature = self
            .0
            .try_sign(data)
            .map_err(|_| "Signing failed".to_string())?;
        out.clear();
        out.extend_from_slice(signature.to_der().as_bytes());
        Ok(())
    }
}

/// Key provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoKeyProvider;

impl KeyProvider for RustCryptoKeyProvider {
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKeyTrait>, String> {
        let key = SigningKey::from_pkcs8_der(key_der)
            .map_err(|e| format!("Failed to parse PKCS#8 P-256 private key: {e}"))?;
        Ok(Box::new(EcdsaP256(key)))
    }
}

/// Signature verifier implementation.
#[derive(Debug)]
pub(super) struct RustCryptoSignatureVerifier;

impl SignatureVerifier for RustCryptoSignatureVerifier {
    fn verify_signature(
        &self,
        spki_der: &[u8],
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), String> {
        let verifying_key = VerifyingKey::from_public_key_der(spki_der)
            .map_err(|e| format!("Invalid P-256 public key: {e}"))?;
        let sig =
            Signature::from_der(signature).map_err(|_| "Invalid signature format".to_string())?;
        verifying_key
            .verify(data, &sig)
            .map_err(|_| "ECDSA signature verification failed".to_string())
    }
}

/// Static instance of the key provider.
pub(super) static KEY_PROVIDER: RustCryptoKeyProvider = RustCryptoKeyProvider;

/// Static instance of the signature verifier.
pub(super) static SIGNATURE_VERIFIER: RustCryptoSignatureVerifier = RustCryptoSignatureVerifier;
