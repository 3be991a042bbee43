//! Cryptographic provider traits for pluggable crypto backends.
//!
//! The [`CryptoProvider`] struct holds static references to trait objects, each
//! representing one capability the engine needs:
//!
//! - **Cipher suites** ([`SupportedCipherSuite`]): factory for the record AEAD
//! - **Key exchange groups** ([`SupportedKxGroup`]): factory for ECDHE exchanges
//! - **Signature verification** ([`SignatureVerifier`]): check ECDSA signatures
//!   against a peer's SubjectPublicKeyInfo
//! - **Key provider** ([`KeyProvider`]): load our own private key
//!
//! The key schedule (PRF), cookie and ticket MACs are fixed to SHA-256 by the
//! supported cipher suites and are not part of the provider.
//!
//! # Implementing a Custom Provider
//!
//! 1. Implement the required traits for your crypto backend
//! 2. Create static instances of your implementations
//! 3. Build a [`CryptoProvider`] with references to those statics
//!
//! ```
//! use nanodtls::crypto::{Buf, Cipher, CipherSuite, Nonce, SupportedCipherSuite};
//!
//! #[derive(Debug)]
//! struct MyCipher;
//!
//! impl Cipher for MyCipher {
//!     fn encrypt(&mut self, _: &mut Buf, _: &[u8], _: Nonce) -> Result<(), String> {
//!         Ok(())
//!     }
//!     fn decrypt(&mut self, _: &mut Buf, _: &[u8], _: Nonce) -> Result<(), String> {
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct MyPskSuite;
//!
//! impl SupportedCipherSuite for MyPskSuite {
//!     fn suite(&self) -> CipherSuite {
//!         CipherSuite::PSK_AES128_CCM_8
//!     }
//!
//!     fn key_lengths(&self) -> (usize, usize) {
//!         (16, 4) // (enc_key_len, fixed_iv_len)
//!     }
//!
//!     fn create_cipher(&self, _key: &[u8]) -> Result<Box<dyn Cipher>, String> {
//!         Ok(Box::new(MyCipher))
//!     }
//! }
//!
//! static MY_SUITE: MyPskSuite = MyPskSuite;
//! static ALL_SUITES: &[&dyn SupportedCipherSuite] = &[&MY_SUITE];
//! ```
//!
//! # Thread Safety
//!
//! All provider traits require `Send + Sync + UnwindSafe + RefUnwindSafe`.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

use crate::buffer::Buf;
use crate::crypto::Nonce;
use crate::message::CipherSuite;

/// Marker trait for types that are safe to use in crypto provider components.
pub trait CryptoSafe: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {}

impl<T: Send + Sync + Debug + UnwindSafe + RefUnwindSafe> CryptoSafe for T {}

// ============================================================================
// Instance Traits (created by factories)
// ============================================================================

/// AEAD cipher for in-place encryption/decryption.
pub trait Cipher: CryptoSafe {
    /// Encrypt plaintext in-place, appending the authentication tag.
    fn encrypt(&mut self, plaintext: &mut Buf, aad: &[u8], nonce: Nonce) -> Result<(), String>;

    /// Decrypt ciphertext in-place, verifying and removing the authentication tag.
    fn decrypt(&mut self, ciphertext: &mut Buf, aad: &[u8], nonce: Nonce) -> Result<(), String>;
}

/// Signing key for generating digital signatures.
pub trait SigningKey: CryptoSafe {
    /// Hash `data` with SHA-256 and sign it, writing a DER encoded signature to `out`.
    fn sign(&mut self, data: &[u8], out: &mut Buf) -> Result<(), String>;
}

/// Active key exchange instance (ephemeral keypair for one handshake).
pub trait ActiveKeyExchange: CryptoSafe {
    /// Our public key, uncompressed point encoding.
    fn pub_key(&self) -> &[u8];

    /// Complete the exchange with the peer's public key, writing the shared secret.
    fn complete(self: Box<Self>, peer_pub: &[u8], out: &mut Buf) -> Result<(), String>;
}

// ============================================================================
// Factory Traits (used by CryptoProvider)
// ============================================================================

/// Cipher suite support (factory for Cipher instances).
pub trait SupportedCipherSuite: CryptoSafe {
    /// The cipher suite this supports.
    fn suite(&self) -> CipherSuite;

    /// Key material lengths: (enc_key_len, fixed_iv_len).
    fn key_lengths(&self) -> (usize, usize);

    /// Create a cipher instance with the given key.
    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String>;
}

/// Key exchange group support (factory for ActiveKeyExchange).
pub trait SupportedKxGroup: CryptoSafe {
    /// IANA named curve id of this group.
    fn named_curve(&self) -> u16;

    /// Start a new key exchange, generating an ephemeral keypair.
    fn start_exchange(&self) -> Result<Box<dyn ActiveKeyExchange>, String>;
}

/// Signature verification against a raw public key.
pub trait SignatureVerifier: CryptoSafe {
    /// Verify an ECDSA/SHA-256 signature on `data` using a DER SubjectPublicKeyInfo.
    fn verify_signature(&self, spki_der: &[u8], data: &[u8], signature: &[u8])
        -> Result<(), String>;
}

/// Private key parser (factory for SigningKey).
pub trait KeyProvider: CryptoSafe {
    /// Parse and load a PKCS#8 DER private key.
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKey>, String>;
}

// ============================================================================
// Core Provider Struct
// ============================================================================

/// Cryptographic provider for DTLS operations.
///
/// The provider uses static trait object references (`&'static dyn Trait`) so it is
/// cheap to clone into every [`Config`](crate::Config).
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    /// Supported cipher suites (for negotiation).
    pub cipher_suites: &'static [&'static dyn SupportedCipherSuite],

    /// Supported key exchange groups.
    pub kx_groups: &'static [&'static dyn SupportedKxGroup],

    /// Signature verification for peer keys.
    pub signature_verification: &'static dyn SignatureVerifier,

    /// Key provider for parsing private keys.
    pub key_provider: &'static dyn KeyProvider,
}

impl CryptoProvider {
    /// Look up the factory for a negotiated cipher suite.
    pub fn find_cipher_suite(&self, suite: CipherSuite) -> Option<&'static dyn SupportedCipherSuite> {
        self.cipher_suites.iter().copied().find(|s| s.suite() == suite)
    }

    /// Look up a key exchange group by named curve id.
    pub fn find_kx_group(&self, named_curve: u16) -> Option<&'static dyn SupportedKxGroup> {
        self.kx_groups
            .iter()
            .copied()
            .find(|g| g.named_curve() == named_curve)
    }

    /// Check that the provider can run at least one of the given suites.
    pub(crate) fn validate(&self, wanted: &[CipherSuite]) -> Result<(), String> {
        if self.cipher_suites.is_empty() {
            return Err("Crypto provider has no cipher suites".to_string());
        }

        for suite in wanted {
            if self.find_cipher_suite(*suite).is_none() {
                return Err(format!("Crypto provider lacks cipher suite {:?}", suite));
            }
            if suite.has_ecc() && self.find_kx_group(crate::message::NAMED_CURVE_SECP256R1).is_none()
            {
                return Err(format!("Crypto provider lacks secp256r1 for {:?}", suite));
            }
        }

        Ok(())
    }
}
