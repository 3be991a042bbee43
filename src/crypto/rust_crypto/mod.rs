//! RustCrypto cryptographic provider.
//!
//! A pure Rust backend built on crates from the
//! [RustCrypto](https://github.com/RustCrypto) organization.
//!
//! ```
//! use nanodtls::Config;
//! use nanodtls::crypto::rust_crypto;
//!
//! let config = Config::builder()
//!     .with_crypto_provider(rust_crypto::default_provider())
//!     .build()
//!     .unwrap();
//! ```

mod cipher_suite;
mod kx_group;
mod sign;

use crate::crypto::provider::CryptoProvider;

/// Get the default RustCrypto-based crypto provider.
///
/// # Supported Cipher Suites
///
/// - `TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8` (0xC0AE)
/// - `TLS_PSK_WITH_AES_128_CCM_8` (0xC0A8)
///
/// # Supported Key Exchange Groups
///
/// - `secp256r1` (P-256)
///
/// # Key Formats
///
/// Private keys are PKCS#8 DER; peer keys are DER SubjectPublicKeyInfo.
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: cipher_suite::ALL_CIPHER_SUITES,
        kx_groups: kx_group::ALL_KX_GROUPS,
        signature_verification: &sign::SIGNATURE_VERIFIER,
        key_provider: &sign::KEY_PROVIDER,
    }
}
