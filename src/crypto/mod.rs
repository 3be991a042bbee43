//! Cryptographic primitives and helpers used by the DTLS engine.

use std::ops::Deref;

pub(crate) mod aead;
pub(crate) mod hash;
pub(crate) mod prf;
pub mod provider;
pub mod rust_crypto;

pub use crate::buffer::Buf;
pub use aead::Nonce;

pub use provider::{ActiveKeyExchange, Cipher, CryptoProvider, CryptoSafe};
pub use provider::{KeyProvider, SignatureVerifier, SigningKey};
pub use provider::{SupportedCipherSuite, SupportedKxGroup};

pub use crate::message::CipherSuite;

impl Deref for Nonce {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
