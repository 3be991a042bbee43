//! AES-128-CCM-8 record cipher using RustCrypto.

use ccm::aead::generic_array::GenericArray;
use ccm::consts::{U12, U8};
use ccm::{AeadInPlace, KeyInit};

use crate::buffer::Buf;
use crate::crypto::aead::CCM_8_TAG_LEN;
use crate::crypto::provider::{Cipher, SupportedCipherSuite};
use crate::crypto::Nonce;
use crate::message::CipherSuite;

/// AES-128 in CCM mode with an 8 byte tag and a 12 byte nonce.
type Aes128Ccm8 = ccm::Ccm<aes::Aes128, U8, U12>;

struct AesCcm8(Box<Aes128Ccm8>);

impl std::fmt::Debug for AesCcm8 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AesCcm8").finish()
    }
}

impl AesCcm8 {
    fn new(key: &[u8]) -> Result<Self, String> {
        let cipher = Aes128Ccm8::new_from_slice(key)
            .map_err(|_| format!("Invalid key size for AES-128-CCM-8: {}", key.len()))?;
        Ok(AesCcm8(Box::new(cipher)))
    }
}

impl Cipher for AesCcm8 {
    fn encrypt(&mut self, data: &mut Buf, aad: &[u8], nonce: Nonce) -> Result<(), String> {
        let nonce = GenericArray::from_slice(&nonce.0);
        let tag = self
            .0
            .encrypt_in_place_detached(nonce, aad, data)
            .map_err(|_| "AES-CCM encryption failed".to_string())?;
        data.extend_from_slice(&tag);
        Ok(())
    }

    fn decrypt(&mut self, data: &mut Buf, aad: &[u8], nonce: Nonce) -> Result<(), String> {
        if data.len() < CCM_8_TAG_LEN {
            return Err(format!("Ciphertext too short: {}", data.len()));
        }

        let split = data.len() - CCM_8_TAG_LEN;
        let mut tag = [0u8; CCM_8_TAG_LEN];
        tag.copy_from_slice(&data[split..]);
        data.truncate(split);

        let nonce = GenericArray::from_slice(&nonce.0);
        self.0
            .decrypt_in_place_detached(nonce, aad, data, GenericArray::from_slice(&tag))
            .map_err(|_| "AES-CCM decryption failed".to_string())
    }
}

/// Both supported suites share the same record protection.
#[derive(Debug)]
struct Ccm8Suite(CipherSuite);

impl SupportedCipherSuite for Ccm8Suite {
    fn suite(&self) -> CipherSuite {
        self.0
    }

    fn key_lengths(&self) -> (usize, usize) {
        (16, 4)
    }

    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String> {
        Ok(Box::new(AesCcm8::new(key)?))
    }
}

static ECDHE_ECDSA_AES128_CCM_8: Ccm8Suite = Ccm8Suite(CipherSuite::ECDHE_ECDSA_AES128_CCM_8);
static PSK_AES128_CCM_8: Ccm8Suite = Ccm8Suite(CipherSuite::PSK_AES128_CCM_8);

/// All supported cipher suites, in preference order.
pub(super) static ALL_CIPHER_SUITES: &[&dyn SupportedCipherSuite] =
    &[&ECDHE_ECDSA_AES128_CCM_8, &PSK_AES128_CCM_8];
