//! Record AEAD framing for AES-128-CCM-8.
//!
//! These types describe how the record layer drives the cipher: which nonce,
//! which additional data and how much overhead a protected record carries.
//! The cipher itself lives behind the [`Cipher`][super::Cipher] trait.

use crate::message::{ContentType, ProtocolVersion, Sequence};

/// Explicit nonce carried in front of every protected record (`epoch ‖ sequence`).
pub const EXPLICIT_NONCE_LEN: usize = 8;

/// CCM-8 authentication tag length.
pub const CCM_8_TAG_LEN: usize = 8;

/// Overhead per protected record (explicit nonce + tag).
pub const AEAD_OVERHEAD: usize = EXPLICIT_NONCE_LEN + CCM_8_TAG_LEN;

/// Length of the implicit (fixed) part of the nonce, taken from the key block.
pub const FIXED_IV_LEN: usize = 4;

/// Length of the full CCM nonce.
pub const NONCE_LEN: usize = 12;

/// Fixed IV portion of the nonce, derived from the key block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Iv(pub [u8; FIXED_IV_LEN]);

impl Iv {
    pub fn new(iv: &[u8]) -> Result<Self, String> {
        let iv: [u8; FIXED_IV_LEN] = iv
            .try_into()
            .map_err(|_| format!("Invalid fixed IV length: {}", iv.len()))?;
        Ok(Self(iv))
    }
}

/// Full CCM nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce(pub [u8; NONCE_LEN]);

impl Nonce {
    /// Combine the fixed IV with the 8-byte explicit nonce.
    pub fn new(iv: Iv, explicit_nonce: &[u8; EXPLICIT_NONCE_LEN]) -> Self {
        let mut nonce = [0u8; NONCE_LEN];
        nonce[..FIXED_IV_LEN].copy_from_slice(&iv.0);
        nonce[FIXED_IV_LEN..].copy_from_slice(explicit_nonce);
        Self(nonce)
    }
}

/// Additional data bound into every record: `epoch ‖ sequence ‖ type ‖ version ‖ length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aad(pub [u8; 13]);

impl Aad {
    /// `length` is the plaintext length, not the length of the protected fragment.
    pub fn new(content_type: ContentType, sequence: Sequence, length: u16) -> Self {
        let mut aad = [0u8; 13];
        aad[..8].copy_from_slice(&sequence.to_bytes());
        aad[8] = content_type.as_u8();
        aad[9..11].copy_from_slice(&ProtocolVersion::DTLS1_2.as_u16().to_be_bytes());
        aad[11..].copy_from_slice(&length.to_be_bytes());
        Aad(aad)
    }
}
