use sha2::{Digest, Sha256};

use crate::buffer::Buf;

/// SHA-256 output length.
pub const HASH_LEN: usize = 32;

/// Handshake transcript.
///
/// The raw handshake messages are kept so the CertificateVerify signature can be
/// computed over the messages themselves, and hashed on demand for Finished.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Buf,
}

impl Transcript {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one full handshake message (header included).
    pub fn update(&mut self, data: &[u8]) {
        self.messages.extend_from_slice(data);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// All messages so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.messages
    }

    /// Hash of all messages so far. The transcript can keep growing afterwards.
    pub fn hash(&self) -> [u8; HASH_LEN] {
        sha256(&self.messages)
    }
}

pub fn sha256(data: &[u8]) -> [u8; HASH_LEN] {
    Sha256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let mut t = Transcript::new();
        t.update(b"hello");
        t.update(b" ");
        t.update(b"world");
        let result = t.hash();

        // Expected SHA256 hash of "hello world"
        let expected = [
            0xb9, 0x4d, 0x27, 0xb9, 0x93, 0x4d, 0x3e, 0x08, 0xa5, 0x2e, 0x52, 0xd7, 0xda, 0x7d,
            0xab, 0xfa, 0xc4, 0x84, 0xef, 0xe3, 0x7a, 0x53, 0x80, 0xee, 0x90, 0x88, 0xf7, 0xac,
            0xe2, 0xef, 0xcd, 0xe9,
        ];

        assert_eq!(result, expected);
    }

    #[test]
    fn clear_restarts() {
        let mut t = Transcript::new();
        t.update(b"stale");
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.hash(), sha256(b""));
    }
}
