//! Byte buffer for key material, plaintexts and stored flights.
//!
//! [`Buf`] is what crosses the crypto provider seam. It wipes itself when
//! cleared or dropped, and its `Debug` output only shows the length.

use std::fmt;
use std::ops::{Deref, DerefMut};

use zeroize::Zeroize;

/// Growable buffer that zeroizes its contents when dropped.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Buf(Vec<u8>);

impl Buf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Buf(data.to_vec())
    }

    /// Wipe and empty the buffer.
    pub fn clear(&mut self) {
        self.0.zeroize();
    }

    pub fn push(&mut self, byte: u8) {
        self.0.push(byte);
    }

    pub fn extend_from_slice(&mut self, other: &[u8]) {
        self.0.extend_from_slice(other);
    }

    /// Shorten to `len` bytes. Used to split an AEAD tag off the ciphertext.
    pub fn truncate(&mut self, len: usize) {
        if len < self.0.len() {
            self.0[len..].zeroize();
        }
        self.0.truncate(len);
    }
}

impl Drop for Buf {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Deref for Buf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for Buf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl AsRef<[u8]> for Buf {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Buf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buf({} bytes)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_contents() {
        let b = Buf::from_slice(b"secret");
        assert_eq!(format!("{:?}", b), "Buf(6 bytes)");
    }

    #[test]
    fn truncate_keeps_prefix() {
        let mut b = Buf::new();
        b.extend_from_slice(&[1, 2, 3, 4]);
        b.truncate(2);
        assert_eq!(&b[..], &[1, 2]);
        b.truncate(5);
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn push_appends() {
        let mut b = Buf::from_slice(&[1]);
        b.push(2);
        b.extend_from_slice(&[3]);
        assert_eq!(&b[..], &[1, 2, 3]);
    }

    #[test]
    fn clear_empties() {
        let mut b = Buf::from_slice(&[9; 16]);
        b.clear();
        assert!(b.is_empty());
    }
}
