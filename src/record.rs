//! Record protection for one epoch.
//!
//! ```text
//! DTLSCiphertext = header(13) ‖ explicit_nonce(8) ‖ CCM(plaintext) ‖ tag(8)
//! nonce          = write_iv(4) ‖ epoch(2) ‖ sequence(6)
//! aad            = epoch ‖ sequence ‖ type ‖ version ‖ plaintext_length
//! ```
//!
//! Epoch 0 (and any epoch before keys are installed) is the NULL cipher:
//! the fragment is sent as is.

use crate::buffer::Buf;
use crate::crypto::aead::{Aad, Iv, Nonce, AEAD_OVERHEAD, EXPLICIT_NONCE_LEN};
use crate::crypto::prf::{KeyBlock, MasterSecret};
use crate::crypto::{Cipher, CryptoProvider};
use crate::message::{CipherSuite, ContentType, DTLSRecord};
use crate::message::{Sequence, MAX_SEQUENCE_NUMBER};
use crate::window::ReplayWindow;
use crate::Error;

/// Which end of the association we are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Keys, counters and negotiated values of one epoch.
#[derive(Debug)]
pub(crate) struct SecurityParameters {
    pub epoch: u16,
    pub role: Role,
    /// `None` is the NULL cipher.
    pub cipher_suite: Option<CipherSuite>,
    pub client_random: [u8; 32],
    pub server_random: [u8; 32],
    pub master_secret: Option<MasterSecret>,
    write: Option<(Box<dyn Cipher>, Iv)>,
    read: Option<(Box<dyn Cipher>, Iv)>,
    sequence_number: u64,
    replay: ReplayWindow,
}

impl SecurityParameters {
    pub fn new(role: Role, epoch: u16) -> Self {
        SecurityParameters {
            epoch,
            role,
            cipher_suite: None,
            client_random: [0; 32],
            server_random: [0; 32],
            master_secret: None,
            write: None,
            read: None,
            sequence_number: 0,
            replay: ReplayWindow::new(),
        }
    }

    /// Next write sequence number, without consuming it.
    #[cfg(test)]
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn set_sequence_number(&mut self, sequence_number: u64) {
        self.sequence_number = sequence_number;
    }

    /// Create the read and write ciphers from a freshly derived key block.
    pub fn install_keys(
        &mut self,
        provider: &CryptoProvider,
        suite: CipherSuite,
        master_secret: MasterSecret,
        key_block: &KeyBlock,
    ) -> Result<(), Error> {
        let factory = provider
            .find_cipher_suite(suite)
            .ok_or_else(|| Error::CryptoError(format!("No cipher for suite {:?}", suite)))?;

        let client = factory
            .create_cipher(&key_block.client_write_key)
            .map_err(Error::CryptoError)?;
        let server = factory
            .create_cipher(&key_block.server_write_key)
            .map_err(Error::CryptoError)?;

        let client = (client, key_block.client_write_iv);
        let server = (server, key_block.server_write_iv);

        let (write, read) = match self.role {
            Role::Client => (client, server),
            Role::Server => (server, client),
        };

        self.cipher_suite = Some(suite);
        self.master_secret = Some(master_secret);
        self.write = Some(write);
        self.read = Some(read);

        Ok(())
    }

    fn next_write_sequence(&mut self) -> Result<Sequence, Error> {
        if self.sequence_number > MAX_SEQUENCE_NUMBER {
            return Err(Error::TooBigDtlsSeq(self.sequence_number));
        }
        let sequence = Sequence::new(self.epoch, self.sequence_number);
        self.sequence_number += 1;
        Ok(sequence)
    }
}

/// Frame (and under a non-NULL cipher, protect) `plaintext` as one record appended to `out`.
pub(crate) fn prepare_record(
    params: &mut SecurityParameters,
    content_type: ContentType,
    plaintext: &[u8],
    out: &mut Vec<u8>,
) -> Result<(), Error> {
    if plaintext.len() + AEAD_OVERHEAD > u16::MAX as usize {
        return Err(Error::TooBigRecord(plaintext.len()));
    }

    let sequence = params.next_write_sequence()?;

    let Some((cipher, iv)) = params.write.as_mut() else {
        DTLSRecord::serialize_header(content_type, sequence, plaintext.len() as u16, out);
        out.extend_from_slice(plaintext);
        return Ok(());
    };

    let explicit_nonce = sequence.to_bytes();
    let nonce = Nonce::new(*iv, &explicit_nonce);
    let aad = Aad::new(content_type, sequence, plaintext.len() as u16);

    let mut fragment = Buf::from_slice(plaintext);
    cipher
        .encrypt(&mut fragment, &aad.0, nonce)
        .map_err(Error::CryptoError)?;

    let length = EXPLICIT_NONCE_LEN + fragment.len();
    DTLSRecord::serialize_header(content_type, sequence, length as u16, out);
    out.extend_from_slice(&explicit_nonce);
    out.extend_from_slice(&fragment);

    trace!(
        "Sealed {:?} epoch {} seq {} ({} bytes)",
        content_type,
        sequence.epoch,
        sequence.sequence_number,
        plaintext.len()
    );

    Ok(())
}

/// Authenticate and decrypt one received record, returning the plaintext fragment.
///
/// The replay window only records the sequence number once the record authenticates.
pub(crate) fn decrypt_verify(
    params: &mut SecurityParameters,
    record: &DTLSRecord,
) -> Result<Buf, Error> {
    let sequence = record.sequence;

    if !params.replay.is_fresh(sequence.sequence_number) {
        return Err(Error::Replay(sequence.sequence_number));
    }

    let plaintext = match params.read.as_mut() {
        None => Buf::from_slice(record.fragment),
        Some((cipher, iv)) => {
            let fragment = record.fragment;
            if fragment.len() < AEAD_OVERHEAD {
                return Err(Error::CryptoError(format!(
                    "Protected record too short: {}",
                    fragment.len()
                )));
            }

            let mut explicit_nonce = [0u8; EXPLICIT_NONCE_LEN];
            explicit_nonce.copy_from_slice(&fragment[..EXPLICIT_NONCE_LEN]);
            let nonce = Nonce::new(*iv, &explicit_nonce);

            let plaintext_len = fragment.len() - AEAD_OVERHEAD;
            let aad = Aad::new(record.content_type, sequence, plaintext_len as u16);

            let mut buf = Buf::from_slice(&fragment[EXPLICIT_NONCE_LEN..]);
            cipher
                .decrypt(&mut buf, &aad.0, nonce)
                .map_err(Error::CryptoError)?;
            buf
        }
    };

    params.replay.mark(sequence.sequence_number);

    Ok(plaintext)
}
