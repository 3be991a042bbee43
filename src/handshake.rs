//! Handshake message dispatch shared by both roles.
//!
//! Every decrypted Handshake record lands in [`Context::handle_handshake`]. It
//! enforces the message_seq rule, hands the message to the role's validator and
//! arms or cancels the retransmission timer depending on what the validator sent.

use std::time::Instant;

use crate::buffer::Buf;
use crate::certificate::calculate_fingerprint;
use crate::context::Context;
use crate::crypto::prf::{calculate_key_block, verify_data, FinishedLabel};
use crate::crypto::CryptoProvider;
use crate::event::{Event, Handler};
use crate::message::{AlertDescription, AlertLevel, Certificate, CipherSuite, Finished};
use crate::message::{Handshake, MessageType};
use crate::peer::{Peer, State};
use crate::record::Role;
use crate::ticket::PeerIdentity;
use crate::Error;

impl<H: Handler> Context<H> {
    /// Process every handshake message in a decrypted record fragment.
    pub(crate) fn handle_handshake(
        &mut self,
        peer: &mut Peer,
        fragment: &[u8],
        now: Instant,
    ) -> Result<(), Error> {
        let mut input = fragment;
        while !input.is_empty() {
            let (rest, message) = Handshake::parse(input)?;
            if message.header.is_fragment() {
                return Err(Error::ParseError("Fragmented handshake message".to_string()));
            }
            input = rest;
            self.handle_handshake_message(peer, &message, now)?;
        }
        Ok(())
    }

    fn handle_handshake_message(
        &mut self,
        peer: &mut Peer,
        message: &Handshake<'_>,
        now: Instant,
    ) -> Result<(), Error> {
        let msg_type = message.header.msg_type;
        let seq = message.header.message_seq;

        if peer.role == Role::Server
            && peer.state == State::Connected
            && msg_type == MessageType::ClientHello
        {
            if !self.config.renegotiation() {
                debug!("{} refusing renegotiation", peer.session);
                return peer.send_alert(AlertLevel::Warning, AlertDescription::NoRenegotiation);
            }
            debug!("{} renegotiating", peer.session);
            peer.begin_handshake()?;
            peer.state = State::ServerHello;
            peer.handshake.next_recv_seq = seq;
            peer.handshake.next_send_seq = seq;
        }

        let expected = peer.handshake.next_recv_seq;
        if seq < expected {
            trace!("{} duplicate {:?} seq {}", peer.session, msg_type, seq);
            if peer.has_flight() {
                peer.handshake.resend_requested = true;
            }
            return Ok(());
        }
        if seq > expected {
            return Err(Error::UnexpectedMessage(format!(
                "{:?} seq {} ahead of {}",
                msg_type, seq, expected
            )));
        }

        let before = peer.state;
        peer.handshake.flight_sent = false;

        match peer.role {
            Role::Client => self.client_handshake(peer, message, now)?,
            Role::Server => self.server_handshake(peer, message, now)?,
        }

        peer.handshake.next_recv_seq = seq.wrapping_add(1);
        self.retransmit.cancel(&peer.session);
        if std::mem::take(&mut peer.handshake.flight_sent) && peer.state != State::Connected {
            self.schedule_flight(peer.session, now);
        }

        if peer.state != before {
            debug!("{} {:?} -> {:?}", peer.session, before, peer.state);
        }

        if peer.state == State::Connected && before != State::Connected {
            info!("{} connected", peer.session);
            peer.established = true;
            peer.handshake.transcript.clear();
            self.handler.event(&peer.session, Event::Connected);
        }

        Ok(())
    }

    /// Certificate from either side. Holds a raw public key as DER SubjectPublicKeyInfo.
    pub(crate) fn check_certificate(
        &mut self,
        peer: &mut Peer,
        message: &Handshake<'_>,
    ) -> Result<(), Error> {
        let (_, certificate) = Certificate::parse(message.body)?;

        let Some(der) = certificate.certificate else {
            debug!("{} sent an empty Certificate", peer.session);
            return Err(Error::Alert(match peer.role {
                Role::Client => AlertDescription::BadCertificate,
                Role::Server => AlertDescription::HandshakeFailure,
            }));
        };

        if !self.handler.verify_peer_key(&peer.session, der) {
            warn!("{} public key rejected", peer.session);
            return Err(Error::Alert(AlertDescription::BadCertificate));
        }

        peer.handshake.transcript.update(message.raw);
        peer.handshake.peer_certificate = Some(der.to_vec());

        if peer.role == Role::Client {
            peer.state = State::WaitServerKeyExchange;
        }

        Ok(())
    }

    /// Finished from either side.
    ///
    /// Whoever did not send the first ChangeCipherSpec answers with its own
    /// ChangeCipherSpec and Finished.
    pub(crate) fn check_finished(
        &mut self,
        peer: &mut Peer,
        message: &Handshake<'_>,
        now: Instant,
    ) -> Result<(), Error> {
        let (_, finished) = Finished::parse(message.body)?;

        let (label, answer) = match peer.role {
            Role::Client => (FinishedLabel::Server, peer.handshake.resumption),
            Role::Server => (FinishedLabel::Client, !peer.handshake.resumption),
        };

        let expected = finished_data(peer, label)?;
        if !constant_time_eq(&expected, finished.verify_data) {
            warn!("{} Finished verify_data mismatch", peer.session);
            return Err(Error::Alert(AlertDescription::DecryptError));
        }
        peer.handshake.transcript.update(message.raw);

        if answer {
            peer.flight_begin();
            if peer.role == Role::Server && peer.handshake.ticket_expected {
                self.send_new_session_ticket(peer, now)?;
            }
            peer.send_change_cipher_spec()?;
            let own = match peer.role {
                Role::Client => FinishedLabel::Client,
                Role::Server => FinishedLabel::Server,
            };
            send_finished(peer, own)?;
        }

        peer.state = State::Connected;
        Ok(())
    }
}

/// verify_data over the transcript so far, keyed by the negotiated master secret.
fn finished_data(peer: &Peer, label: FinishedLabel) -> Result<[u8; 12], Error> {
    let master = peer
        .next_params()
        .master_secret
        .as_ref()
        .ok_or_else(|| Error::UnexpectedMessage("Finished before key exchange".to_string()))?;

    verify_data(master, label, &peer.handshake.transcript.hash()).map_err(Error::CryptoError)
}

pub(crate) fn send_finished(peer: &mut Peer, label: FinishedLabel) -> Result<(), Error> {
    let data = finished_data(peer, label)?;
    let mut body = Vec::with_capacity(data.len());
    Finished { verify_data: &data }.serialize(&mut body);
    peer.send_handshake(MessageType::Finished, &body)
}

/// Derive the master secret and key block from the premaster secret and install
/// them in the slot being negotiated.
pub(crate) fn install_next_keys(
    provider: &CryptoProvider,
    peer: &mut Peer,
    suite: CipherSuite,
    premaster: &[u8],
) -> Result<(), Error> {
    let params = peer.next_params_mut();
    let (master, key_block) =
        calculate_key_block(premaster, &params.client_random, &params.server_random)
            .map_err(Error::CryptoError)?;
    params.install_keys(provider, suite, master, &key_block)
}

/// Sign `data` with a PKCS#8 private key.
pub(crate) fn sign(provider: &CryptoProvider, private_key: &[u8], data: &[u8]) -> Result<Buf, Error> {
    let mut key = provider.key_provider.load_private_key(private_key).map_err(|e| {
        warn!("Unusable private key: {}", e);
        Error::Alert(AlertDescription::InternalError)
    })?;

    let mut signature = Buf::new();
    key.sign(data, &mut signature).map_err(|e| {
        warn!("Signing failed: {}", e);
        Error::Alert(AlertDescription::InternalError)
    })?;

    Ok(signature)
}

/// The identity proven by a verified signature over the handshake.
pub(crate) fn certificate_identity(der: &[u8]) -> PeerIdentity {
    PeerIdentity::Certificate(calculate_fingerprint(der))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_compares_length_and_bytes() {
        assert!(constant_time_eq(&[1, 2, 3], &[1, 2, 3]));
        assert!(!constant_time_eq(&[1, 2, 3], &[1, 2, 4]));
        assert!(!constant_time_eq(&[1, 2], &[1, 2, 3]));
        assert!(constant_time_eq(&[], &[]));
    }
}
