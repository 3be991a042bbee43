// DTLS server handshake flow:
//
// 1. Client sends ClientHello without cookie
// 2. Server answers HelloVerifyRequest statelessly (see Context::accept_client_hello)
// 3. Client resends ClientHello with cookie. Server sends ServerHello and either
//    - Certificate, ServerKeyExchange, [CertificateRequest], ServerHelloDone (ECDHE)
//    - [ServerKeyExchange with identity hint], ServerHelloDone (PSK)
// 4. Client sends [Certificate], ClientKeyExchange, [CertificateVerify],
//    ChangeCipherSpec, Finished
// 5. Server verifies Finished, then sends [NewSessionTicket], ChangeCipherSpec, Finished
//
// A ClientHello with a ticket we can open resumes instead:
// 3. Server sends ServerHello, [NewSessionTicket], ChangeCipherSpec, Finished
// 4. Client sends ChangeCipherSpec, Finished

use std::time::Instant;

use crate::buffer::Buf;
use crate::context::Context;
use crate::crypto::prf::{key_expansion, psk_premaster, FinishedLabel};
use crate::event::{Credentials, Handler};
use crate::handshake::{certificate_identity, install_next_keys, send_finished, sign};
use crate::message::{AlertDescription, Certificate, CertificateRequest, CipherSuite, ClientHello};
use crate::message::{ClientKeyExchange, CompressionMethod, DigitallySigned, EcdhParams};
use crate::message::{Extension, ExtensionType, Handshake, MessageType, NewSessionTicket};
use crate::message::{ProtocolVersion, Random, ServerHello, ServerKeyExchange, SessionId};
use crate::message::{EC_POINT_FORMATS_UNCOMPRESSED, NAMED_CURVE_SECP256R1};
use crate::peer::{Peer, State};
use crate::ticket::{PeerIdentity, SessionState};
use crate::time_tricks::InstantExt;
use crate::Error;

impl<H: Handler> Context<H> {
    pub(crate) fn server_handshake(
        &mut self,
        peer: &mut Peer,
        message: &Handshake<'_>,
        now: Instant,
    ) -> Result<(), Error> {
        use MessageType as M;

        match (peer.state, message.header.msg_type) {
            (State::ServerHello, M::ClientHello) => self.check_client_hello(peer, message, now),
            (State::WaitClientKeyExchange, M::Certificate)
                if peer.handshake.client_certificate_requested
                    && peer.handshake.peer_certificate.is_none() =>
            {
                self.check_certificate(peer, message)
            }
            (State::WaitClientKeyExchange, M::ClientKeyExchange) => {
                self.check_client_key_exchange(peer, message)
            }
            (State::WaitCertificateVerify, M::CertificateVerify) => {
                self.check_certificate_verify(peer, message)
            }
            (State::WaitFinished, M::Finished) => self.check_finished(peer, message, now),
            (state, msg_type) => Err(Error::UnexpectedMessage(format!(
                "{:?} in server state {:?}",
                msg_type, state
            ))),
        }
    }

    fn check_client_hello(
        &mut self,
        peer: &mut Peer,
        message: &Handshake<'_>,
        now: Instant,
    ) -> Result<(), Error> {
        let (_, client_hello) = ClientHello::parse(message.body)?;

        if client_hello.client_version != ProtocolVersion::DTLS1_2 {
            debug!("{} offered {:?}", peer.session, client_hello.client_version);
            return Err(Error::Alert(AlertDescription::ProtocolVersion));
        }
        if !client_hello.offers_null_compression() {
            return Err(Error::Alert(AlertDescription::HandshakeFailure));
        }

        peer.handshake.transcript.update(message.raw);

        let server_random = Random::new(now, &mut self.rng);
        let params = peer.next_params_mut();
        params.client_random = client_hello.random.to_bytes();
        params.server_random = server_random.to_bytes();

        let ticket = client_hello
            .session_ticket()
            .filter(|_| self.config.session_tickets());
        peer.handshake.ticket_expected = ticket.is_some();

        if let Some(ticket) = ticket.filter(|t| !t.is_empty()) {
            if let Some(state) = self.open_ticket(ticket, &client_hello, now) {
                return self.resume_session(peer, &client_hello, state, now);
            }
        }

        let Some((suite, credentials)) = self.select_cipher_suite(peer, &client_hello) else {
            debug!("{} no common cipher suite", peer.session);
            return Err(Error::Alert(AlertDescription::HandshakeFailure));
        };
        debug!("{} selected {:?}", peer.session, suite);

        peer.identity = PeerIdentity::None;
        peer.handshake.session_id = SessionId::empty();
        peer.next_params_mut().cipher_suite = Some(suite);

        peer.flight_begin();
        send_server_hello(peer, suite)?;

        if suite.has_ecc() {
            let Some(Credentials::Ecdsa {
                private_key,
                certificate,
            }) = &credentials
            else {
                return Err(Error::Alert(AlertDescription::InternalError));
            };
            self.send_ecdhe_parameters(peer, private_key, certificate)?;

            if self.config.require_client_certificate() {
                let mut body = Vec::new();
                CertificateRequest::default().serialize(&mut body);
                peer.send_handshake(MessageType::CertificateRequest, &body)?;
                peer.handshake.client_certificate_requested = true;
            }
        } else if let Some(hint) = self.config.psk_identity_hint() {
            let mut body = Vec::new();
            ServerKeyExchange::PskHint(hint).serialize(&mut body);
            peer.send_handshake(MessageType::ServerKeyExchange, &body)?;
        }

        peer.send_handshake(MessageType::ServerHelloDone, &[])?;
        peer.state = State::WaitClientKeyExchange;
        Ok(())
    }

    /// First suite in the client's preference order that we allow and can serve.
    fn select_cipher_suite(
        &mut self,
        peer: &Peer,
        client_hello: &ClientHello<'_>,
    ) -> Option<(CipherSuite, Option<Credentials>)> {
        let p256 = client_hello.supports_p256();

        for suite in &client_hello.cipher_suites {
            if !self.config.cipher_suites().contains(suite) {
                continue;
            }
            if suite.is_psk() {
                return Some((*suite, None));
            }
            if suite.has_ecc() && p256 {
                match self.handler.get_key(&peer.session, None) {
                    Some(c @ Credentials::Ecdsa { .. }) => return Some((*suite, Some(c))),
                    _ => trace!("{} no ECDSA key, skipping {:?}", peer.session, suite),
                }
            }
        }

        None
    }

    /// Certificate and the signed ServerKeyExchange.
    fn send_ecdhe_parameters(
        &mut self,
        peer: &mut Peer,
        private_key: &[u8],
        certificate: &[u8],
    ) -> Result<(), Error> {
        let mut body = Vec::new();
        Certificate::new(certificate).serialize(&mut body);
        peer.send_handshake(MessageType::Certificate, &body)?;

        let provider = self.config.crypto_provider();
        let group = provider
            .find_kx_group(NAMED_CURVE_SECP256R1)
            .ok_or(Error::Alert(AlertDescription::InternalError))?;
        let key_exchange = group.start_exchange().map_err(|e| {
            warn!("Key exchange: {}", e);
            Error::Alert(AlertDescription::InternalError)
        })?;

        let mut body = Vec::new();
        EcdhParams::serialize(NAMED_CURVE_SECP256R1, key_exchange.pub_key(), &mut body);

        let next = peer.next_params();
        let mut signed_data = Vec::with_capacity(64 + body.len());
        signed_data.extend_from_slice(&next.client_random);
        signed_data.extend_from_slice(&next.server_random);
        signed_data.extend_from_slice(&body);

        let signature = sign(provider, private_key, &signed_data)?;
        DigitallySigned::ecdsa_sha256(&signature).serialize(&mut body);

        peer.send_handshake(MessageType::ServerKeyExchange, &body)?;
        peer.handshake.key_exchange = Some(key_exchange);
        Ok(())
    }

    /// Decrypt a ticket and check it still fits this ClientHello and our configuration.
    fn open_ticket(
        &mut self,
        ticket: &[u8],
        client_hello: &ClientHello<'_>,
        now: Instant,
    ) -> Option<SessionState> {
        let key = self.ticket_key.as_mut()?;
        let state = key.open(ticket, now.to_unix_secs(), self.config.ticket_lifetime())?;

        if !self.config.cipher_suites().contains(&state.cipher_suite)
            || !client_hello.cipher_suites.contains(&state.cipher_suite)
        {
            debug!("Ticket suite {:?} no longer offered", state.cipher_suite);
            return None;
        }

        Some(state)
    }

    fn resume_session(
        &mut self,
        peer: &mut Peer,
        client_hello: &ClientHello<'_>,
        state: SessionState,
        now: Instant,
    ) -> Result<(), Error> {
        debug!("{} resuming session", peer.session);

        let suite = state.cipher_suite;
        peer.identity = state.identity.clone();
        peer.handshake.resumption = true;
        peer.handshake.session_id = client_hello.session_id;

        let params = peer.next_params_mut();
        let key_block = key_expansion(&state.master_secret, &params.client_random, &params.server_random)
            .map_err(Error::CryptoError)?;
        params.install_keys(
            self.config.crypto_provider(),
            suite,
            state.master_secret,
            &key_block,
        )?;

        peer.flight_begin();
        send_server_hello(peer, suite)?;
        if peer.handshake.ticket_expected {
            self.send_new_session_ticket(peer, now)?;
        }
        peer.send_change_cipher_spec()?;
        send_finished(peer, FinishedLabel::Server)?;

        peer.state = State::KeyExchange;
        Ok(())
    }

    fn check_client_key_exchange(&mut self, peer: &mut Peer, message: &Handshake<'_>) -> Result<(), Error> {
        let suite = peer
            .next_params()
            .cipher_suite
            .ok_or_else(|| Error::UnexpectedMessage("ClientKeyExchange before ClientHello".into()))?;

        if peer.handshake.client_certificate_requested && peer.handshake.peer_certificate.is_none() {
            debug!("{} skipped the requested certificate", peer.session);
            return Err(Error::Alert(AlertDescription::HandshakeFailure));
        }

        let (_, client_key_exchange) = ClientKeyExchange::parse(message.body, suite)?;

        let premaster = match client_key_exchange {
            ClientKeyExchange::Psk { identity } => {
                let credentials = self.handler.get_key(&peer.session, Some(identity));
                let Some(Credentials::Psk { key, .. }) = &credentials else {
                    debug!(
                        "{} unknown PSK identity {:?}",
                        peer.session,
                        String::from_utf8_lossy(identity)
                    );
                    return Err(Error::Alert(AlertDescription::UnknownPskIdentity));
                };

                let premaster = psk_premaster(key).map_err(|e| {
                    warn!("{}", e);
                    Error::Alert(AlertDescription::InternalError)
                })?;
                peer.identity = PeerIdentity::Psk(identity.to_vec());
                Buf::from_slice(&premaster)
            }
            ClientKeyExchange::Ecdh { public_key } => {
                let key_exchange = peer
                    .handshake
                    .key_exchange
                    .take()
                    .ok_or_else(|| Error::UnexpectedMessage("No key exchange in progress".into()))?;

                let mut shared = Buf::new();
                key_exchange.complete(public_key, &mut shared).map_err(|e| {
                    debug!("{} bad client point: {}", peer.session, e);
                    Error::Alert(AlertDescription::IllegalParameter)
                })?;
                shared
            }
        };

        peer.handshake.transcript.update(message.raw);
        install_next_keys(self.config.crypto_provider(), peer, suite, &premaster)?;

        peer.state = if peer.handshake.peer_certificate.is_some() {
            State::WaitCertificateVerify
        } else {
            State::KeyExchange
        };
        Ok(())
    }

    fn check_certificate_verify(&mut self, peer: &mut Peer, message: &Handshake<'_>) -> Result<(), Error> {
        let (_, signed) = DigitallySigned::parse(message.body)?;
        if !signed.is_ecdsa_sha256() {
            return Err(Error::Alert(AlertDescription::HandshakeFailure));
        }

        let certificate = peer
            .handshake
            .peer_certificate
            .as_deref()
            .ok_or_else(|| Error::UnexpectedMessage("CertificateVerify without Certificate".into()))?;

        self.config
            .crypto_provider()
            .signature_verification
            .verify_signature(certificate, peer.handshake.transcript.as_bytes(), signed.signature)
            .map_err(|e| {
                warn!("{} CertificateVerify: {}", peer.session, e);
                Error::Alert(AlertDescription::DecryptError)
            })?;

        let identity = certificate_identity(certificate);
        peer.identity = identity;
        peer.handshake.transcript.update(message.raw);
        peer.state = State::KeyExchange;
        Ok(())
    }

    /// Seal the negotiated session into a ticket and queue it.
    pub(crate) fn send_new_session_ticket(&mut self, peer: &mut Peer, now: Instant) -> Result<(), Error> {
        let params = peer.next_params();
        let (Some(cipher_suite), Some(master_secret)) =
            (params.cipher_suite, params.master_secret.clone())
        else {
            return Err(Error::UnexpectedMessage("No session to put in a ticket".into()));
        };

        let state = SessionState {
            version: ProtocolVersion::DTLS1_2,
            cipher_suite,
            compression: CompressionMethod::Null,
            master_secret,
            identity: peer.identity.clone(),
            timestamp: now.to_unix_secs(),
        };

        let ticket = match self.ticket_key.as_mut() {
            Some(key) => key.seal(&state, &mut self.rng)?,
            None => Vec::new(),
        };

        let lifetime_hint = u32::try_from(self.config.ticket_lifetime().as_secs()).unwrap_or(u32::MAX);
        let mut body = Vec::new();
        NewSessionTicket {
            lifetime_hint,
            ticket: &ticket,
        }
        .serialize(&mut body);

        trace!("{} sending {} byte ticket", peer.session, ticket.len());
        peer.send_handshake(MessageType::NewSessionTicket, &body)
    }
}

fn send_server_hello(peer: &mut Peer, suite: CipherSuite) -> Result<(), Error> {
    let mut extensions = Vec::new();
    if peer.handshake.ticket_expected {
        extensions.push(Extension::new(ExtensionType::SessionTicket, &[]));
    }
    if suite.has_ecc() {
        extensions.push(Extension::new(
            ExtensionType::EcPointFormats,
            &EC_POINT_FORMATS_UNCOMPRESSED,
        ));
    }

    let server_hello = ServerHello {
        server_version: ProtocolVersion::DTLS1_2,
        random: Random::from_bytes(&peer.next_params().server_random),
        session_id: peer.handshake.session_id,
        cipher_suite: suite,
        compression_method: CompressionMethod::Null,
        extensions,
    };

    let mut body = Vec::new();
    server_hello.serialize(&mut body);
    peer.send_handshake(MessageType::ServerHello, &body)
}
