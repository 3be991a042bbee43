// DTLS client handshake flow:
//
// 1. Client sends ClientHello (empty cookie, cached ticket if any)
// 2. Server may answer HelloVerifyRequest
//    - Client resends ClientHello with the cookie and the same random
// 3. Server sends ServerHello and either
//    - Certificate, ServerKeyExchange, [CertificateRequest], ServerHelloDone (ECDHE)
//    - [ServerKeyExchange with identity hint], ServerHelloDone (PSK)
// 4. Client sends [Certificate], ClientKeyExchange, [CertificateVerify],
//    ChangeCipherSpec, Finished
// 5. Server sends [NewSessionTicket], ChangeCipherSpec, Finished
//
// When the server accepts the ticket it echoes our session id and skips to
// [NewSessionTicket], ChangeCipherSpec, Finished. We answer with
// ChangeCipherSpec, Finished.

use std::time::{Duration, Instant};

use crate::buffer::Buf;
use crate::context::Context;
use crate::crypto::prf::{key_expansion, psk_premaster, FinishedLabel};
use crate::event::{Credentials, Handler};
use crate::handshake::{certificate_identity, install_next_keys, send_finished, sign};
use crate::message::{AlertDescription, Certificate, CertificateRequest, CipherSuite, ClientHello};
use crate::message::{ClientKeyExchange, CompressionMethod, DigitallySigned, Extension};
use crate::message::{ExtensionType, Handshake, HelloVerifyRequest, MessageType, NewSessionTicket};
use crate::message::{ProtocolVersion, Random, ServerHello, ServerKeyExchange, SessionId};
use crate::message::{EC_POINT_FORMATS_UNCOMPRESSED, NAMED_CURVE_SECP256R1, SUPPORTED_GROUPS_P256};
use crate::peer::{Peer, State};
use crate::ticket::{ClientTicket, PeerIdentity};
use crate::Error;

/// Session id sent alongside a ticket, so the server can signal resumption by echoing it.
const TICKET_SESSION_ID_LEN: usize = 32;

impl<H: Handler> Context<H> {
    pub(crate) fn client_handshake(
        &mut self,
        peer: &mut Peer,
        message: &Handshake<'_>,
        now: Instant,
    ) -> Result<(), Error> {
        use MessageType as M;

        match (peer.state, message.header.msg_type) {
            (State::ClientHello, M::HelloVerifyRequest) => {
                self.check_hello_verify_request(peer, message, now)
            }
            (State::ClientHello, M::ServerHello) => self.check_server_hello(peer, message, now),
            (State::WaitServerCertificate, M::Certificate) => self.check_certificate(peer, message),
            (State::WaitServerKeyExchange, M::ServerKeyExchange)
            | (State::WaitServerHelloDone, M::ServerKeyExchange) => {
                self.check_server_key_exchange(peer, message)
            }
            (State::WaitCertificateRequest, M::CertificateRequest) => {
                self.check_certificate_request(peer, message)
            }
            (State::WaitCertificateRequest, M::ServerHelloDone)
            | (State::WaitServerHelloDone, M::ServerHelloDone) => {
                self.check_server_hello_done(peer, message)
            }
            (State::SessionTicket, M::NewSessionTicket) => {
                self.check_new_session_ticket(peer, message, now)
            }
            (State::WaitServerFinished, M::Finished) => self.check_finished(peer, message, now),
            (state, msg_type) => Err(Error::UnexpectedMessage(format!(
                "{:?} in client state {:?}",
                msg_type, state
            ))),
        }
    }

    /// Begin a handshake on a peer whose next slot was just prepared.
    pub(crate) fn start_client_handshake(&mut self, peer: &mut Peer, now: Instant) -> Result<(), Error> {
        let random = Random::new(now, &mut self.rng);
        peer.next_params_mut().client_random = random.to_bytes();

        self.send_client_hello(peer, now)?;
        self.schedule_flight(peer.session, now);
        Ok(())
    }

    /// The suites we can offer with the credentials the application has for this peer.
    fn client_cipher_suites(&mut self, peer: &Peer) -> Vec<CipherSuite> {
        let psk = self
            .handler
            .get_key(&peer.session, None)
            .map(|c| c.is_psk())
            .unwrap_or(false);

        self.config
            .cipher_suites()
            .iter()
            .copied()
            .filter(|s| if psk { s.is_psk() } else { s.has_ecc() })
            .collect()
    }

    fn send_client_hello(&mut self, peer: &mut Peer, now: Instant) -> Result<(), Error> {
        if peer.handshake.offered_suites.is_empty() {
            peer.handshake.offered_suites = self.client_cipher_suites(peer);
        }
        if peer.handshake.offered_suites.is_empty() {
            return Err(Error::ConfigError(format!(
                "No usable cipher suite for {}",
                peer.session
            )));
        }
        let suites = peer.handshake.offered_suites.clone();

        let ticket = if self.config.session_tickets() {
            self.tickets
                .get(&peer.session, now)
                .filter(|t| suites.contains(&t.cipher_suite))
                .map(|t| t.ticket.clone())
        } else {
            None
        };

        if ticket.is_some() && peer.handshake.session_id.is_empty() {
            peer.handshake.session_id = SessionId::random(TICKET_SESSION_ID_LEN, &mut self.rng)
                .map_err(|e| Error::CryptoError(e.to_string()))?;
        }
        peer.handshake.offered_ticket = ticket.is_some();

        let mut extensions = Vec::new();
        if self.config.session_tickets() {
            let data = ticket.as_deref().unwrap_or(&[]);
            extensions.push(Extension::new(ExtensionType::SessionTicket, data));
        }
        if suites.iter().any(|s| s.has_ecc()) {
            extensions.push(Extension::new(ExtensionType::SupportedGroups, &SUPPORTED_GROUPS_P256));
            extensions.push(Extension::new(
                ExtensionType::EcPointFormats,
                &EC_POINT_FORMATS_UNCOMPRESSED,
            ));
        }

        let client_hello = ClientHello {
            client_version: ProtocolVersion::DTLS1_2,
            random: Random::from_bytes(&peer.next_params().client_random),
            session_id: peer.handshake.session_id,
            cookie: peer.handshake.cookie,
            cipher_suites: suites,
            compression_methods: vec![CompressionMethod::Null],
            extensions,
        };

        let mut body = Vec::new();
        client_hello.serialize(&mut body);

        debug!(
            "{} sending ClientHello (cookie: {}, ticket: {})",
            peer.session,
            !peer.handshake.cookie.is_empty(),
            peer.handshake.offered_ticket
        );

        peer.flight_begin();
        peer.send_handshake(MessageType::ClientHello, &body)?;
        peer.state = State::ClientHello;
        Ok(())
    }

    fn check_hello_verify_request(
        &mut self,
        peer: &mut Peer,
        message: &Handshake<'_>,
        now: Instant,
    ) -> Result<(), Error> {
        let (_, hello_verify) = HelloVerifyRequest::parse(message.body)?;
        debug!("{} got HelloVerifyRequest", peer.session);

        // The cookie exchange is not part of the handshake transcript.
        peer.handshake.cookie = hello_verify.cookie;
        peer.handshake.transcript.clear();

        self.send_client_hello(peer, now)
    }

    fn check_server_hello(
        &mut self,
        peer: &mut Peer,
        message: &Handshake<'_>,
        now: Instant,
    ) -> Result<(), Error> {
        let (_, server_hello) = ServerHello::parse(message.body)?;

        if server_hello.server_version != ProtocolVersion::DTLS1_2 {
            return Err(Error::Alert(AlertDescription::ProtocolVersion));
        }
        let suite = server_hello.cipher_suite;
        if !peer.handshake.offered_suites.contains(&suite) {
            debug!("{} server picked {:?} which we did not offer", peer.session, suite);
            return Err(Error::Alert(AlertDescription::IllegalParameter));
        }
        if server_hello.compression_method != CompressionMethod::Null {
            return Err(Error::Alert(AlertDescription::IllegalParameter));
        }

        peer.handshake.transcript.update(message.raw);
        peer.handshake.ticket_expected = server_hello.announces_ticket();

        let params = peer.next_params_mut();
        params.server_random = server_hello.random.to_bytes();
        params.cipher_suite = Some(suite);

        let resumed = peer.handshake.offered_ticket
            && !server_hello.session_id.is_empty()
            && server_hello.session_id == peer.handshake.session_id;

        if resumed {
            let Some(cached) = self.tickets.get(&peer.session, now) else {
                return Err(Error::Alert(AlertDescription::IllegalParameter));
            };
            if cached.cipher_suite != suite {
                return Err(Error::Alert(AlertDescription::IllegalParameter));
            }
            let master = cached.master_secret.clone();
            peer.identity = cached.identity.clone();

            let params = peer.next_params_mut();
            let key_block = key_expansion(&master, &params.client_random, &params.server_random)
                .map_err(Error::CryptoError)?;
            params.install_keys(self.config.crypto_provider(), suite, master, &key_block)?;

            debug!("{} resuming session", peer.session);
            peer.handshake.resumption = true;
            peer.state = if peer.handshake.ticket_expected {
                State::SessionTicket
            } else {
                State::KeyExchange
            };
            return Ok(());
        }

        if peer.handshake.offered_ticket {
            debug!("{} ticket not accepted, full handshake", peer.session);
            self.tickets.remove(&peer.session);
        }
        // Fresh session: nothing left from a previous handshake identifies the server.
        peer.identity = PeerIdentity::None;

        peer.state = if suite.has_ecc() {
            State::WaitServerCertificate
        } else {
            State::WaitServerHelloDone
        };
        Ok(())
    }

    fn check_server_key_exchange(&mut self, peer: &mut Peer, message: &Handshake<'_>) -> Result<(), Error> {
        let suite = peer
            .next_params()
            .cipher_suite
            .ok_or_else(|| Error::UnexpectedMessage("ServerKeyExchange before ServerHello".into()))?;

        let (_, server_key_exchange) = ServerKeyExchange::parse(message.body, suite)?;

        match server_key_exchange {
            ServerKeyExchange::Ecdh { params, signed } => {
                if peer.state != State::WaitServerKeyExchange {
                    return Err(Error::UnexpectedMessage("ECDH parameters out of order".into()));
                }
                if params.named_curve != NAMED_CURVE_SECP256R1 || !signed.is_ecdsa_sha256() {
                    return Err(Error::Alert(AlertDescription::HandshakeFailure));
                }

                let certificate = peer
                    .handshake
                    .peer_certificate
                    .clone()
                    .ok_or_else(|| Error::UnexpectedMessage("No server certificate".into()))?;

                let next = peer.next_params();
                let mut signed_data = Vec::with_capacity(64 + params.raw.len());
                signed_data.extend_from_slice(&next.client_random);
                signed_data.extend_from_slice(&next.server_random);
                signed_data.extend_from_slice(params.raw);

                self.config
                    .crypto_provider()
                    .signature_verification
                    .verify_signature(&certificate, &signed_data, signed.signature)
                    .map_err(|e| {
                        warn!("{} ServerKeyExchange signature: {}", peer.session, e);
                        Error::Alert(AlertDescription::DecryptError)
                    })?;

                peer.identity = certificate_identity(&certificate);
                peer.handshake.peer_ecdh_public = Some(params.public_key.to_vec());
                peer.state = State::WaitCertificateRequest;
            }
            ServerKeyExchange::PskHint(hint) => {
                if !suite.is_psk() {
                    return Err(Error::UnexpectedMessage("Identity hint outside PSK".into()));
                }
                trace!("{} PSK identity hint {:?}", peer.session, String::from_utf8_lossy(hint));
                peer.handshake.psk_identity_hint = Some(hint.to_vec());
            }
        }

        peer.handshake.transcript.update(message.raw);
        Ok(())
    }

    fn check_certificate_request(&mut self, peer: &mut Peer, message: &Handshake<'_>) -> Result<(), Error> {
        let (_, request) = CertificateRequest::parse(message.body)?;
        if !request.accepts_ecdsa_sha256() {
            debug!("{} CertificateRequest does not list ecdsa/sha256", peer.session);
        }

        peer.handshake.transcript.update(message.raw);
        peer.handshake.client_certificate_requested = true;
        peer.state = State::WaitServerHelloDone;
        Ok(())
    }

    fn check_server_hello_done(&mut self, peer: &mut Peer, message: &Handshake<'_>) -> Result<(), Error> {
        if !message.body.is_empty() {
            return Err(Error::ParseError("ServerHelloDone with a body".into()));
        }
        let suite = peer
            .next_params()
            .cipher_suite
            .ok_or_else(|| Error::UnexpectedMessage("ServerHelloDone before ServerHello".into()))?;

        peer.handshake.transcript.update(message.raw);
        peer.flight_begin();

        let provider = self.config.crypto_provider();

        let premaster = if suite.has_ecc() {
            let credentials = if peer.handshake.client_certificate_requested {
                let credentials = self
                    .handler
                    .get_key(&peer.session, None)
                    .filter(|c| !c.is_psk());

                let certificate = match &credentials {
                    Some(Credentials::Ecdsa { certificate, .. }) => Some(certificate.as_slice()),
                    _ => None,
                };
                let mut body = Vec::new();
                Certificate { certificate }.serialize(&mut body);
                peer.send_handshake(MessageType::Certificate, &body)?;
                credentials
            } else {
                None
            };

            let server_point = peer
                .handshake
                .peer_ecdh_public
                .take()
                .ok_or_else(|| Error::UnexpectedMessage("No server ECDH parameters".into()))?;

            let group = provider
                .find_kx_group(NAMED_CURVE_SECP256R1)
                .ok_or(Error::Alert(AlertDescription::InternalError))?;
            let key_exchange = group.start_exchange().map_err(|e| {
                warn!("Key exchange: {}", e);
                Error::Alert(AlertDescription::InternalError)
            })?;

            let mut body = Vec::new();
            ClientKeyExchange::Ecdh {
                public_key: key_exchange.pub_key(),
            }
            .serialize(&mut body);

            let mut shared = Buf::new();
            key_exchange.complete(&server_point, &mut shared).map_err(|e| {
                debug!("{} bad server point: {}", peer.session, e);
                Error::Alert(AlertDescription::IllegalParameter)
            })?;

            peer.send_handshake(MessageType::ClientKeyExchange, &body)?;

            if let Some(Credentials::Ecdsa { private_key, .. }) = &credentials {
                let signature = sign(provider, private_key, peer.handshake.transcript.as_bytes())?;
                let mut body = Vec::new();
                DigitallySigned::ecdsa_sha256(&signature).serialize(&mut body);
                peer.send_handshake(MessageType::CertificateVerify, &body)?;
            }

            shared
        } else {
            let hint = peer.handshake.psk_identity_hint.clone();
            let credentials = self.handler.get_key(&peer.session, hint.as_deref());
            let Some(Credentials::Psk { identity, key }) = &credentials else {
                debug!("{} no PSK for this server", peer.session);
                return Err(Error::Alert(AlertDescription::HandshakeFailure));
            };

            let mut body = Vec::new();
            ClientKeyExchange::Psk {
                identity: identity.as_slice(),
            }
            .serialize(&mut body);
            peer.send_handshake(MessageType::ClientKeyExchange, &body)?;
            peer.identity = PeerIdentity::Psk(identity.clone());

            let premaster = psk_premaster(key).map_err(|e| {
                warn!("{}", e);
                Error::Alert(AlertDescription::InternalError)
            })?;
            Buf::from_slice(&premaster)
        };

        install_next_keys(provider, peer, suite, &premaster)?;
        peer.send_change_cipher_spec()?;
        send_finished(peer, FinishedLabel::Client)?;

        peer.state = if peer.handshake.ticket_expected {
            State::SessionTicket
        } else {
            State::KeyExchange
        };
        Ok(())
    }

    fn check_new_session_ticket(
        &mut self,
        peer: &mut Peer,
        message: &Handshake<'_>,
        now: Instant,
    ) -> Result<(), Error> {
        let (_, new_session_ticket) = NewSessionTicket::parse(message.body)?;
        peer.handshake.transcript.update(message.raw);

        let params = peer.next_params();
        match (params.cipher_suite, &params.master_secret) {
            (Some(cipher_suite), Some(master_secret)) if !new_session_ticket.ticket.is_empty() => {
                let lifetime = match new_session_ticket.lifetime_hint {
                    0 => self.config.ticket_lifetime(),
                    secs => Duration::from_secs(secs as u64),
                };
                self.tickets.insert(
                    peer.session,
                    ClientTicket {
                        ticket: new_session_ticket.ticket.to_vec(),
                        master_secret: master_secret.clone(),
                        cipher_suite,
                        identity: peer.identity.clone(),
                        received_at: now,
                        lifetime,
                    },
                );
                debug!("{} stored session ticket ({:?})", peer.session, lifetime);
            }
            _ => trace!("{} empty session ticket", peer.session),
        }

        peer.state = State::KeyExchange;
        Ok(())
    }
}
