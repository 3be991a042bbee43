//! The DTLS context: every peer of one local endpoint.
//!
//! The context is sans-IO. Datagrams come in through [`Context::handle_message`],
//! go out through [`Handler::write`], and time only moves when the caller passes
//! `now`. Records for a peer are processed with the peer taken out of the table,
//! so validators can borrow the context and the peer at the same time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::cookie::CookieJar;
use crate::event::{Event, Handler};
use crate::message::{Alert, AlertDescription, AlertLevel, ContentType, DTLSRecord};
use crate::message::{Handshake, HelloVerifyRequest, MessageType, Sequence, RECORD_HEADER_LEN};
use crate::peer::{Peer, Session, State};
use crate::record::Role;
use crate::retransmit::RetransmitQueue;
use crate::rng::SeededRng;
use crate::ticket::{PeerIdentity, TicketCache, TicketKey};
use crate::timer::ExponentialBackoff;
use crate::Error;

/// A DTLS 1.2 endpoint serving any number of peers.
pub struct Context<H: Handler> {
    pub(crate) config: Arc<Config>,
    pub(crate) handler: H,
    peers: HashMap<Session, Peer>,
    pub(crate) retransmit: RetransmitQueue,
    cookies: CookieJar,
    pub(crate) ticket_key: Option<TicketKey>,
    pub(crate) tickets: TicketCache,
    pub(crate) rng: SeededRng,
}

impl<H: Handler> Context<H> {
    pub fn new(config: Arc<Config>, handler: H, now: Instant) -> Result<Self, Error> {
        let mut rng = SeededRng::new(config.rng_seed());
        let cookies = CookieJar::new(now, config.cookie_lifetime(), &mut rng);

        let ticket_key = if config.session_tickets() {
            Some(TicketKey::new(config.crypto_provider(), &mut rng)?)
        } else {
            None
        };

        Ok(Context {
            tickets: TicketCache::new(config.max_peers()),
            config,
            handler,
            peers: HashMap::new(),
            retransmit: RetransmitQueue::new(),
            cookies,
            ticket_key,
            rng,
        })
    }

    /// Process one received datagram.
    ///
    /// Malformed or unauthenticated records are dropped. Handshake failures are
    /// answered with a fatal alert and reported as [`Event::HandshakeFailed`].
    /// Only resource exhaustion and transport errors are returned.
    pub fn handle_message(&mut self, session: Session, datagram: &[u8], now: Instant) -> Result<(), Error> {
        self.cookies.rotate_if_due(now, &mut self.rng);

        let mut slot = self.peers.remove(&session);
        let mut result = Ok(());
        let mut input = datagram;

        while !input.is_empty() {
            let (rest, record) = match DTLSRecord::parse(input) {
                Ok(v) => v,
                Err(e) => {
                    debug!("{} dropping unparseable datagram tail: {}", session, e);
                    break;
                }
            };
            input = rest;

            match self.handle_record(session, &mut slot, &record, now) {
                Ok(()) => {}
                Err(e) if e.is_silent_drop() => {
                    debug!("{} dropped {:?} record: {}", session, record.content_type, e);
                }
                Err(Error::Alert(description)) => {
                    if let Some(peer) = slot.take() {
                        result = self.abort(peer, description);
                    }
                    break;
                }
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }

        if let Some(mut peer) = slot {
            if std::mem::take(&mut peer.handshake.resend_requested) {
                if let Err(e) = peer.resend_flight() {
                    warn!("{} resend failed: {}", session, e);
                }
            }
            let flushed = flush(&mut self.handler, &mut peer);
            self.peers.insert(session, peer);
            result = result.and(flushed);
        }

        result
    }

    fn handle_record(
        &mut self,
        session: Session,
        slot: &mut Option<Peer>,
        record: &DTLSRecord<'_>,
        now: Instant,
    ) -> Result<(), Error> {
        let Some(peer) = slot.as_mut() else {
            return self.accept_client_hello(session, slot, record, now);
        };

        if record.sequence.epoch != peer.read_epoch() {
            let restart = peer.role == Role::Server
                && record.sequence.epoch == 0
                && record.content_type == ContentType::Handshake;
            if restart {
                return self.accept_client_hello(session, slot, record, now);
            }
            trace!(
                "{} dropping epoch {} record, reading epoch {}",
                session,
                record.sequence.epoch,
                peer.read_epoch()
            );
            return Ok(());
        }

        let plaintext = peer.decrypt(record)?;

        match record.content_type {
            ContentType::Handshake => self.handle_handshake(peer, &plaintext, now),
            ContentType::ChangeCipherSpec => handle_change_cipher_spec(peer, &plaintext),
            ContentType::Alert => self.handle_alert(slot, &plaintext),
            ContentType::ApplicationData => {
                if !peer.established || peer.state == State::Closing {
                    return Err(Error::UnexpectedMessage("Application data outside a session".into()));
                }
                if !plaintext.is_empty() {
                    self.handler.read(&session, &plaintext);
                }
                Ok(())
            }
            ContentType::Unknown(t) => Err(Error::ParseError(format!("Unknown content type {}", t))),
        }
    }

    /// An epoch 0 ClientHello from an address without a live association.
    ///
    /// Nothing is allocated until the ClientHello carries a valid cookie.
    fn accept_client_hello(
        &mut self,
        session: Session,
        slot: &mut Option<Peer>,
        record: &DTLSRecord<'_>,
        now: Instant,
    ) -> Result<(), Error> {
        if record.sequence.epoch != 0 || record.content_type != ContentType::Handshake {
            return Err(Error::UnexpectedMessage(format!(
                "{:?} record from unknown peer",
                record.content_type
            )));
        }

        let (_, message) = Handshake::parse(record.fragment)?;
        if message.header.msg_type != MessageType::ClientHello || message.header.is_fragment() {
            return Err(Error::UnexpectedMessage(format!(
                "{:?} from unknown peer",
                message.header.msg_type
            )));
        }

        if !self.cookies.verify(&session, message.body) {
            return self.send_hello_verify_request(session, record, &message);
        }

        if let Some(existing) = slot.as_ref() {
            let random = message.body.get(2..34);
            let stale = [existing.current_params(), existing.next_params()]
                .iter()
                .any(|p| random == Some(&p.client_random[..]));
            if stale {
                return Err(Error::UnexpectedMessage("Stale ClientHello".into()));
            }
            info!("{} restarted, replacing association", session);
            self.retransmit.cancel(&session);
            *slot = None;
            self.handler.event(&session, Event::Closed);
        }

        if self.peers.len() >= self.config.max_peers() {
            warn!("Peer table full, refusing {}", session);
            return Err(Error::PeerTableFull);
        }

        debug!("{} cookie verified, new association", session);
        let mut peer = Peer::new(session, Role::Server, self.config.mtu());
        peer.begin_handshake()?;
        peer.handshake.next_recv_seq = message.header.message_seq;
        peer.handshake.next_send_seq = message.header.message_seq;
        peer.current_params_mut()
            .set_sequence_number(record.sequence.sequence_number);

        let peer = slot.insert(peer);
        self.handle_handshake(peer, record.fragment, now)
    }

    /// Answer without keeping any state.
    fn send_hello_verify_request(
        &mut self,
        session: Session,
        record: &DTLSRecord<'_>,
        client_hello: &Handshake<'_>,
    ) -> Result<(), Error> {
        let Some(cookie) = self.cookies.create(&session, client_hello.body) else {
            return Err(Error::ParseError("ClientHello too short for a cookie".into()));
        };

        let mut body = Vec::new();
        HelloVerifyRequest::new(cookie).serialize(&mut body);

        let mut fragment = Vec::new();
        Handshake::serialize(
            MessageType::HelloVerifyRequest,
            client_hello.header.message_seq,
            &body,
            &mut fragment,
        );

        // Same record sequence number as the ClientHello it answers.
        let mut datagram = Vec::with_capacity(RECORD_HEADER_LEN + fragment.len());
        DTLSRecord::serialize_header(
            ContentType::Handshake,
            Sequence::new(0, record.sequence.sequence_number),
            fragment.len() as u16,
            &mut datagram,
        );
        datagram.extend_from_slice(&fragment);

        debug!("{} sending HelloVerifyRequest", session);
        self.handler.write(&session, &datagram)?;
        Ok(())
    }

    fn handle_alert(&mut self, slot: &mut Option<Peer>, fragment: &[u8]) -> Result<(), Error> {
        let (_, alert) = Alert::parse(fragment)?;
        let Some(peer) = slot.as_mut() else {
            return Ok(());
        };
        let session = peer.session;

        debug!("{} received {:?} {:?}", session, alert.level, alert.description);
        self.handler.event(
            &session,
            Event::Alert {
                level: alert.level,
                description: alert.description,
            },
        );

        if alert.description == AlertDescription::CloseNotify {
            if peer.state != State::Closing {
                peer.send_alert(AlertLevel::Warning, AlertDescription::CloseNotify)?;
                flush(&mut self.handler, peer)?;
            }
            self.retransmit.cancel(&session);
            *slot = None;
            self.handler.event(&session, Event::Closed);
        } else if alert.is_terminal() {
            info!("{} fatal alert, dropping association", session);
            self.retransmit.cancel(&session);
            *slot = None;
        } else if alert.description == AlertDescription::NoRenegotiation
            && peer.role == Role::Client
            && peer.handshake.renegotiating
            && peer.state == State::ClientHello
        {
            debug!("{} declined renegotiation", session);
            self.retransmit.cancel(&session);
            peer.state = State::Connected;
        }

        Ok(())
    }

    /// Send a fatal alert and drop the peer.
    fn abort(&mut self, mut peer: Peer, description: AlertDescription) -> Result<(), Error> {
        let session = peer.session;
        warn!("{} handshake failed: {:?}", session, description);

        peer.send_alert(AlertLevel::Fatal, description)?;
        let result = flush(&mut self.handler, &mut peer);

        self.retransmit.cancel(&session);
        self.handler.event(&session, Event::HandshakeFailed(description));
        result
    }

    pub(crate) fn schedule_flight(&mut self, session: Session, now: Instant) {
        let backoff = ExponentialBackoff::new(
            self.config.flight_start_rto(),
            self.config.flight_retries(),
            &mut self.rng,
        );
        self.retransmit.schedule(session, now, backoff);
    }

    /// Start a client handshake with `session`.
    pub fn connect(&mut self, session: Session, now: Instant) -> Result<(), Error> {
        if self.peers.contains_key(&session) {
            return Err(Error::PeerExists);
        }
        if self.peers.len() >= self.config.max_peers() {
            warn!("Peer table full, not connecting to {}", session);
            return Err(Error::PeerTableFull);
        }

        info!("Connecting to {}", session);
        let mut peer = Peer::new(session, Role::Client, self.config.mtu());
        peer.begin_handshake()?;
        self.start_client_handshake(&mut peer, now)?;

        let result = flush(&mut self.handler, &mut peer);
        self.peers.insert(session, peer);
        result
    }

    /// Send application data to a connected peer.
    pub fn write(&mut self, session: Session, data: &[u8]) -> Result<(), Error> {
        let peer = self.peers.get_mut(&session).ok_or(Error::UnknownPeer)?;
        if !peer.established || peer.state == State::Closing {
            return Err(Error::NotConnected);
        }

        peer.send_application_data(data)?;
        flush(&mut self.handler, peer)
    }

    /// Send close_notify. The peer is forgotten once the other side answers, or
    /// after one retransmission timeout.
    pub fn close(&mut self, session: Session, now: Instant) -> Result<(), Error> {
        let peer = self.peers.get_mut(&session).ok_or(Error::UnknownPeer)?;

        if !peer.established {
            debug!("{} closed during handshake", session);
            self.peers.remove(&session);
            self.retransmit.cancel(&session);
            self.handler.event(&session, Event::Closed);
            return Ok(());
        }
        if peer.state == State::Closing {
            return Ok(());
        }

        info!("Closing {}", session);
        peer.send_alert(AlertLevel::Warning, AlertDescription::CloseNotify)?;
        peer.state = State::Closing;
        let result = flush(&mut self.handler, peer);

        let backoff = ExponentialBackoff::new(self.config.flight_start_rto(), 0, &mut self.rng);
        self.retransmit.schedule(session, now, backoff);
        result
    }

    /// Run a new full handshake over an established client association.
    pub fn renegotiate(&mut self, session: Session, now: Instant) -> Result<(), Error> {
        let mut peer = self.peers.remove(&session).ok_or(Error::UnknownPeer)?;
        if peer.role != Role::Client || peer.state != State::Connected {
            self.peers.insert(session, peer);
            return Err(Error::NotConnected);
        }

        info!("Renegotiating with {}", session);
        let result = peer
            .begin_handshake()
            .and_then(|_| self.start_client_handshake(&mut peer, now))
            .and_then(|_| flush(&mut self.handler, &mut peer));

        self.peers.insert(session, peer);
        result
    }

    /// Drive retransmissions and expiry. Call at or after [`Context::poll_timeout`].
    pub fn handle_timeout(&mut self, now: Instant) -> Result<(), Error> {
        self.cookies.rotate_if_due(now, &mut self.rng);

        let mut result = Ok(());
        for (session, mut backoff) in self.retransmit.take_due(now) {
            let Some(mut peer) = self.peers.remove(&session) else {
                continue;
            };

            if peer.state == State::Closing {
                debug!("{} close_notify unanswered", session);
                self.handler.event(&session, Event::Closed);
                continue;
            }

            if !backoff.can_retry() {
                warn!("{} timed out in {:?}", session, peer.state);
                self.handler.event(&session, Event::Timeout);
                continue;
            }

            backoff.attempt(&mut self.rng);
            debug!("{} retransmitting, {} retries left", session, backoff.retries_left());
            let resent = peer
                .resend_flight()
                .and_then(|_| flush(&mut self.handler, &mut peer));
            if let Err(e) = resent {
                result = result.and(Err(e));
            }

            self.retransmit.requeue(session, now + backoff.rto(), backoff);
            self.peers.insert(session, peer);
        }

        result
    }

    /// When [`Context::handle_timeout`] next needs to run.
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.retransmit.poll_timeout()
    }

    pub fn peer_state(&self, session: Session) -> Option<State> {
        self.peers.get(&session).map(|p| p.state)
    }

    /// Who the peer proved to be: a PSK identity or a public key fingerprint.
    pub fn peer_identity(&self, session: Session) -> Option<&PeerIdentity> {
        self.peers.get(&session).map(|p| &p.identity)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}

fn handle_change_cipher_spec(peer: &mut Peer, fragment: &[u8]) -> Result<(), Error> {
    if fragment != [1] {
        return Err(Error::ParseError("Malformed ChangeCipherSpec".into()));
    }
    if peer.state != State::KeyExchange {
        return Err(Error::UnexpectedMessage(format!(
            "ChangeCipherSpec in {:?}",
            peer.state
        )));
    }

    peer.advance_read_epoch();
    peer.state = match peer.role {
        Role::Client => State::WaitServerFinished,
        Role::Server => State::WaitFinished,
    };
    trace!("{} reading epoch {}", peer.session, peer.read_epoch());
    Ok(())
}

/// Hand every queued datagram of `peer` to the application.
fn flush<H: Handler>(handler: &mut H, peer: &mut Peer) -> Result<(), Error> {
    for datagram in peer.take_datagrams() {
        handler.write(&peer.session, &datagram)?;
    }
    Ok(())
}
