//! Per-peer state.
//!
//! A peer owns two [`SecurityParameters`] slots. One protects current traffic while
//! the other collects the next epoch's keys during a handshake. The first
//! ChangeCipherSpec of a handshake (sent or received) flips which slot is current.
//! The other direction then catches up into the already switched slot. The old
//! epoch stays addressable so a flight can be resent under the epoch it was
//! first sent in.

use std::fmt;
use std::net::SocketAddr;

use crate::buffer::Buf;
use crate::crypto::aead::AEAD_OVERHEAD;
use crate::crypto::hash::Transcript;
use crate::crypto::ActiveKeyExchange;
use crate::message::{Alert, AlertDescription, AlertLevel, CipherSuite, ContentType, Cookie};
use crate::message::{DTLSRecord, Handshake, MessageType, SessionId};
use crate::message::{HANDSHAKE_HEADER_LEN, RECORD_HEADER_LEN};
use crate::record::{decrypt_verify, prepare_record, Role, SecurityParameters};
use crate::ticket::PeerIdentity;
use crate::Error;

/// Identifies a remote endpoint: its address and the local interface it talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Session {
    pub addr: SocketAddr,
    pub ifindex: u32,
}

impl Session {
    pub fn new(addr: SocketAddr, ifindex: u32) -> Self {
        Session { addr, ifindex }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%{}", self.addr, self.ifindex)
    }
}

/// Where a peer is in its handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Client sent ClientHello, awaiting HelloVerifyRequest or ServerHello.
    ClientHello,
    WaitServerCertificate,
    WaitServerKeyExchange,
    /// Awaiting CertificateRequest or ServerHelloDone.
    WaitCertificateRequest,
    WaitServerHelloDone,
    /// Server processing a ClientHello.
    ServerHello,
    /// Awaiting the client Certificate (when requested) and ClientKeyExchange.
    WaitClientKeyExchange,
    WaitCertificateVerify,
    /// Awaiting NewSessionTicket.
    SessionTicket,
    /// Awaiting ChangeCipherSpec.
    KeyExchange,
    /// Client awaiting the server Finished.
    WaitServerFinished,
    /// Server awaiting the client Finished.
    WaitFinished,
    Connected,
    /// We sent close_notify.
    Closing,
}

/// Everything that only lives for the duration of one handshake.
#[derive(Default)]
pub(crate) struct HandshakeState {
    pub transcript: Transcript,
    pub next_send_seq: u16,
    pub next_recv_seq: u16,
    pub key_exchange: Option<Box<dyn ActiveKeyExchange>>,
    /// DER SubjectPublicKeyInfo from the peer's Certificate.
    pub peer_certificate: Option<Vec<u8>>,
    /// Server ECDH point from ServerKeyExchange.
    pub peer_ecdh_public: Option<Vec<u8>>,
    /// PSK identity hint from ServerKeyExchange.
    pub psk_identity_hint: Option<Vec<u8>>,
    pub cookie: Cookie,
    pub session_id: SessionId,
    /// Suites the client put in its ClientHello.
    pub offered_suites: Vec<CipherSuite>,
    /// Client put a cached ticket in its ClientHello.
    pub offered_ticket: bool,
    /// Abbreviated handshake.
    pub resumption: bool,
    /// A NewSessionTicket is part of the server's last flight.
    pub ticket_expected: bool,
    pub client_certificate_requested: bool,
    /// The peer was connected before this handshake started.
    pub renegotiating: bool,
    /// Slots flipped by the first ChangeCipherSpec.
    pub switched: bool,
    /// A duplicate message asks for our last flight again.
    pub resend_requested: bool,
    /// A new flight went out while processing the current message.
    pub flight_sent: bool,
}

impl fmt::Debug for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeState")
            .field("next_send_seq", &self.next_send_seq)
            .field("next_recv_seq", &self.next_recv_seq)
            .field("resumption", &self.resumption)
            .field("renegotiating", &self.renegotiating)
            .finish_non_exhaustive()
    }
}

/// One record of the last flight, kept as plaintext for resending.
#[derive(Debug)]
struct FlightRecord {
    content_type: ContentType,
    epoch: u16,
    fragment: Buf,
}

#[derive(Debug)]
pub(crate) struct Peer {
    pub session: Session,
    pub role: Role,
    pub state: State,
    pub handshake: HandshakeState,
    /// Who the remote is, once the handshake authenticated it.
    pub identity: PeerIdentity,
    /// Reached `Connected` at least once.
    pub established: bool,
    params: [SecurityParameters; 2],
    current: usize,
    read_epoch: u16,
    write_epoch: u16,
    last_flight: Vec<FlightRecord>,
    /// Datagrams ready to be written, each at most `mtu` bytes.
    pending_tx: Vec<Vec<u8>>,
    mtu: usize,
}

impl Peer {
    pub fn new(session: Session, role: Role, mtu: usize) -> Self {
        Peer {
            session,
            role,
            state: match role {
                Role::Client => State::ClientHello,
                Role::Server => State::ServerHello,
            },
            handshake: HandshakeState::default(),
            identity: PeerIdentity::None,
            established: false,
            params: [
                SecurityParameters::new(role, 0),
                SecurityParameters::new(role, 1),
            ],
            current: 0,
            read_epoch: 0,
            write_epoch: 0,
            last_flight: Vec::new(),
            pending_tx: Vec::new(),
            mtu,
        }
    }

    /// Reset handshake state and prepare the next epoch's slot.
    pub fn begin_handshake(&mut self) -> Result<(), Error> {
        let next_epoch = self.params[self.current]
            .epoch
            .checked_add(1)
            .ok_or(Error::WrappedEpoch)?;

        self.params[self.current ^ 1] = SecurityParameters::new(self.role, next_epoch);
        self.handshake = HandshakeState {
            renegotiating: self.established,
            ..HandshakeState::default()
        };

        Ok(())
    }

    pub fn read_epoch(&self) -> u16 {
        self.read_epoch
    }

    #[cfg(test)]
    pub fn write_epoch(&self) -> u16 {
        self.write_epoch
    }

    /// The parameters in effect for traffic.
    pub fn current_params(&self) -> &SecurityParameters {
        &self.params[self.current]
    }

    pub fn current_params_mut(&mut self) -> &mut SecurityParameters {
        &mut self.params[self.current]
    }

    /// The parameters the running handshake negotiates.
    pub fn next_params(&self) -> &SecurityParameters {
        &self.params[self.next_index()]
    }

    pub fn next_params_mut(&mut self) -> &mut SecurityParameters {
        let i = self.next_index();
        &mut self.params[i]
    }

    fn next_index(&self) -> usize {
        if self.handshake.switched {
            self.current
        } else {
            self.current ^ 1
        }
    }

    fn params_for_epoch(&mut self, epoch: u16) -> Result<&mut SecurityParameters, Error> {
        self.params
            .iter_mut()
            .find(|p| p.epoch == epoch)
            .ok_or_else(|| Error::SecurityError(format!("No parameters for epoch {}", epoch)))
    }

    fn switch(&mut self) {
        if !self.handshake.switched {
            self.current ^= 1;
            self.handshake.switched = true;
            debug!(
                "{} switched to epoch {}",
                self.session, self.params[self.current].epoch
            );
        }
    }

    /// A ChangeCipherSpec arrived: read the next epoch from now on.
    pub fn advance_read_epoch(&mut self) {
        self.switch();
        self.read_epoch = self.params[self.current].epoch;
    }

    /// Authenticate and decrypt a record of the current read epoch.
    pub fn decrypt(&mut self, record: &DTLSRecord) -> Result<Buf, Error> {
        let params = self.params_for_epoch(record.sequence.epoch)?;
        decrypt_verify(params, record)
    }

    /// Start a new flight. The previous one can no longer be resent.
    pub fn flight_begin(&mut self) {
        self.last_flight.clear();
        self.handshake.flight_sent = true;
    }

    pub fn has_flight(&self) -> bool {
        !self.last_flight.is_empty()
    }

    /// Queue a handshake message as part of the current flight.
    pub fn send_handshake(&mut self, msg_type: MessageType, body: &[u8]) -> Result<(), Error> {
        let mut message = Vec::with_capacity(HANDSHAKE_HEADER_LEN + body.len());
        Handshake::serialize(msg_type, self.handshake.next_send_seq, body, &mut message);

        self.handshake.transcript.update(&message);
        self.handshake.next_send_seq = self.handshake.next_send_seq.wrapping_add(1);

        trace!("{} sending {:?} ({} bytes)", self.session, msg_type, body.len());
        self.create_record(ContentType::Handshake, self.write_epoch, &message, true)
    }

    /// Queue a ChangeCipherSpec and write the next epoch from now on.
    pub fn send_change_cipher_spec(&mut self) -> Result<(), Error> {
        self.create_record(ContentType::ChangeCipherSpec, self.write_epoch, &[1], true)?;
        self.switch();
        self.write_epoch = self.params[self.current].epoch;
        Ok(())
    }

    pub fn send_alert(&mut self, level: AlertLevel, description: AlertDescription) -> Result<(), Error> {
        let mut body = Vec::with_capacity(2);
        Alert::new(level, description).serialize(&mut body);
        self.create_record(ContentType::Alert, self.write_epoch, &body, false)
    }

    pub fn send_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        self.create_record(ContentType::ApplicationData, self.write_epoch, data, false)
    }

    fn create_record(
        &mut self,
        content_type: ContentType,
        epoch: u16,
        fragment: &[u8],
        save: bool,
    ) -> Result<(), Error> {
        self.encode_record(content_type, epoch, fragment)?;

        if save {
            self.last_flight.push(FlightRecord {
                content_type,
                epoch,
                fragment: Buf::from_slice(fragment),
            });
        }

        Ok(())
    }

    /// Protect one record and pack it into the outgoing datagrams.
    fn encode_record(&mut self, content_type: ContentType, epoch: u16, fragment: &[u8]) -> Result<(), Error> {
        let mtu = self.mtu;

        let overhead = RECORD_HEADER_LEN + AEAD_OVERHEAD;
        if fragment.len() + overhead > mtu {
            return Err(Error::TooBigRecord(fragment.len()));
        }

        let params = self.params_for_epoch(epoch)?;
        let mut record = Vec::with_capacity(fragment.len() + overhead);
        prepare_record(params, content_type, fragment, &mut record)?;

        match self.pending_tx.last_mut() {
            Some(datagram) if datagram.len() + record.len() <= mtu => {
                datagram.extend_from_slice(&record);
            }
            _ => self.pending_tx.push(record),
        }

        Ok(())
    }

    /// Re-encode the last flight, each record under the epoch it was first sent in.
    pub fn resend_flight(&mut self) -> Result<(), Error> {
        let flight = std::mem::take(&mut self.last_flight);
        debug!("{} resending {} records", self.session, flight.len());

        let result = flight
            .iter()
            .try_for_each(|r| self.encode_record(r.content_type, r.epoch, &r.fragment));

        self.last_flight = flight;
        result
    }

    /// Datagrams queued since the last call.
    pub fn take_datagrams(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending_tx)
    }
}
