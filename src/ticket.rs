//! Session tickets (RFC 5077).
//!
//! ```text
//! ticket = key_name(8) ‖ nonce(12) ‖ state_len(u16) ‖ CCM-8(state) ‖ tag(8)
//! state  = version(u16) ‖ suite(u16) ‖ compression(u8) ‖ master_secret(48)
//!          ‖ identity(kind u8 ‖ len u16 ‖ bytes) ‖ timestamp(u32)
//! ```
//!
//! The server keeps no per-session memory: everything needed to resume travels
//! inside the ticket, sealed with a key only the server knows. The client keeps
//! its tickets in a [`TicketCache`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use nom::bytes::complete::take;
use nom::error::{Error as NomError, ErrorKind};
use nom::number::complete::{be_u16, be_u32, be_u8};
use nom::{Err, IResult};
use zeroize::Zeroizing;

use crate::buffer::Buf;
use crate::crypto::aead::{CCM_8_TAG_LEN, NONCE_LEN};
use crate::crypto::prf::{MasterSecret, MASTER_SECRET_LEN};
use crate::crypto::{Cipher, CryptoProvider, Nonce};
use crate::message::{CipherSuite, CompressionMethod, ProtocolVersion};
use crate::peer::Session;
use crate::rng::SeededRng;
use crate::Error;

/// Length of the key name that prefixes every ticket.
pub const KEY_NAME_LEN: usize = 8;

const TICKET_HEADER_LEN: usize = KEY_NAME_LEN + NONCE_LEN + 2;

/// Who the remote turned out to be.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PeerIdentity {
    /// Not authenticated (ECDHE without a client certificate).
    #[default]
    None,
    /// The PSK identity used.
    Psk(Vec<u8>),
    /// SHA-256 fingerprint of the peer's raw public key.
    Certificate([u8; 32]),
}

impl PeerIdentity {
    fn serialize(&self, output: &mut Buf) {
        let (kind, bytes): (u8, &[u8]) = match self {
            PeerIdentity::None => (0, &[]),
            PeerIdentity::Psk(identity) => (1, identity),
            PeerIdentity::Certificate(fingerprint) => (2, fingerprint),
        };
        output.push(kind);
        output.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        output.extend_from_slice(bytes);
    }

    fn parse(input: &[u8]) -> IResult<&[u8], PeerIdentity> {
        let (input, kind) = be_u8(input)?;
        let (input, len) = be_u16(input)?;
        let (input, bytes) = take(len as usize)(input)?;

        let identity = match kind {
            0 if bytes.is_empty() => PeerIdentity::None,
            1 => PeerIdentity::Psk(bytes.to_vec()),
            2 => {
                let fingerprint = bytes
                    .try_into()
                    .map_err(|_| Err::Failure(NomError::new(input, ErrorKind::LengthValue)))?;
                PeerIdentity::Certificate(fingerprint)
            }
            _ => return Err(Err::Failure(NomError::new(input, ErrorKind::Tag))),
        };

        Ok((input, identity))
    }
}

/// What a ticket remembers about a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionState {
    pub version: ProtocolVersion,
    pub cipher_suite: CipherSuite,
    pub compression: CompressionMethod,
    pub master_secret: MasterSecret,
    pub identity: PeerIdentity,
    /// Unix seconds when the ticket was issued.
    pub timestamp: u32,
}

impl SessionState {
    fn serialize(&self, output: &mut Buf) {
        output.extend_from_slice(&self.version.as_u16().to_be_bytes());
        output.extend_from_slice(&self.cipher_suite.as_u16().to_be_bytes());
        output.push(self.compression.as_u8());
        output.extend_from_slice(self.master_secret.as_bytes());
        self.identity.serialize(output);
        output.extend_from_slice(&self.timestamp.to_be_bytes());
    }

    fn parse(input: &[u8]) -> IResult<&[u8], SessionState> {
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, cipher_suite) = CipherSuite::parse(input)?;
        let (input, compression) = CompressionMethod::parse(input)?;
        let (input, master) = take(MASTER_SECRET_LEN)(input)?;
        let master_secret = MasterSecret::from_bytes(master)
            .map_err(|_| Err::Failure(NomError::new(input, ErrorKind::LengthValue)))?;
        let (input, identity) = PeerIdentity::parse(input)?;
        let (input, timestamp) = be_u32(input)?;

        Ok((
            input,
            SessionState {
                version,
                cipher_suite,
                compression,
                master_secret,
                identity,
                timestamp,
            },
        ))
    }

    fn is_expired(&self, now_secs: u32, lifetime: Duration) -> bool {
        // A timestamp from the future is as suspect as an old one.
        let Some(age) = now_secs.checked_sub(self.timestamp) else {
            return true;
        };
        u64::from(age) >= lifetime.as_secs()
    }
}

/// The server's ticket protection key.
pub(crate) struct TicketKey {
    name: [u8; KEY_NAME_LEN],
    cipher: Box<dyn Cipher>,
}

impl TicketKey {
    pub fn new(provider: &CryptoProvider, rng: &mut SeededRng) -> Result<Self, Error> {
        let factory = provider
            .cipher_suites
            .first()
            .ok_or_else(|| Error::ConfigError("Crypto provider has no cipher".into()))?;

        let mut name = [0u8; KEY_NAME_LEN];
        rng.fill(&mut name);

        let (key_len, _) = factory.key_lengths();
        let mut key = Zeroizing::new(vec![0u8; key_len]);
        rng.fill(&mut key);

        let cipher = factory.create_cipher(&key).map_err(Error::CryptoError)?;

        Ok(TicketKey { name, cipher })
    }

    /// Seal `state` into an opaque ticket.
    pub fn seal(&mut self, state: &SessionState, rng: &mut SeededRng) -> Result<Vec<u8>, Error> {
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill(&mut nonce);

        let mut aad = [0u8; KEY_NAME_LEN + NONCE_LEN];
        aad[..KEY_NAME_LEN].copy_from_slice(&self.name);
        aad[KEY_NAME_LEN..].copy_from_slice(&nonce);

        let mut body = Buf::new();
        state.serialize(&mut body);
        let state_len = body.len() as u16;

        self.cipher
            .encrypt(&mut body, &aad, Nonce(nonce))
            .map_err(Error::CryptoError)?;

        let mut ticket = Vec::with_capacity(TICKET_HEADER_LEN + body.len());
        ticket.extend_from_slice(&aad);
        ticket.extend_from_slice(&state_len.to_be_bytes());
        ticket.extend_from_slice(&body);

        Ok(ticket)
    }

    /// Open a ticket sealed by this key.
    ///
    /// `None` for tickets from another key, tampered tickets, other protocol versions
    /// and tickets older than `lifetime`.
    pub fn open(&mut self, ticket: &[u8], now_secs: u32, lifetime: Duration) -> Option<SessionState> {
        if ticket.len() < TICKET_HEADER_LEN + CCM_8_TAG_LEN {
            return None;
        }

        let (aad, rest) = ticket.split_at(KEY_NAME_LEN + NONCE_LEN);
        if aad[..KEY_NAME_LEN] != self.name {
            trace!("Ticket from unknown key");
            return None;
        }

        let state_len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
        let sealed = &rest[2..];
        if sealed.len() != state_len + CCM_8_TAG_LEN {
            return None;
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&aad[KEY_NAME_LEN..]);

        let mut body = Buf::from_slice(sealed);
        if let Err(e) = self.cipher.decrypt(&mut body, aad, Nonce(nonce)) {
            debug!("Ticket failed authentication: {}", e);
            return None;
        }

        let (rest, state) = SessionState::parse(&body).ok()?;
        if !rest.is_empty() {
            return None;
        }

        if state.version != ProtocolVersion::DTLS1_2
            || !state.cipher_suite.is_known()
            || state.compression != CompressionMethod::Null
        {
            debug!("Ticket with unusable parameters: {:?}", state.cipher_suite);
            return None;
        }

        if state.is_expired(now_secs, lifetime) {
            debug!("Ticket expired");
            return None;
        }

        Some(state)
    }
}

/// A ticket the client holds for one server.
#[derive(Debug)]
pub(crate) struct ClientTicket {
    pub ticket: Vec<u8>,
    pub master_secret: MasterSecret,
    pub cipher_suite: CipherSuite,
    pub identity: PeerIdentity,
    pub received_at: Instant,
    pub lifetime: Duration,
}

/// Client side tickets, at most one per session.
#[derive(Debug)]
pub(crate) struct TicketCache {
    entries: HashMap<Session, ClientTicket>,
    capacity: usize,
}

impl TicketCache {
    pub fn new(capacity: usize) -> Self {
        TicketCache {
            entries: HashMap::new(),
            capacity,
        }
    }

    /// Store a ticket, evicting the oldest entry when full.
    pub fn insert(&mut self, session: Session, ticket: ClientTicket) {
        if !self.entries.contains_key(&session) && self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, t)| t.received_at)
                .map(|(s, _)| *s);
            if let Some(oldest) = oldest {
                warn!("Ticket cache full, evicting {:?}", oldest);
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(session, ticket);
    }

    /// A ticket that has not yet outlived its lifetime.
    pub fn get(&self, session: &Session, now: Instant) -> Option<&ClientTicket> {
        self.entries
            .get(session)
            .filter(|t| now.saturating_duration_since(t.received_at) < t.lifetime)
    }

    pub fn remove(&mut self, session: &Session) -> Option<ClientTicket> {
        self.entries.remove(session)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto;

    const DAY: Duration = Duration::from_secs(86400);

    fn state(timestamp: u32) -> SessionState {
        SessionState {
            version: ProtocolVersion::DTLS1_2,
            cipher_suite: CipherSuite::PSK_AES128_CCM_8,
            compression: CompressionMethod::Null,
            master_secret: MasterSecret::from_bytes(&[0x42; 48]).unwrap(),
            identity: PeerIdentity::Psk(b"client-1".to_vec()),
            timestamp,
        }
    }

    fn key(seed: u64) -> (TicketKey, SeededRng) {
        let mut rng = SeededRng::new(Some(seed));
        let key = TicketKey::new(&rust_crypto::default_provider(), &mut rng).unwrap();
        (key, rng)
    }

    #[test]
    fn seal_then_open() {
        let (mut key, mut rng) = key(1);
        let ticket = key.seal(&state(1000), &mut rng).unwrap();

        // key_name ‖ nonce ‖ len ‖ ciphertext ‖ tag
        let state_len = u16::from_be_bytes([ticket[20], ticket[21]]) as usize;
        assert_eq!(ticket.len(), TICKET_HEADER_LEN + state_len + CCM_8_TAG_LEN);
        // 2 + 2 + 1 + 48 + (1 + 2 + 8) + 4
        assert_eq!(state_len, 68);

        let opened = key.open(&ticket, 1010, DAY).unwrap();
        assert_eq!(opened, state(1000));
    }

    #[test]
    fn tickets_from_another_key_are_refused() {
        let (mut key_a, mut rng) = key(1);
        let (mut key_b, _) = key(2);
        let ticket = key_a.seal(&state(1000), &mut rng).unwrap();
        assert!(key_b.open(&ticket, 1000, DAY).is_none());
    }

    #[test]
    fn tampered_ticket_is_refused() {
        let (mut key, mut rng) = key(1);
        let mut ticket = key.seal(&state(1000), &mut rng).unwrap();
        let last = ticket.len() - 1;
        ticket[last] ^= 1;
        assert!(key.open(&ticket, 1000, DAY).is_none());
        assert!(key.open(&ticket[..10], 1000, DAY).is_none());
    }

    #[test]
    fn ticket_lifetime() {
        let (mut key, mut rng) = key(1);
        let ticket = key.seal(&state(1000), &mut rng).unwrap();

        assert!(key.open(&ticket, 1000 + 86399, DAY).is_some());
        assert!(key.open(&ticket, 1000 + 86400, DAY).is_none());
        // Issued in the future.
        assert!(key.open(&ticket, 999, DAY).is_none());
    }

    #[test]
    fn certificate_identity_survives() {
        let (mut key, mut rng) = key(3);
        let mut s = state(5);
        s.cipher_suite = CipherSuite::ECDHE_ECDSA_AES128_CCM_8;
        s.identity = PeerIdentity::Certificate([7; 32]);
        let ticket = key.seal(&s, &mut rng).unwrap();
        assert_eq!(key.open(&ticket, 5, DAY).unwrap().identity, s.identity);
    }

    #[test]
    fn cache_evicts_oldest() {
        let now = Instant::now();
        let mut cache = TicketCache::new(2);
        let entry = |at: Instant| ClientTicket {
            ticket: vec![1, 2, 3],
            master_secret: MasterSecret::from_bytes(&[1; 48]).unwrap(),
            cipher_suite: CipherSuite::PSK_AES128_CCM_8,
            identity: PeerIdentity::None,
            received_at: at,
            lifetime: DAY,
        };
        let s = |port: u16| Session::new(([10, 0, 0, 1], port).into(), 0);

        cache.insert(s(1), entry(now));
        cache.insert(s(2), entry(now + Duration::from_secs(1)));
        cache.insert(s(3), entry(now + Duration::from_secs(2)));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&s(1), now).is_none());
        assert!(cache.get(&s(3), now + Duration::from_secs(2)).is_some());

        // Expired entries are not handed out.
        assert!(cache.get(&s(2), now + DAY + Duration::from_secs(1)).is_none());
    }
}
