//! Shared helpers for the integration tests.
//!
//! This file has no `#[test]` functions; Cargo compiles it as a no-op binary.
//! Import it from other test files via `mod dtls_common;`.

#![allow(unused)]

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nanodtls::certificate::RawPublicKey;
use nanodtls::{Config, ConfigBuilder, Context, Credentials, Event, Handler, Session, State};

pub const CLIENT_IDENTITY: &[u8] = b"Client_identity";
pub const PSK: &[u8] = b"secretPSK";

/// Handshake message types (RFC 5246 / 6347).
pub const CLIENT_HELLO: u8 = 1;
pub const SERVER_HELLO: u8 = 2;
pub const HELLO_VERIFY_REQUEST: u8 = 3;
pub const NEW_SESSION_TICKET: u8 = 4;
pub const CERTIFICATE: u8 = 11;
pub const SERVER_KEY_EXCHANGE: u8 = 12;
pub const CERTIFICATE_REQUEST: u8 = 13;
pub const SERVER_HELLO_DONE: u8 = 14;

pub const CONTENT_CHANGE_CIPHER_SPEC: u8 = 20;
pub const CONTENT_ALERT: u8 = 21;
pub const CONTENT_HANDSHAKE: u8 = 22;
pub const CONTENT_APPLICATION_DATA: u8 = 23;

/// How the server sees the client.
pub fn client_session() -> Session {
    Session::new("10.0.0.1:40000".parse().unwrap(), 1)
}

/// How the client sees the server.
pub fn server_session() -> Session {
    Session::new("10.0.0.2:5684".parse().unwrap(), 1)
}

/// Records everything the context hands to the application.
#[derive(Default)]
pub struct TestHandler {
    pub outbox: Vec<Vec<u8>>,
    pub received: Vec<Vec<u8>>,
    pub events: Vec<Event>,
    /// Our own PSK, handed out for any lookup.
    pub psk: Option<(Vec<u8>, Vec<u8>)>,
    /// Keys the server knows, by identity.
    pub psk_table: Vec<(Vec<u8>, Vec<u8>)>,
    /// Our own raw public key.
    pub key: Option<RawPublicKey>,
    /// Only accept this peer key. Everything is accepted when unset.
    pub trusted: Option<Vec<u8>>,
    /// Identities asked for in `get_key`.
    pub lookups: Vec<Option<Vec<u8>>>,
}

impl TestHandler {
    pub fn psk_client() -> Self {
        TestHandler {
            psk: Some((CLIENT_IDENTITY.to_vec(), PSK.to_vec())),
            ..Default::default()
        }
    }

    pub fn psk_server() -> Self {
        TestHandler {
            psk_table: vec![(CLIENT_IDENTITY.to_vec(), PSK.to_vec())],
            ..Default::default()
        }
    }

    pub fn with_key(key: RawPublicKey) -> Self {
        TestHandler {
            key: Some(key),
            ..Default::default()
        }
    }
}

impl Handler for TestHandler {
    fn write(&mut self, _session: &Session, datagram: &[u8]) -> io::Result<usize> {
        self.outbox.push(datagram.to_vec());
        Ok(datagram.len())
    }

    fn read(&mut self, _session: &Session, data: &[u8]) {
        self.received.push(data.to_vec());
    }

    fn get_key(&mut self, _session: &Session, identity: Option<&[u8]>) -> Option<Credentials> {
        self.lookups.push(identity.map(|i| i.to_vec()));

        if let Some(id) = identity {
            if let Some((identity, key)) = self.psk_table.iter().find(|(i, _)| i == id) {
                return Some(Credentials::Psk {
                    identity: identity.clone(),
                    key: key.clone(),
                });
            }
        }

        if let Some((identity, key)) = &self.psk {
            return Some(Credentials::Psk {
                identity: identity.clone(),
                key: key.clone(),
            });
        }

        self.key.as_ref().map(|k| Credentials::Ecdsa {
            private_key: k.private_key.clone(),
            certificate: k.public_key.clone(),
        })
    }

    fn event(&mut self, _session: &Session, event: Event) {
        self.events.push(event);
    }

    fn verify_peer_key(&mut self, _session: &Session, certificate: &[u8]) -> bool {
        match &self.trusted {
            Some(trusted) => trusted == certificate,
            None => true,
        }
    }
}

/// Deterministic config with a short retransmission timeout.
pub fn config(seed: u64) -> ConfigBuilder {
    Config::builder()
        .rng_seed(seed)
        .flight_start_rto(Duration::from_millis(500))
        .require_client_certificate(false)
}

/// A client and a server context joined by a lossless in-memory link.
pub struct Pair {
    pub client: Context<TestHandler>,
    pub server: Context<TestHandler>,
    pub now: Instant,
}

impl Pair {
    pub fn new(
        client: TestHandler,
        client_config: ConfigBuilder,
        server: TestHandler,
        server_config: ConfigBuilder,
    ) -> Self {
        let _ = env_logger::try_init();

        let now = Instant::now();
        let client_config = Arc::new(client_config.build().expect("client config"));
        let server_config = Arc::new(server_config.build().expect("server config"));

        Pair {
            client: Context::new(client_config, client, now).expect("client context"),
            server: Context::new(server_config, server, now).expect("server context"),
            now,
        }
    }

    pub fn psk() -> Self {
        Pair::new(
            TestHandler::psk_client(),
            config(1),
            TestHandler::psk_server(),
            config(2),
        )
    }

    pub fn connect(&mut self) {
        self.client
            .connect(server_session(), self.now)
            .expect("connect");
    }

    /// Move the client's queued datagrams to the server.
    pub fn to_server(&mut self) -> usize {
        let datagrams = take_outbox(&mut self.client);
        for d in &datagrams {
            self.server
                .handle_message(client_session(), d, self.now)
                .expect("server handle_message");
        }
        datagrams.len()
    }

    /// Move the server's queued datagrams to the client.
    pub fn to_client(&mut self) -> usize {
        let datagrams = take_outbox(&mut self.server);
        for d in &datagrams {
            self.client
                .handle_message(server_session(), d, self.now)
                .expect("client handle_message");
        }
        datagrams.len()
    }

    /// Exchange datagrams until both sides go quiet.
    pub fn pump(&mut self) {
        for _ in 0..32 {
            if self.to_server() + self.to_client() == 0 {
                return;
            }
        }
        panic!("Datagrams kept flowing");
    }

    /// Connect and run the handshake to completion.
    pub fn handshake(&mut self) {
        self.connect();
        self.pump();
        self.assert_connected();
    }

    pub fn assert_connected(&self) {
        assert_eq!(self.client.peer_state(server_session()), Some(State::Connected));
        assert_eq!(self.server.peer_state(client_session()), Some(State::Connected));
    }

    /// Move time to the client's next retransmission deadline and fire it.
    pub fn advance_client(&mut self) -> bool {
        let Some(at) = self.client.poll_timeout() else {
            return false;
        };
        self.now = self.now.max(at);
        self.client.handle_timeout(self.now).expect("client timeout");
        true
    }

    pub fn advance_server(&mut self) -> bool {
        let Some(at) = self.server.poll_timeout() else {
            return false;
        };
        self.now = self.now.max(at);
        self.server.handle_timeout(self.now).expect("server timeout");
        true
    }
}

pub fn take_outbox(ctx: &mut Context<TestHandler>) -> Vec<Vec<u8>> {
    std::mem::take(&mut ctx.handler_mut().outbox)
}

pub fn take_events(ctx: &mut Context<TestHandler>) -> Vec<Event> {
    std::mem::take(&mut ctx.handler_mut().events)
}

/// Parsed DTLS 1.2 record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecHdr {
    pub ctype: u8,
    pub epoch: u16,
    pub seq: u64,
    /// First byte of the fragment. The handshake type for plaintext handshake records.
    pub first: u8,
}

/// Parse DTLS 1.2 record headers from a datagram.
pub fn parse_records(datagram: &[u8]) -> Vec<RecHdr> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i + 13 <= datagram.len() {
        let ctype = datagram[i];
        let epoch = u16::from_be_bytes([datagram[i + 3], datagram[i + 4]]);
        let mut seq_bytes = [0u8; 8];
        seq_bytes[2..].copy_from_slice(&datagram[i + 5..i + 11]);
        let seq = u64::from_be_bytes(seq_bytes);
        let len = u16::from_be_bytes([datagram[i + 11], datagram[i + 12]]) as usize;
        let first = datagram.get(i + 13).copied().unwrap_or(0);
        out.push(RecHdr {
            ctype,
            epoch,
            seq,
            first,
        });
        i += 13 + len;
    }
    out
}

pub fn collect_headers(datagrams: &[Vec<u8>]) -> Vec<RecHdr> {
    datagrams.iter().flat_map(|d| parse_records(d)).collect()
}

/// Handshake types of the plaintext (epoch 0) handshake records.
pub fn plaintext_handshake_types(datagrams: &[Vec<u8>]) -> Vec<u8> {
    collect_headers(datagrams)
        .iter()
        .filter(|h| h.ctype == CONTENT_HANDSHAKE && h.epoch == 0)
        .map(|h| h.first)
        .collect()
}
