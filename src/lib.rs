//! nanodtls is a sans-IO DTLS 1.2 engine for constrained peers.
//!
//! One [`Context`] serves every association of a local endpoint. Two cipher
//! suites are supported, both with AES-128-CCM-8 record protection:
//!
//! - `TLS_PSK_WITH_AES_128_CCM_8` (0xC0A8)
//! - `TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8` (0xC0AE), authenticated with raw
//!   P-256 public keys in place of X.509 chains
//!
//! On top of the plain handshake the context does stateless cookie exchange,
//! flight retransmission with exponential backoff, session resumption through
//! tickets and renegotiation.
//!
//! # Usage
//!
//! The application owns the socket and the clock. It feeds received datagrams
//! to [`Context::handle_message`] and calls [`Context::handle_timeout`] whenever
//! [`Context::poll_timeout`] says so. Outgoing datagrams, decrypted data, key
//! lookups and events come back through the [`Handler`] trait.
//!
//! ```
//! use std::io;
//! use std::sync::Arc;
//! use std::time::Instant;
//!
//! use nanodtls::{Config, Context, Credentials, Event, Handler, Session};
//!
//! struct App;
//!
//! impl Handler for App {
//!     fn write(&mut self, _session: &Session, datagram: &[u8]) -> io::Result<usize> {
//!         // socket.send_to(datagram, session.addr)
//!         Ok(datagram.len())
//!     }
//!
//!     fn read(&mut self, _session: &Session, data: &[u8]) {
//!         println!("received {} bytes", data.len());
//!     }
//!
//!     fn get_key(&mut self, _session: &Session, _identity: Option<&[u8]>) -> Option<Credentials> {
//!         Some(Credentials::Psk {
//!             identity: b"Client_identity".to_vec(),
//!             key: b"secretPSK".to_vec(),
//!         })
//!     }
//!
//!     fn event(&mut self, session: &Session, event: Event) {
//!         println!("{}: {:?}", session, event);
//!     }
//! }
//!
//! let config = Arc::new(Config::default());
//! let mut ctx = Context::new(config, App, Instant::now()).unwrap();
//!
//! let server = Session::new("192.0.2.1:5684".parse().unwrap(), 0);
//! ctx.connect(server, Instant::now()).unwrap();
//! assert!(ctx.poll_timeout().is_some());
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]
// #![deny(missing_docs)]

#[macro_use]
extern crate log;

mod buffer;
pub mod certificate;
mod client;
mod config;
mod context;
mod cookie;
pub mod crypto;
mod error;
mod event;
mod handshake;
pub(crate) mod message;
mod peer;
mod record;
mod retransmit;
mod rng;
mod server;
mod ticket;
mod time_tricks;
mod timer;
mod window;

pub use config::{Config, ConfigBuilder};
pub use context::Context;
pub use error::Error;
pub use event::{Credentials, Event, Handler};
pub use message::{AlertDescription, AlertLevel, CipherSuite};
pub use peer::{Session, State};
pub use ticket::PeerIdentity;
