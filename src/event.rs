//! Application callbacks and the events delivered through them.

use std::fmt;
use std::io;

use zeroize::Zeroize;

use crate::message::{AlertDescription, AlertLevel};
use crate::peer::Session;

/// Something that happened to a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The handshake (or a renegotiation) completed. Application data can flow.
    Connected,
    /// The remote sent an alert.
    Alert {
        level: AlertLevel,
        description: AlertDescription,
    },
    /// We aborted the handshake and sent this fatal alert. The peer is gone.
    HandshakeFailed(AlertDescription),
    /// A flight was retransmitted the maximum number of times without answer.
    /// The peer is gone.
    Timeout,
    /// The association was closed with close_notify, or replaced because the
    /// client restarted from the same address.
    Closed,
}

/// Key material handed out by [`Handler::get_key`].
pub enum Credentials {
    /// A pre-shared key and the identity it is known under.
    Psk { identity: Vec<u8>, key: Vec<u8> },
    /// A P-256 key pair.
    ///
    /// `private_key` is PKCS#8 DER, `certificate` is the DER SubjectPublicKeyInfo
    /// sent in the Certificate message.
    Ecdsa {
        private_key: Vec<u8>,
        certificate: Vec<u8>,
    },
}

impl Credentials {
    pub(crate) fn is_psk(&self) -> bool {
        matches!(self, Credentials::Psk { .. })
    }
}

impl Drop for Credentials {
    fn drop(&mut self) {
        match self {
            Credentials::Psk { key, .. } => key.zeroize(),
            Credentials::Ecdsa { private_key, .. } => private_key.zeroize(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Psk { identity, .. } => f
                .debug_struct("Psk")
                .field("identity", &String::from_utf8_lossy(identity))
                .finish_non_exhaustive(),
            Credentials::Ecdsa { certificate, .. } => f
                .debug_struct("Ecdsa")
                .field("certificate", &certificate.len())
                .finish_non_exhaustive(),
        }
    }
}

/// The application side of a [`Context`][crate::Context].
///
/// All callbacks run synchronously inside the `Context` call that triggered them.
pub trait Handler {
    /// Send one datagram to `session`.
    fn write(&mut self, session: &Session, datagram: &[u8]) -> io::Result<usize>;

    /// Decrypted application data from `session`.
    fn read(&mut self, session: &Session, data: &[u8]);

    /// Look up credentials for `session`.
    ///
    /// A server asks with the PSK identity from the ClientKeyExchange, and without
    /// an identity for its ECDSA key. A client asks with the server's identity hint
    /// (if any) when it is about to send its ClientKeyExchange, and without one when
    /// building its ClientHello or answering a CertificateRequest.
    fn get_key(&mut self, session: &Session, psk_identity: Option<&[u8]>) -> Option<Credentials>;

    /// Something happened to `session`.
    fn event(&mut self, session: &Session, event: Event);

    /// Accept or reject the peer's raw public key (DER SubjectPublicKeyInfo).
    fn verify_peer_key(&mut self, session: &Session, certificate: &[u8]) -> bool {
        let _ = (session, certificate);
        true
    }
}
