use thiserror::Error;

use crate::message::AlertDescription;

/// Errors surfaced by the DTLS engine.
///
/// Most variants never reach the caller of [`Context::handle_message`][crate::Context::handle_message]:
/// malformed and unauthenticated input is dropped silently, and protocol failures are
/// reported through [`Event::HandshakeFailed`][crate::Event::HandshakeFailed]. Only
/// resource exhaustion, transport failures and API misuse are returned.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Parse incomplete")]
    ParseIncomplete,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Crypto error: {0}")]
    CryptoError(String),

    #[error("Replayed record: {0}")]
    Replay(u64),

    #[error("Security error: {0}")]
    SecurityError(String),

    /// A fatal protocol condition. The peer is sent this alert and torn down.
    #[error("Fatal alert: {0:?}")]
    Alert(AlertDescription),

    #[error("Peer table is full")]
    PeerTableFull,

    #[error("Peer already exists")]
    PeerExists,

    #[error("Unknown peer")]
    UnknownPeer,

    #[error("Peer is not connected")]
    NotConnected,

    #[error("Epoch is not allowed to wrap")]
    WrappedEpoch,

    #[error("Too big dtls sequence field (max 48 bits) {0}")]
    TooBigDtlsSeq(u64),

    #[error("Record too big for mtu: {0}")]
    TooBigRecord(usize),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means "drop the offending record and carry on".
    ///
    /// Such errors never change peer state and never produce a reply.
    pub(crate) fn is_silent_drop(&self) -> bool {
        matches!(
            self,
            Error::ParseIncomplete
                | Error::ParseError(_)
                | Error::UnexpectedMessage(_)
                | Error::CryptoError(_)
                | Error::Replay(_)
        )
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        match value {
            nom::Err::Incomplete(_) => Error::ParseIncomplete,
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                Error::ParseError(format!("{:?} ({} bytes left)", e.code, e.input.len()))
            }
        }
    }
}
