//! Wire messages of the DTLS 1.2 subset spoken by this engine.
//!
//! Every message has a nom `parse` and a `serialize` writing network byte order.
//! Parsers borrow from the input where they can.

mod alert;
mod certificate;
mod certificate_request;
mod client_hello;
mod client_key_exchange;
mod digitally_signed;
mod extension;
mod finished;
mod handshake;
mod hello_verify;
mod id;
mod new_session_ticket;
mod random;
mod record;
mod server_hello;
mod server_key_exchange;
mod util;

pub use alert::{Alert, AlertDescription, AlertLevel};
pub use certificate::Certificate;
pub use certificate_request::CertificateRequest;
pub use client_hello::{cookie_fields, ClientHello};
pub use client_key_exchange::ClientKeyExchange;
pub use digitally_signed::DigitallySigned;
pub use extension::{Extension, ExtensionType};
pub(crate) use extension::{EC_POINT_FORMATS_UNCOMPRESSED, SUPPORTED_GROUPS_P256};
pub use finished::{Finished, VERIFY_DATA_LEN};
pub use handshake::{Handshake, MessageType, HANDSHAKE_HEADER_LEN};
pub use hello_verify::HelloVerifyRequest;
pub use id::{Cookie, SessionId};
pub use new_session_ticket::NewSessionTicket;
pub use random::Random;
pub use record::{ContentType, DTLSRecord, Sequence, MAX_SEQUENCE_NUMBER, RECORD_HEADER_LEN};
pub use server_hello::ServerHello;
pub use server_key_exchange::{EcdhParams, ServerKeyExchange};

use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

/// Named curve secp256r1 in the supported_groups registry.
pub const NAMED_CURVE_SECP256R1: u16 = 23;

/// Uncompressed point format in the ec_point_formats registry.
pub const POINT_FORMAT_UNCOMPRESSED: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    DTLS1_0,
    DTLS1_2,
    Unknown(u16),
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ProtocolVersion {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0xFEFF => ProtocolVersion::DTLS1_0,
            0xFEFD => ProtocolVersion::DTLS1_2,
            _ => ProtocolVersion::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ProtocolVersion::DTLS1_0 => 0xFEFF,
            ProtocolVersion::DTLS1_2 => 0xFEFD,
            ProtocolVersion::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, version) = be_u16(input)?;
        Ok((input, ProtocolVersion::from_u16(version)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }
}

/// The cipher suites this engine negotiates.
///
/// Both use AES-128 in CCM mode with an 8-byte tag and the SHA-256 PRF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum CipherSuite {
    /// TLS_PSK_WITH_AES_128_CCM_8 (0xC0A8)
    PSK_AES128_CCM_8,
    /// TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8 (0xC0AE)
    ECDHE_ECDSA_AES128_CCM_8,
    Unknown(u16),
}

impl Default for CipherSuite {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl CipherSuite {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0xC0A8 => CipherSuite::PSK_AES128_CCM_8,
            0xC0AE => CipherSuite::ECDHE_ECDSA_AES128_CCM_8,
            _ => CipherSuite::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CipherSuite::PSK_AES128_CCM_8 => 0xC0A8,
            CipherSuite::ECDHE_ECDSA_AES128_CCM_8 => 0xC0AE,
            CipherSuite::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CipherSuite> {
        let (input, value) = be_u16(input)?;
        Ok((input, CipherSuite::from_u16(value)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, CipherSuite::Unknown(_))
    }

    /// Whether the suite authenticates with certificates and an ephemeral ECDH exchange.
    pub fn has_ecc(&self) -> bool {
        matches!(self, CipherSuite::ECDHE_ECDSA_AES128_CCM_8)
    }

    pub fn is_psk(&self) -> bool {
        matches!(self, CipherSuite::PSK_AES128_CCM_8)
    }

    pub(crate) fn all() -> &'static [CipherSuite] {
        &[
            CipherSuite::ECDHE_ECDSA_AES128_CCM_8,
            CipherSuite::PSK_AES128_CCM_8,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Null,
    Deflate,
    Unknown(u8),
}

impl Default for CompressionMethod {
    fn default() -> Self {
        Self::Null
    }
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => CompressionMethod::Null,
            0x01 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CompressionMethod::Null => 0x00,
            CompressionMethod::Deflate => 0x01,
            CompressionMethod::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CompressionMethod> {
        let (input, value) = be_u8(input)?;
        Ok((input, CompressionMethod::from_u8(value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum ClientCertificateType {
    ECDSA_SIGN,
    Unknown(u8),
}

impl ClientCertificateType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            64 => ClientCertificateType::ECDSA_SIGN,
            _ => ClientCertificateType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ClientCertificateType::ECDSA_SIGN => 64,
            ClientCertificateType::Unknown(value) => *value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    SHA256,
    Unknown(u8),
}

impl HashAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            4 => HashAlgorithm::SHA256,
            _ => HashAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HashAlgorithm::SHA256 => 4,
            HashAlgorithm::Unknown(value) => *value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    ECDSA,
    Unknown(u8),
}

impl SignatureAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            3 => SignatureAlgorithm::ECDSA,
            _ => SignatureAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            SignatureAlgorithm::ECDSA => 3,
            SignatureAlgorithm::Unknown(value) => *value,
        }
    }
}

/// Parse a `(hash, signature)` algorithm pair.
pub(crate) fn parse_sig_and_hash(
    input: &[u8],
) -> IResult<&[u8], (HashAlgorithm, SignatureAlgorithm)> {
    let (input, hash) = be_u8(input)?;
    let (input, sig) = be_u8(input)?;
    Ok((
        input,
        (HashAlgorithm::from_u8(hash), SignatureAlgorithm::from_u8(sig)),
    ))
}
