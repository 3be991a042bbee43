use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};

use super::util::{put_u16_prefixed, u16_prefixed, u8_prefixed};
use super::CipherSuite;

#[derive(Debug, PartialEq, Eq)]
pub enum ClientKeyExchange<'a> {
    /// `opaque psk_identity<0..2^16-1>`
    Psk { identity: &'a [u8] },
    /// The client's ephemeral ECDH point, `opaque point <1..2^8-1>`.
    Ecdh { public_key: &'a [u8] },
}

impl<'a> ClientKeyExchange<'a> {
    pub fn parse(input: &'a [u8], suite: CipherSuite) -> IResult<&'a [u8], ClientKeyExchange<'a>> {
        match suite {
            CipherSuite::PSK_AES128_CCM_8 => {
                let (input, identity) = u16_prefixed(input)?;
                Ok((input, ClientKeyExchange::Psk { identity }))
            }
            CipherSuite::ECDHE_ECDSA_AES128_CCM_8 => {
                let (input, public_key) = u8_prefixed(input)?;
                if public_key.is_empty() {
                    return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
                }
                Ok((input, ClientKeyExchange::Ecdh { public_key }))
            }
            CipherSuite::Unknown(_) => Err(Err::Failure(Error::new(input, ErrorKind::Tag))),
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            ClientKeyExchange::Psk { identity } => put_u16_prefixed(output, identity),
            ClientKeyExchange::Ecdh { public_key } => {
                output.push(public_key.len() as u8);
                output.extend_from_slice(public_key);
            }
        }
    }
}
