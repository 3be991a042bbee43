use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

use super::util::{put_u16_prefixed, u16_prefixed, u8_prefixed};
use super::{CipherSuite, DigitallySigned};

/// `ECCurveType.named_curve`
pub const CURVE_TYPE_NAMED: u8 = 3;

/// ServerECDHParams: `curve_type ‖ named_curve ‖ point`.
#[derive(Debug, PartialEq, Eq)]
pub struct EcdhParams<'a> {
    pub named_curve: u16,
    pub public_key: &'a [u8],
    /// The params exactly as on the wire; the signature covers these bytes.
    pub raw: &'a [u8],
}

impl<'a> EcdhParams<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], EcdhParams<'a>> {
        let start = input;
        let (input, curve_type) = be_u8(input)?;
        if curve_type != CURVE_TYPE_NAMED {
            return Err(Err::Failure(Error::new(input, ErrorKind::Tag)));
        }
        let (input, named_curve) = be_u16(input)?;
        let (input, public_key) = u8_prefixed(input)?;
        if public_key.is_empty() {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }
        let raw = &start[..start.len() - input.len()];

        Ok((
            input,
            EcdhParams {
                named_curve,
                public_key,
                raw,
            },
        ))
    }

    /// Write params for `named_curve` and `public_key`.
    pub fn serialize(named_curve: u16, public_key: &[u8], output: &mut Vec<u8>) {
        output.push(CURVE_TYPE_NAMED);
        output.extend_from_slice(&named_curve.to_be_bytes());
        output.push(public_key.len() as u8);
        output.extend_from_slice(public_key);
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ServerKeyExchange<'a> {
    /// ECDHE parameters signed by the server's certificate key.
    Ecdh {
        params: EcdhParams<'a>,
        signed: DigitallySigned<'a>,
    },
    /// PSK identity hint.
    PskHint(&'a [u8]),
}

impl<'a> ServerKeyExchange<'a> {
    pub fn parse(input: &'a [u8], suite: CipherSuite) -> IResult<&'a [u8], ServerKeyExchange<'a>> {
        match suite {
            CipherSuite::ECDHE_ECDSA_AES128_CCM_8 => {
                let (input, params) = EcdhParams::parse(input)?;
                let (input, signed) = DigitallySigned::parse(input)?;
                Ok((input, ServerKeyExchange::Ecdh { params, signed }))
            }
            CipherSuite::PSK_AES128_CCM_8 => {
                let (input, hint) = u16_prefixed(input)?;
                Ok((input, ServerKeyExchange::PskHint(hint)))
            }
            CipherSuite::Unknown(_) => Err(Err::Failure(Error::new(input, ErrorKind::Tag))),
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            ServerKeyExchange::Ecdh { params, signed } => {
                output.extend_from_slice(params.raw);
                signed.serialize(output);
            }
            ServerKeyExchange::PskHint(hint) => put_u16_prefixed(output, hint),
        }
    }
}
