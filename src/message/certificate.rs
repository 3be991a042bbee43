use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};

use super::util::{put_u24, u24_prefixed};

/// Certificate message carrying a single raw public key.
///
/// The entry is a DER SubjectPublicKeyInfo. The chain has at most one entry;
/// an empty chain is how a client declines a CertificateRequest.
#[derive(Debug, PartialEq, Eq)]
pub struct Certificate<'a> {
    pub certificate: Option<&'a [u8]>,
}

impl<'a> Certificate<'a> {
    pub fn new(certificate: &'a [u8]) -> Self {
        Certificate {
            certificate: Some(certificate),
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Certificate<'a>> {
        let (input, mut list) = u24_prefixed(input)?;

        if list.is_empty() {
            return Ok((input, Certificate { certificate: None }));
        }

        let (rest, cert) = u24_prefixed(list)?;
        list = rest;
        if cert.is_empty() || !list.is_empty() {
            return Err(Err::Failure(Error::new(list, ErrorKind::LengthValue)));
        }

        Ok((
            input,
            Certificate {
                certificate: Some(cert),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self.certificate {
            Some(cert) => {
                put_u24(output, cert.len() as u32 + 3);
                put_u24(output, cert.len() as u32);
                output.extend_from_slice(cert);
            }
            None => put_u24(output, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_entry_layout() {
        let cert = [0x30, 0x03, 0x01, 0x02, 0x03];
        let mut out = Vec::new();
        Certificate::new(&cert).serialize(&mut out);
        assert_eq!(&out[..6], &[0, 0, 8, 0, 0, 5]);

        let (rest, parsed) = Certificate::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed.certificate, Some(&cert[..]));
    }

    #[test]
    fn chains_are_refused() {
        let mut out = Vec::new();
        put_u24(&mut out, 8);
        put_u24(&mut out, 1);
        out.push(0xAA);
        put_u24(&mut out, 1);
        out.push(0xBB);
        assert!(Certificate::parse(&out).is_err());
    }

    #[test]
    fn empty_chain() {
        let (_, parsed) = Certificate::parse(&[0, 0, 0]).unwrap();
        assert_eq!(parsed.certificate, None);
    }
}
