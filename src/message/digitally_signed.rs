use nom::IResult;

use super::util::{put_u16_prefixed, u16_prefixed};
use super::{parse_sig_and_hash, HashAlgorithm, SignatureAlgorithm};

/// A `(hash, signature)` tagged signature, as used by ServerKeyExchange and
/// CertificateVerify.
#[derive(Debug, PartialEq, Eq)]
pub struct DigitallySigned<'a> {
    pub hash: HashAlgorithm,
    pub algorithm: SignatureAlgorithm,
    pub signature: &'a [u8],
}

impl<'a> DigitallySigned<'a> {
    pub fn ecdsa_sha256(signature: &'a [u8]) -> Self {
        DigitallySigned {
            hash: HashAlgorithm::SHA256,
            algorithm: SignatureAlgorithm::ECDSA,
            signature,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], DigitallySigned<'a>> {
        let (input, (hash, algorithm)) = parse_sig_and_hash(input)?;
        let (input, signature) = u16_prefixed(input)?;

        Ok((
            input,
            DigitallySigned {
                hash,
                algorithm,
                signature,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.hash.as_u8());
        output.push(self.algorithm.as_u8());
        put_u16_prefixed(output, self.signature);
    }

    pub fn is_ecdsa_sha256(&self) -> bool {
        self.hash == HashAlgorithm::SHA256 && self.algorithm == SignatureAlgorithm::ECDSA
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tagged_signature() {
        let data = [4, 3, 0x00, 0x03, 0xAA, 0xBB, 0xCC];
        let (rest, ds) = DigitallySigned::parse(&data).unwrap();
        assert!(rest.is_empty());
        assert!(ds.is_ecdsa_sha256());
        assert_eq!(ds.signature, &[0xAA, 0xBB, 0xCC]);

        let mut out = Vec::new();
        ds.serialize(&mut out);
        assert_eq!(out, data);
    }

    #[test]
    fn unknown_algorithms_are_reported() {
        let data = [2, 1, 0x00, 0x00];
        let (_, ds) = DigitallySigned::parse(&data).unwrap();
        assert!(!ds.is_ecdsa_sha256());
    }
}
