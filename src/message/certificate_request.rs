use nom::number::complete::be_u16;
use nom::IResult;

use super::util::{u16_prefixed, u8_prefixed};
use super::{ClientCertificateType, HashAlgorithm, SignatureAlgorithm};

/// CertificateRequest restricted to what this engine can answer: ECDSA with SHA-256.
#[derive(Debug, PartialEq, Eq)]
pub struct CertificateRequest {
    pub certificate_types: Vec<ClientCertificateType>,
    pub supported_signature_algorithms: Vec<(HashAlgorithm, SignatureAlgorithm)>,
}

impl Default for CertificateRequest {
    fn default() -> Self {
        CertificateRequest {
            certificate_types: vec![ClientCertificateType::ECDSA_SIGN],
            supported_signature_algorithms: vec![(
                HashAlgorithm::SHA256,
                SignatureAlgorithm::ECDSA,
            )],
        }
    }
}

impl CertificateRequest {
    pub fn parse(input: &[u8]) -> IResult<&[u8], CertificateRequest> {
        let (input, types) = u8_prefixed(input)?;
        let certificate_types = types
            .iter()
            .map(|t| ClientCertificateType::from_u8(*t))
            .collect();

        let (input, algs) = u16_prefixed(input)?;
        let supported_signature_algorithms = algs
            .chunks_exact(2)
            .map(|c| (HashAlgorithm::from_u8(c[0]), SignatureAlgorithm::from_u8(c[1])))
            .collect();

        // No certificate authorities for raw public keys; accept and ignore any.
        let (input, _cas_len) = be_u16(input)?;

        Ok((
            input,
            CertificateRequest {
                certificate_types,
                supported_signature_algorithms,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.certificate_types.len() as u8);
        for t in &self.certificate_types {
            output.push(t.as_u8());
        }

        output.extend_from_slice(
            &((self.supported_signature_algorithms.len() * 2) as u16).to_be_bytes(),
        );
        for (h, s) in &self.supported_signature_algorithms {
            output.push(h.as_u8());
            output.push(s.as_u8());
        }

        // certificate_authorities
        output.extend_from_slice(&0u16.to_be_bytes());
    }

    /// Whether we are able to answer with an ECDSA/SHA-256 CertificateVerify.
    pub fn accepts_ecdsa_sha256(&self) -> bool {
        self.certificate_types
            .contains(&ClientCertificateType::ECDSA_SIGN)
            && self
                .supported_signature_algorithms
                .contains(&(HashAlgorithm::SHA256, SignatureAlgorithm::ECDSA))
    }
}
