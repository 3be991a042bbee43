use super::extension::find;
use super::{CipherSuite, CompressionMethod, Extension, ExtensionType, ProtocolVersion};
use super::{Random, SessionId};
use nom::IResult;

#[derive(Debug, PartialEq, Eq)]
pub struct ServerHello<'a> {
    pub server_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suite: CipherSuite,
    pub compression_method: CompressionMethod,
    pub extensions: Vec<Extension<'a>>,
}

impl<'a> ServerHello<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ServerHello<'a>> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cipher_suite) = CipherSuite::parse(input)?;
        let (input, compression_method) = CompressionMethod::parse(input)?;
        let (input, extensions) = Extension::parse_block(input)?;

        Ok((
            input,
            ServerHello {
                server_version,
                random,
                session_id,
                cipher_suite,
                compression_method,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.server_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        self.cipher_suite.serialize(output);
        output.push(self.compression_method.as_u8());
        Extension::serialize_block(&self.extensions, output);
    }

    /// Whether the server promised a NewSessionTicket.
    pub fn announces_ticket(&self) -> bool {
        find(&self.extensions, ExtensionType::SessionTicket).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_announcement_survives_the_wire() {
        let sh = ServerHello {
            server_version: ProtocolVersion::DTLS1_2,
            random: Random::default(),
            session_id: SessionId::try_new(&[1; 32]).unwrap(),
            cipher_suite: CipherSuite::ECDHE_ECDSA_AES128_CCM_8,
            compression_method: CompressionMethod::Null,
            extensions: vec![Extension::new(ExtensionType::SessionTicket, &[])],
        };
        let mut out = Vec::new();
        sh.serialize(&mut out);

        let (rest, parsed) = ServerHello::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert!(parsed.announces_ticket());
        assert_eq!(parsed.session_id.len(), 32);
        assert_eq!(parsed.cipher_suite, CipherSuite::ECDHE_ECDSA_AES128_CCM_8);
    }
}
