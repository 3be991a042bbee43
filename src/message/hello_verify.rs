use super::{Cookie, ProtocolVersion};
use nom::IResult;

#[derive(Debug, PartialEq, Eq)]
pub struct HelloVerifyRequest {
    pub server_version: ProtocolVersion,
    pub cookie: Cookie,
}

impl HelloVerifyRequest {
    pub fn new(cookie: Cookie) -> Self {
        HelloVerifyRequest {
            // RFC 6347 4.2.1: servers should answer with DTLS 1.0 here regardless.
            server_version: ProtocolVersion::DTLS1_0,
            cookie,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HelloVerifyRequest> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, cookie) = Cookie::parse(input)?;

        Ok((
            input,
            HelloVerifyRequest {
                server_version,
                cookie,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.server_version.serialize(output);
        self.cookie.serialize(output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0xFE, 0xFF, // ProtocolVersion::DTLS1_0
        0x04, // Cookie length
        0xDE, 0xAD, 0xBE, 0xEF, // Cookie
    ];

    #[test]
    fn parse_wire_bytes() {
        let (rest, hvr) = HelloVerifyRequest::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(hvr.server_version, ProtocolVersion::DTLS1_0);
        assert_eq!(&*hvr.cookie, &[0xDE, 0xAD, 0xBE, 0xEF]);

        let mut out = Vec::new();
        HelloVerifyRequest::new(hvr.cookie).serialize(&mut out);
        assert_eq!(out, MESSAGE);
    }
}
