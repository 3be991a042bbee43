use super::extension::find;
use super::{CipherSuite, CompressionMethod, ProtocolVersion, NAMED_CURVE_SECP256R1};
use super::{Cookie, Extension, ExtensionType, Random, SessionId};
use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

#[derive(Debug, PartialEq, Eq)]
pub struct ClientHello<'a> {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cookie: Cookie,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<CompressionMethod>,
    pub extensions: Vec<Extension<'a>>,
}

impl<'a> ClientHello<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ClientHello<'a>> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cookie) = Cookie::parse(input)?;

        let (input, cipher_suites_len) = be_u16(input)?;
        if cipher_suites_len == 0 || cipher_suites_len % 2 != 0 {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }
        let (input, input_cipher) = take(cipher_suites_len)(input)?;
        let cipher_suites = input_cipher
            .chunks_exact(2)
            .map(|c| CipherSuite::from_u16(u16::from_be_bytes([c[0], c[1]])))
            .collect();

        let (input, compression_methods_len) = be_u8(input)?;
        if compression_methods_len == 0 {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }
        let (input, input_compression) = take(compression_methods_len)(input)?;
        let compression_methods = input_compression
            .iter()
            .map(|b| CompressionMethod::from_u8(*b))
            .collect();

        let (input, extensions) = Extension::parse_block(input)?;

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id,
                cookie,
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.client_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        self.cookie.serialize(output);

        output.extend_from_slice(&((self.cipher_suites.len() * 2) as u16).to_be_bytes());
        for suite in &self.cipher_suites {
            suite.serialize(output);
        }

        output.push(self.compression_methods.len() as u8);
        for method in &self.compression_methods {
            output.push(method.as_u8());
        }

        Extension::serialize_block(&self.extensions, output);
    }

    /// The SessionTicket extension, if offered. An empty slice means "send me a ticket".
    pub fn session_ticket(&self) -> Option<&'a [u8]> {
        find(&self.extensions, ExtensionType::SessionTicket).map(|e| e.extension_data)
    }

    /// Whether secp256r1 is acceptable. No supported_groups extension means any curve.
    pub fn supports_p256(&self) -> bool {
        let Some(ext) = find(&self.extensions, ExtensionType::SupportedGroups) else {
            return true;
        };
        ext.extension_data
            .get(2..)
            .unwrap_or_default()
            .chunks_exact(2)
            .any(|c| u16::from_be_bytes([c[0], c[1]]) == NAMED_CURVE_SECP256R1)
    }

    pub fn offers_null_compression(&self) -> bool {
        self.compression_methods.contains(&CompressionMethod::Null)
    }
}

/// Split a raw ClientHello body around its cookie.
///
/// Returns `(head, cookie, tail)` where `head` runs up to and including the session id
/// and `tail` is everything after the cookie. Cookie computation binds to both.
pub fn cookie_fields(body: &[u8]) -> Option<(&[u8], &[u8], &[u8])> {
    // version(2) + random(32)
    let sid_len_at = 34;
    let sid_len = *body.get(sid_len_at)? as usize;
    let cookie_len_at = sid_len_at + 1 + sid_len;
    let cookie_len = *body.get(cookie_len_at)? as usize;
    let cookie_end = cookie_len_at + 1 + cookie_len;
    if cookie_end > body.len() {
        return None;
    }

    Some((
        &body[..cookie_len_at],
        &body[cookie_len_at + 1..cookie_end],
        &body[cookie_end..],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello(cookie: &[u8], ticket: Option<&'static [u8]>) -> Vec<u8> {
        let mut extensions = Vec::new();
        if let Some(t) = ticket {
            extensions.push(Extension::new(ExtensionType::SessionTicket, t));
        }
        let ch = ClientHello {
            client_version: ProtocolVersion::DTLS1_2,
            random: Random {
                gmt_unix_time: 1,
                random_bytes: [2; 28],
            },
            session_id: SessionId::try_new(&[9; 4]).unwrap(),
            cookie: Cookie::try_new(cookie).unwrap(),
            cipher_suites: vec![CipherSuite::PSK_AES128_CCM_8, CipherSuite::Unknown(0x1301)],
            compression_methods: vec![CompressionMethod::Null],
            extensions,
        };
        let mut out = Vec::new();
        ch.serialize(&mut out);
        out
    }

    #[test]
    fn parse_keeps_unknown_suites() {
        let data = hello(&[], Some(&[][..]));
        let (rest, ch) = ClientHello::parse(&data).unwrap();
        assert!(rest.is_empty());
        assert_eq!(ch.cipher_suites.len(), 2);
        assert!(!ch.cipher_suites[1].is_known());
        assert!(ch.offers_null_compression());
        assert_eq!(ch.session_ticket(), Some(&[][..]));
    }

    #[test]
    fn no_extension_block_at_all() {
        let data = hello(&[], None);
        let (_, ch) = ClientHello::parse(&data).unwrap();
        assert!(ch.extensions.is_empty());
        assert_eq!(ch.session_ticket(), None);
    }

    #[test]
    fn cookie_split_excludes_cookie_bytes() {
        let without = hello(&[], None);
        let with = hello(&[0xAB; 32], None);

        let (h1, c1, t1) = cookie_fields(&without).unwrap();
        let (h2, c2, t2) = cookie_fields(&with).unwrap();

        assert!(c1.is_empty());
        assert_eq!(c2, &[0xAB; 32]);
        assert_eq!(h1, h2);
        assert_eq!(t1, t2);
    }

    #[test]
    fn cookie_split_rejects_truncated_body() {
        let data = hello(&[1; 8], None);
        assert!(cookie_fields(&data[..40]).is_none());
    }

    #[test]
    fn odd_cipher_suite_length_is_rejected() {
        let mut data = hello(&[], None);
        // cipher_suites_len sits after version, random, sid(1+4), cookie(1)
        let at = 2 + 32 + 5 + 1;
        data[at + 1] = 3;
        assert!(ClientHello::parse(&data).is_err());
    }

    #[test]
    fn supported_groups_gate_p256() {
        let data = hello(&[], None);
        let (_, mut ch) = ClientHello::parse(&data).unwrap();
        assert!(ch.supports_p256());

        ch.extensions = vec![Extension::new(ExtensionType::SupportedGroups, &[0, 2, 0, 29])];
        assert!(!ch.supports_p256());

        ch.extensions = vec![Extension::new(ExtensionType::SupportedGroups, &[0, 4, 0, 29, 0, 23])];
        assert!(ch.supports_p256());
    }
}
