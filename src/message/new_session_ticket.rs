use nom::number::complete::be_u32;
use nom::IResult;

use super::util::{put_u16_prefixed, u16_prefixed};

/// RFC 5077 NewSessionTicket: `lifetime_hint(u32) ‖ ticket<0..2^16-1>`.
#[derive(Debug, PartialEq, Eq)]
pub struct NewSessionTicket<'a> {
    pub lifetime_hint: u32,
    pub ticket: &'a [u8],
}

impl<'a> NewSessionTicket<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], NewSessionTicket<'a>> {
        let (input, lifetime_hint) = be_u32(input)?;
        let (input, ticket) = u16_prefixed(input)?;
        Ok((
            input,
            NewSessionTicket {
                lifetime_hint,
                ticket,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.lifetime_hint.to_be_bytes());
        put_u16_prefixed(output, self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_new_session_ticket() {
        let data = [
            0x00, 0x01, 0x51, 0x80, // lifetime_hint 86400
            0x00, 0x04, // ticket_len
            0x01, 0x02, 0x03, 0x04, // ticket
        ];

        let (rest, nst) = NewSessionTicket::parse(&data).unwrap();
        assert!(rest.is_empty());
        assert_eq!(nst.lifetime_hint, 86400);
        assert_eq!(nst.ticket, &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn parse_invalid_new_session_ticket() {
        let data = [
            0x00, 0x00, 0x00, 0x10, // lifetime_hint
            0x00, 0x04, // ticket_len
            0x01, 0x02, 0x03, // incomplete ticket
        ];

        assert!(NewSessionTicket::parse(&data).is_err());
    }
}
