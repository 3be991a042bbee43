use super::util::{be_u48, put_u48};
use super::ProtocolVersion;
use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

/// Length of the DTLS 1.2 record header on the wire.
pub const RECORD_HEADER_LEN: usize = 13;

/// Largest sequence number representable in the 48-bit field.
pub const MAX_SEQUENCE_NUMBER: u64 = (1 << 48) - 1;

/// Epoch and 48-bit sequence number of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sequence {
    pub epoch: u16,
    pub sequence_number: u64,
}

impl Sequence {
    pub fn new(epoch: u16, sequence_number: u64) -> Self {
        Self {
            epoch,
            sequence_number,
        }
    }

    /// The 8-byte `epoch ‖ sequence` form used as explicit nonce and in the AAD.
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut out = self.sequence_number.to_be_bytes();
        out[..2].copy_from_slice(&self.epoch.to_be_bytes());
        out
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct DTLSRecord<'a> {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub sequence: Sequence,
    pub length: u16,
    pub fragment: &'a [u8],
}

impl<'a> DTLSRecord<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], DTLSRecord<'a>> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, epoch) = be_u16(input)?;
        let (input, sequence_number) = be_u48(input)?;
        let (input, length) = be_u16(input)?;
        let (input, fragment) = take(length as usize)(input)?;

        Ok((
            input,
            DTLSRecord {
                content_type,
                version,
                sequence: Sequence::new(epoch, sequence_number),
                length,
                fragment,
            },
        ))
    }

    /// Write the 13-byte header for a record of `length` fragment bytes.
    pub fn serialize_header(
        content_type: ContentType,
        sequence: Sequence,
        length: u16,
        output: &mut Vec<u8>,
    ) {
        output.push(content_type.as_u8());
        ProtocolVersion::DTLS1_2.serialize(output);
        output.extend_from_slice(&sequence.epoch.to_be_bytes());
        put_u48(output, sequence.sequence_number);
        output.extend_from_slice(&length.to_be_bytes());
    }

    #[cfg(test)]
    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.content_type.as_u8());
        self.version.serialize(output);
        output.extend_from_slice(&self.sequence.epoch.to_be_bytes());
        put_u48(output, self.sequence.sequence_number);
        output.extend_from_slice(&self.length.to_be_bytes());
        output.extend_from_slice(self.fragment);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    Unknown(u8),
}

impl ContentType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            _ => ContentType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
            ContentType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ContentType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &[u8] = &[
        0x16, // ContentType::Handshake
        0xFE, 0xFD, // ProtocolVersion::DTLS1_2
        0x00, 0x01, // epoch
        0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // sequence_number
        0x00, 0x04, // length
        0x01, 0x02, 0x03, 0x04, // fragment
        0x17, // start of next record
    ];

    #[test]
    fn parse_leaves_following_record() {
        let (rest, parsed) = DTLSRecord::parse(RECORD).unwrap();
        assert_eq!(parsed.content_type, ContentType::Handshake);
        assert_eq!(parsed.version, ProtocolVersion::DTLS1_2);
        assert_eq!(parsed.sequence, Sequence::new(1, 1));
        assert_eq!(parsed.fragment, &[1, 2, 3, 4]);
        assert_eq!(rest, &[0x17]);

        let mut out = Vec::new();
        parsed.serialize(&mut out);
        assert_eq!(out, &RECORD[..RECORD.len() - 1]);
    }

    #[test]
    fn truncated_fragment_is_rejected() {
        assert!(DTLSRecord::parse(&RECORD[..15]).is_err());
    }

    #[test]
    fn sequence_bytes_put_epoch_first() {
        let s = Sequence::new(0x0102, 0x0000_0304_0506);
        assert_eq!(s.to_bytes(), [0x01, 0x02, 0x00, 0x00, 0x03, 0x04, 0x05, 0x06]);
    }
}
