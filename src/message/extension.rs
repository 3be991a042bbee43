use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use super::{NAMED_CURVE_SECP256R1, POINT_FORMAT_UNCOMPRESSED};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Extension<'a> {
    pub extension_type: ExtensionType,
    pub extension_data: &'a [u8],
}

impl<'a> Extension<'a> {
    pub fn new(extension_type: ExtensionType, extension_data: &'a [u8]) -> Self {
        Extension {
            extension_type,
            extension_data,
        }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Extension<'a>> {
        let (input, extension_type) = ExtensionType::parse(input)?;
        let (input, extension_length) = be_u16(input)?;
        let (input, extension_data) = take(extension_length)(input)?;

        Ok((
            input,
            Extension {
                extension_type,
                extension_data,
            },
        ))
    }

    /// Parse an extension block: `len(u16) ‖ extension*`. Absent block means no extensions.
    pub fn parse_block(input: &'a [u8]) -> IResult<&'a [u8], Vec<Extension<'a>>> {
        if input.is_empty() {
            return Ok((input, Vec::new()));
        }

        let (input, len) = be_u16(input)?;
        let (input, mut block) = take(len)(input)?;

        let mut extensions = Vec::new();
        while !block.is_empty() {
            let (rest, ext) = Extension::parse(block)?;
            extensions.push(ext);
            block = rest;
        }

        Ok((input, extensions))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.extension_type.as_u16().to_be_bytes());
        output.extend_from_slice(&(self.extension_data.len() as u16).to_be_bytes());
        output.extend_from_slice(self.extension_data);
    }

    /// Write an extension block. Nothing at all is written for an empty list.
    pub fn serialize_block(extensions: &[Extension<'_>], output: &mut Vec<u8>) {
        if extensions.is_empty() {
            return;
        }

        let len: usize = extensions.iter().map(|e| 4 + e.extension_data.len()).sum();
        output.extend_from_slice(&(len as u16).to_be_bytes());
        for ext in extensions {
            ext.serialize(output);
        }
    }
}

/// Find an extension by type.
pub(crate) fn find<'a, 'b>(
    extensions: &'b [Extension<'a>],
    extension_type: ExtensionType,
) -> Option<&'b Extension<'a>> {
    extensions
        .iter()
        .find(|e| e.extension_type == extension_type)
}

/// supported_groups body advertising only secp256r1.
pub(crate) const SUPPORTED_GROUPS_P256: [u8; 4] = {
    let c = NAMED_CURVE_SECP256R1.to_be_bytes();
    [0x00, 0x02, c[0], c[1]]
};

/// ec_point_formats body advertising only uncompressed points.
pub(crate) const EC_POINT_FORMATS_UNCOMPRESSED: [u8; 2] = [0x01, POINT_FORMAT_UNCOMPRESSED];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionType {
    SupportedGroups,
    EcPointFormats,
    SignatureAlgorithms,
    SessionTicket,
    RenegotiationInfo,
    Unknown(u16),
}

impl ExtensionType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x000A => ExtensionType::SupportedGroups,
            0x000B => ExtensionType::EcPointFormats,
            0x000D => ExtensionType::SignatureAlgorithms,
            0x0023 => ExtensionType::SessionTicket,
            0xFF01 => ExtensionType::RenegotiationInfo,
            _ => ExtensionType::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ExtensionType::SupportedGroups => 0x000A,
            ExtensionType::EcPointFormats => 0x000B,
            ExtensionType::SignatureAlgorithms => 0x000D,
            ExtensionType::SessionTicket => 0x0023,
            ExtensionType::RenegotiationInfo => 0xFF01,
            ExtensionType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ExtensionType> {
        let (input, value) = be_u16(input)?;
        Ok((input, ExtensionType::from_u16(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_with_empty_session_ticket() {
        let exts = [
            Extension::new(ExtensionType::SessionTicket, &[]),
            Extension::new(ExtensionType::SupportedGroups, &SUPPORTED_GROUPS_P256),
        ];
        let mut out = Vec::new();
        Extension::serialize_block(&exts, &mut out);

        assert_eq!(&out[..6], &[0x00, 0x0C, 0x00, 0x23, 0x00, 0x00]);

        let (rest, parsed) = Extension::parse_block(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed.len(), 2);
        assert!(find(&parsed, ExtensionType::SessionTicket)
            .unwrap()
            .extension_data
            .is_empty());
        assert!(find(&parsed, ExtensionType::EcPointFormats).is_none());
    }

    #[test]
    fn missing_block_is_no_extensions() {
        let (_, parsed) = Extension::parse_block(&[]).unwrap();
        assert!(parsed.is_empty());
    }
}
