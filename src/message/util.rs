use nom::bytes::complete::take;
use nom::error::{make_error, ErrorKind};
use nom::number::complete::{be_u16, be_u24, be_u8};
use nom::{Err, IResult};

/// Parse a 48-bit big-endian integer.
pub fn be_u48(input: &[u8]) -> IResult<&[u8], u64> {
    if input.len() < 6 {
        return Err(Err::Error(make_error(input, ErrorKind::Eof)));
    }

    let mut value = 0u64;
    for b in &input[..6] {
        value = (value << 8) | *b as u64;
    }

    Ok((&input[6..], value))
}

/// `opaque<0..2^8-1>`
pub fn u8_prefixed(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u8(input)?;
    take(len as usize)(input)
}

/// `opaque<0..2^16-1>`
pub fn u16_prefixed(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u16(input)?;
    take(len as usize)(input)
}

/// `opaque<0..2^24-1>`
pub fn u24_prefixed(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u24(input)?;
    take(len as usize)(input)
}

pub fn put_u24(output: &mut Vec<u8>, value: u32) {
    output.extend_from_slice(&value.to_be_bytes()[1..]);
}

pub fn put_u48(output: &mut Vec<u8>, value: u64) {
    output.extend_from_slice(&value.to_be_bytes()[2..]);
}

/// Write `len(u16) ‖ data`.
pub fn put_u16_prefixed(output: &mut Vec<u8>, data: &[u8]) {
    output.extend_from_slice(&(data.len() as u16).to_be_bytes());
    output.extend_from_slice(data);
}
