use std::time::Instant;

use nom::bytes::complete::take;
use nom::number::complete::be_u32;
use nom::IResult;

use crate::rng::SeededRng;
use crate::time_tricks::InstantExt;

/// Hello random: 4 bytes of wall-clock seconds followed by 28 random bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Random {
    pub gmt_unix_time: u32,
    pub random_bytes: [u8; 28],
}

impl Random {
    pub fn new(now: Instant, rng: &mut SeededRng) -> Self {
        // Valid until 2106.
        let gmt_unix_time = now.to_unix_duration().as_secs() as u32;

        let mut random_bytes = [0u8; 28];
        rng.fill(&mut random_bytes);

        Self {
            gmt_unix_time,
            random_bytes,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Random> {
        let (input, gmt_unix_time) = be_u32(input)?;
        let (input, input_rand) = take(28_usize)(input)?;
        let mut random_bytes = [0u8; 28];
        random_bytes.copy_from_slice(input_rand);

        Ok((
            input,
            Random {
                gmt_unix_time,
                random_bytes,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.gmt_unix_time.to_be_bytes());
        output.extend_from_slice(&self.random_bytes);
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        let mut random_bytes = [0u8; 28];
        random_bytes.copy_from_slice(&bytes[4..]);
        Random {
            gmt_unix_time: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            random_bytes,
        }
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[..4].copy_from_slice(&self.gmt_unix_time.to_be_bytes());
        out[4..].copy_from_slice(&self.random_bytes);
        out
    }
}
