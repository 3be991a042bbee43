use nom::bytes::complete::take;
use nom::IResult;

/// Length of TLS 1.2 verify_data for every suite we speak.
pub const VERIFY_DATA_LEN: usize = 12;

#[derive(Debug, PartialEq, Eq)]
pub struct Finished<'a> {
    pub verify_data: &'a [u8],
}

impl<'a> Finished<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Finished<'a>> {
        let (input, verify_data) = take(VERIFY_DATA_LEN)(input)?;
        Ok((input, Finished { verify_data }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(self.verify_data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_verify_data_is_refused() {
        assert!(Finished::parse(&[0; 11]).is_err());
        let (rest, f) = Finished::parse(&[1; 13]).unwrap();
        assert_eq!(f.verify_data.len(), 12);
        assert_eq!(rest.len(), 1);
    }
}
