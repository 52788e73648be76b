use crate::ddc::ci::DdcOpcode;

use super::{bracketed, trim_spaces, CapabilitiesParseError, Value, VcpCapability};
use nom::{
    branch::alt,
    bytes::complete::take,
    character::complete::{char, u8},
    combinator::{all_consuming, map, map_parser, map_res, opt, rest},
    multi::many0,
    sequence::{separated_pair, tuple},
    Finish, IResult,
};
use std::str;

/// Parsed display capabilities string entry
#[derive(Clone, Debug, PartialEq)]
pub enum Cap<'a> {
    Protocol(&'a str),
    Type(&'a str),
    Model(&'a str),
    Commands(Vec<DdcOpcode>),
    Whql(u8),
    MccsVersion(u8, u8),
    Vcp(Vec<VcpCapability>),
    Unknown(Value<'a>),
}

impl<'i> Cap<'i> {
    pub fn parse_entry(value: Value<'i>) -> Result<Cap<'i>, CapabilitiesParseError> {
        match value {
            Value::String { tag, value } => Self::parse_string(tag, value),
            Value::Binary { .. } => Ok(Cap::Unknown(value)),
        }
    }

    fn parse_string(tag: &'i str, i: &'i [u8]) -> Result<Cap<'i>, CapabilitiesParseError> {
        let invalid = || CapabilitiesParseError::InvalidEntry {
            tag: tag.into(),
            input: i.escape_ascii().to_string(),
        };
        let result: IResult<&[u8], Cap> = match tag {
            "prot" => all_consuming(map(value, Cap::Protocol))(i),
            "type" => all_consuming(map(value, Cap::Type))(i),
            "model" => all_consuming(map(value, Cap::Model))(i),
            "cmds" => all_consuming(map(hexarray, |codes| {
                Cap::Commands(codes.into_iter().map(DdcOpcode::from).collect())
            }))(i),
            "mswhql" => all_consuming(map(map_parser(take(1usize), u8), Cap::Whql))(i),
            "mccs_ver" => {
                return all_consuming(trim_spaces(mccs_ver))(i)
                    .finish()
                    .map(|(_, (major, minor))| Cap::MccsVersion(major, minor))
                    .map_err(|_| CapabilitiesParseError::InvalidVersion(i.escape_ascii().to_string()))
            }
            "vcp" | "VCP" => all_consuming(map(trim_spaces(many0(vcp)), Cap::Vcp))(i),
            _ => return Ok(Cap::Unknown(Value::String { tag, value: i })),
        };
        result.finish().map(|(_, c)| c).map_err(|_| invalid())
    }
}

fn value(i: &[u8]) -> IResult<&[u8], &str> {
    map_res(rest, str::from_utf8)(i)
}

fn hexarray(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    many0(trim_spaces(hexvalue))(i)
}

fn hexvalue(i: &[u8]) -> IResult<&[u8], u8> {
    map_res(take(2usize), |digits: &[u8]| {
        str::from_utf8(digits)
            .ok()
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .ok_or(())
    })(i)
}

fn vcp(i: &[u8]) -> IResult<&[u8], VcpCapability> {
    let (i, (code, values)) = tuple((
        trim_spaces(hexvalue),
        opt(bracketed(many0(trim_spaces(hexvalue)))),
    ))(i)?;
    Ok((i, VcpCapability { code, values }))
}

/// `2.1` or the packed `0201` form
fn mccs_ver(i: &[u8]) -> IResult<&[u8], (u8, u8)> {
    alt((
        separated_pair(u8, char('.'), u8),
        tuple((map_parser(take(2usize), u8), map_parser(take(2usize), u8))),
    ))(i)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn packed_version() {
        assert_eq!(mccs_ver(b"0201"), Ok((&b""[..], (2, 1))));
        assert_eq!(mccs_ver(b"3.0"), Ok((&b""[..], (3, 0))));
    }

    #[test]
    fn vcp_values_without_spaces() {
        let (_, caps) = all_consuming(many0(vcp))(&b"14(050608) 60( 0F 11 )"[..]).unwrap();
        assert_eq!(caps[0].values, Some(vec![0x05, 0x06, 0x08]));
        assert_eq!(caps[1].values, Some(vec![0x0f, 0x11]));
    }

    #[test]
    fn invalid_hex_in_cmds() {
        assert!(matches!(
            Cap::parse_entry(Value::String {
                tag: "cmds",
                value: b"01 zz"
            }),
            Err(CapabilitiesParseError::InvalidEntry { .. })
        ));
    }
}
