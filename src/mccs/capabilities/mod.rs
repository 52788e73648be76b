//! MCCS compliant displays will report their supported capabilities in a string
//! This module parses the capability string into structured data.

mod entries;
mod parsers;

use std::{collections::BTreeSet, fmt, str};

use log::debug;
use thiserror::Error;

use self::{entries::ValueParser, parsers::Cap};
use super::{DisplayTechnology, Protocol};
use crate::{
    ddc::ci::DdcOpcode,
    mccs::{UnknownData, UnknownTag, Version},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilitiesParseError {
    #[error("unbalanced parentheses in capabilities string")]
    UnbalancedParentheses,
    #[error("invalid {tag} entry: {input}")]
    InvalidEntry { tag: String, input: String },
    #[error("invalid mccs_ver value {0:?}")]
    InvalidVersion(String),
    #[error("malformed capabilities string near {0:?}")]
    Malformed(String),
}

/// A feature declared in the `vcp(...)` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcpCapability {
    pub code: u8,
    /// allowed values, `None` if the feature declares no value list
    pub values: Option<Vec<u8>>,
}

/// Parsed display capabilities string.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Capabilities {
    /// It's not very clear what this field is for.
    pub protocol: Option<Protocol>,
    /// The display panel technology.
    pub ty: Option<DisplayTechnology>,
    /// The monitor model identifier.
    pub model: Option<String>,
    /// List of supported DDCCI commands.
    pub commands: Vec<DdcOpcode>,
    /// A value of `1` seems to indicate that the monitor has passed Microsoft's
    /// Windows Hardware Quality Labs testing.
    pub ms_whql: Option<u8>,
    /// Monitor Command Control Set version code.
    pub mccs_version: Option<Version>,
    /// Virtual Control Panel feature code descriptors.
    pub vcp_features: Vec<VcpCapability>,
    /// Additional unrecognized data from the capability string.
    pub unknown_tags: Vec<UnknownTag>,
}

impl Capabilities {
    pub fn command_codes(&self) -> BTreeSet<u8> {
        self.commands.iter().map(|c| u8::from(*c)).collect()
    }

    pub fn feature(&self, code: u8) -> Option<&VcpCapability> {
        self.vcp_features.iter().find(|f| f.code == code)
    }

    pub fn supports_feature(&self, code: u8) -> bool {
        self.feature(code).is_some()
    }
}

/// Parses a MCCS capability string.
pub fn parse_capabilities<C: AsRef<[u8]>>(
    capability_string: C,
) -> Result<Capabilities, CapabilitiesParseError> {
    let entries = Value::parse_capabilities(capability_string.as_ref());

    let mut caps = Capabilities::default();
    for entry in entries {
        match Cap::parse_entry(entry?)? {
            Cap::Protocol(protocol) => caps.protocol = Some(protocol.into()),
            Cap::Type(ty) => caps.ty = Some(ty.into()),
            Cap::Model(model) => caps.model = Some(model.into()),
            Cap::Commands(cmds) => caps.commands = cmds,
            Cap::Whql(whql) => caps.ms_whql = Some(whql),
            Cap::MccsVersion(major, minor) => caps.mccs_version = Some(Version::new(major, minor)),
            Cap::Vcp(vcp) => caps.vcp_features.extend(vcp),
            Cap::Unknown(value) => {
                debug!("unrecognized capabilities entry {value}");
                caps.unknown_tags.push(value.into())
            }
        }
    }

    Ok(caps)
}

/// An entry from a capability string
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Value<'i> {
    /// A normal string
    String {
        /// The value name
        tag: &'i str,
        /// String contents
        value: &'i [u8],
    },
    /// Raw binary data
    Binary {
        /// The value name
        tag: &'i str,
        /// Data contents
        data: &'i [u8],
    },
}

impl<'i> Value<'i> {
    /// Create a new iterator over the values in a capability string
    pub fn parse_capabilities(capability_string: &'i [u8]) -> ValueParser<'i> {
        ValueParser::new(capability_string)
    }

    /// The value name
    pub fn tag(&self) -> &'i str {
        match *self {
            Value::String { tag, .. } => tag,
            Value::Binary { tag, .. } => tag,
        }
    }
}

impl From<Value<'_>> for UnknownTag {
    fn from(v: Value) -> Self {
        UnknownTag {
            name: v.tag().into(),
            data: match v {
                Value::Binary { data, .. } => UnknownData::Binary(data.into()),
                Value::String { value, .. } => match str::from_utf8(value) {
                    Ok(value) => UnknownData::String(value.into()),
                    Err(_) => UnknownData::StringBytes(value.into()),
                },
            },
        }
    }
}

impl<'i> fmt::Display for Value<'i> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::String { tag, value } => write!(f, "{tag}({})", value.escape_ascii()),
            Value::Binary { tag, data } => {
                write!(f, "{tag} bin({}({}))", data.len(), data.escape_ascii())
            }
        }
    }
}

pub(crate) fn trim_spaces<I, O, E, P>(parser: P) -> impl FnMut(I) -> nom::IResult<I, O, E>
where
    P: nom::Parser<I, O, E>,
    E: nom::error::ParseError<I>,
    I: Clone + nom::InputTakeAtPosition,
    <I as nom::InputTakeAtPosition>::Item: nom::AsChar + Clone,
{
    use nom::{character::complete::space0, sequence::delimited};

    delimited(space0, parser, space0)
}

pub(crate) fn bracketed<I, O, E, P>(parser: P) -> impl FnMut(I) -> nom::IResult<I, O, E>
where
    P: nom::Parser<I, O, E>,
    E: nom::error::ParseError<I>,
    I: Clone + nom::Slice<std::ops::RangeFrom<usize>> + nom::InputIter,
    <I as nom::InputIter>::Item: nom::AsChar,
{
    use nom::{character::complete::char, sequence::delimited};

    delimited(char('('), parser, char(')'))
}
