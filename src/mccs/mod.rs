//! VESA Monitor Command Control Set standardizes the meaning of DDC/CI VCP
//! feature codes, and allows a display to broadcast its capabilities to the
//! host.

pub mod capabilities;
pub mod features;

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// Display protocol class
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    /// Standard monitor
    Monitor,
    Display,
    /// Unrecognized protocol class
    Unknown(String),
}

impl<'a> From<&'a str> for Protocol {
    fn from(s: &'a str) -> Self {
        match s.trim() {
            s if s.eq_ignore_ascii_case("monitor") => Protocol::Monitor,
            s if s.eq_ignore_ascii_case("display") => Protocol::Display,
            s => Protocol::Unknown(s.into()),
        }
    }
}

/// Display type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DisplayTechnology {
    /// Cathode Ray Tube display
    Crt,
    /// Liquid Crystal Display
    Lcd,
    /// Oled
    Led,
    /// Unrecognized display type
    Unknown(String),
}

impl<'a> From<&'a str> for DisplayTechnology {
    fn from(s: &'a str) -> Self {
        match s.trim() {
            s if s.eq_ignore_ascii_case("crt") => DisplayTechnology::Crt,
            s if s.eq_ignore_ascii_case("lcd") => DisplayTechnology::Lcd,
            s if s.eq_ignore_ascii_case("led") => DisplayTechnology::Led,
            s => DisplayTechnology::Unknown(s.into()),
        }
    }
}

/// Monitor Command Control Set specification version code
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version {
    /// Major version number
    pub major: u8,
    /// Minor revision version
    pub minor: u8,
}

impl Version {
    pub const V2_0: Version = Version::new(2, 0);
    pub const V2_1: Version = Version::new(2, 1);
    pub const V2_2: Version = Version::new(2, 2);
    pub const V3_0: Version = Version::new(3, 0);

    /// Create a new MCCS version from the specified version and revision.
    pub const fn new(major: u8, minor: u8) -> Self {
        Version { major, minor }
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = String;

    /// accepts `M.m`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s.trim().split_once('.').ok_or_else(|| s.to_string())?;
        Ok(Version::new(
            major.parse().map_err(|_| s.to_string())?,
            minor.parse().map_err(|_| s.to_string())?,
        ))
    }
}

/// MCCS version of a display as far as it is known.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VersionSpec {
    /// not asked for yet
    #[default]
    Unqueried,
    /// asked for, but the display did not say
    Unknown,
    Known(Version),
}

impl VersionSpec {
    pub fn version(&self) -> Option<Version> {
        match self {
            VersionSpec::Known(version) => Some(*version),
            _ => None,
        }
    }

    pub fn is_queried(&self) -> bool {
        !matches!(self, VersionSpec::Unqueried)
    }
}

impl From<Version> for VersionSpec {
    fn from(version: Version) -> Self {
        VersionSpec::Known(version)
    }
}

impl Display for VersionSpec {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            VersionSpec::Unqueried => f.write_str("Unqueried"),
            VersionSpec::Unknown => f.write_str("Unknown"),
            VersionSpec::Known(version) => Display::fmt(version, f),
        }
    }
}

/// An unrecognized entry in the capability string
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnknownTag {
    /// The name of the entry
    pub name: String,
    /// The data contained in the entry, usually an unparsed string.
    pub data: UnknownData,
}

/// Data that can be contained in a capability entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UnknownData {
    /// UTF-8/ASCII data
    String(String),
    /// Data that is not valid UTF-8
    StringBytes(Vec<u8>),
    /// Length-prefixed binary data
    Binary(Vec<u8>),
}
