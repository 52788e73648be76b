use std::fmt::Write;

use nom::bytes::complete::{tag, take};
use nom::combinator::peek;
use nom::multi::count;
use nom::number::complete::{be_u16, le_u16, le_u32, le_u8};
use nom::{IResult, Parser};
use thiserror::Error;

/// Size of the base EDID block.
pub const EDID_LENGTH: usize = 128;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Header {
    pub vendor: [char; 3],
    pub product: u16,
    pub serial: u32,
    pub week: u8,
    pub year: u8, // Starting at year 1990
    pub version: u8,
    pub revision: u8,
}

fn parse_vendor(v: u16) -> [char; 3] {
    let mask: u8 = 0x1F; // Each letter is 5 bits
    let i0 = b'A' - 1; // 0x01 = A
    [
        (((v >> 10) as u8 & mask) + i0) as char,
        (((v >> 5) as u8 & mask) + i0) as char,
        ((v as u8 & mask) + i0) as char,
    ]
}

fn parse_header(i: &[u8]) -> IResult<&[u8], Header> {
    let (i, _) = tag(&[0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00]).parse(i)?;
    let (i, vendor) = be_u16.parse(i)?;
    let (i, product) = le_u16.parse(i)?;
    let (i, serial) = le_u32.parse(i)?;
    let (i, week) = le_u8.parse(i)?;
    let (i, year) = le_u8.parse(i)?;
    let (i, version) = le_u8.parse(i)?;
    let (i, revision) = le_u8.parse(i)?;
    Ok((
        i,
        Header {
            vendor: parse_vendor(vendor),
            product,
            serial,
            week,
            year,
            version,
            revision,
        },
    ))
}

/// Descriptor text is ASCII, terminated by a line feed and padded with spaces.
fn parse_descriptor_text(i: &[u8]) -> IResult<&[u8], String> {
    let (i, encoded) = take(13usize).parse(i)?;
    let decoded = encoded
        .iter()
        .take_while(|b| **b != 0x0A)
        .map(|b| {
            if b.is_ascii_graphic() || *b == b' ' {
                *b as char
            } else {
                '?'
            }
        })
        .collect::<String>();
    Ok((i, decoded.trim().to_string()))
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Descriptor {
    /// detailed timing block, not decoded
    DetailedTiming,
    SerialNumber(String),
    UnspecifiedText(String),
    ProductName(String),
    /// any other display descriptor, by tag
    Other(u8),
}

fn parse_descriptor(i: &[u8]) -> IResult<&[u8], Descriptor> {
    let (i, prefix) = peek(take(5usize)).parse(i)?;
    if prefix[..3] != [0, 0, 0] {
        let (i, _timing) = take(18usize).parse(i)?;
        return Ok((i, Descriptor::DetailedTiming));
    }
    let descriptor_type = prefix[3];
    let (i, _reserved) = take(5usize).parse(i)?;
    match descriptor_type {
        0xFF => parse_descriptor_text(i).map(|(i, s)| (i, Descriptor::SerialNumber(s))),
        0xFE => parse_descriptor_text(i).map(|(i, s)| (i, Descriptor::UnspecifiedText(s))),
        0xFC => parse_descriptor_text(i).map(|(i, s)| (i, Descriptor::ProductName(s))),
        other => {
            let (i, _data) = take(13usize).parse(i)?;
            Ok((i, Descriptor::Other(other)))
        }
    }
}

/// Parsed base EDID block, with the raw bytes kept for identification.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Edid {
    pub header: Header,
    pub descriptors: Vec<Descriptor>,
    pub num_extr: u8,
    bytes: Vec<u8>,
}

impl Edid {
    /// Three letter PNP manufacturer id.
    pub fn mfg_id(&self) -> String {
        self.header.vendor.iter().collect()
    }

    pub fn product_code(&self) -> u16 {
        self.header.product
    }

    /// Model name from the product name descriptor, empty if absent.
    pub fn model_name(&self) -> &str {
        self.descriptors
            .iter()
            .find_map(|d| match d {
                Descriptor::ProductName(name) => Some(name.as_str()),
                _ => None,
            })
            .unwrap_or("")
    }

    /// Serial number from the serial descriptor, empty if absent.
    pub fn serial_ascii(&self) -> &str {
        self.descriptors
            .iter()
            .find_map(|d| match d {
                Descriptor::SerialNumber(serial) => Some(serial.as_str()),
                _ => None,
            })
            .unwrap_or("")
    }

    pub fn serial_binary(&self) -> u32 {
        self.header.serial
    }

    pub fn manufacture_year(&self) -> u16 {
        self.header.year as u16 + 1990
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Upper case hex string of the 128 byte block.
    pub fn hex(&self) -> String {
        self.bytes.iter().fold(String::with_capacity(256), |mut s, b| {
            let _ = write!(s, "{b:02X}");
            s
        })
    }
}

pub fn parse_edid(full_input: &[u8]) -> Result<Edid, EdidParseError> {
    if full_input.len() < EDID_LENGTH {
        return Err(EdidParseError::TooShort(full_input.len()));
    }
    let block = &full_input[..EDID_LENGTH];
    let (i, header) = parse_header(block)?;
    // display parameters, chromaticity, established and standard timings
    let (i, _) = take::<usize, &[u8], nom::error::Error<&[u8]>>(5 + 10 + 3 + 16).parse(i)?;
    let (i, descriptors) = count(parse_descriptor, 4)(i)?;
    let (i, num_extr) = le_u8::<&[u8], nom::error::Error<_>>.parse(i)?; // number of extensions
    let (_i, check) = le_u8::<&[u8], nom::error::Error<_>>.parse(i)?;
    let sum_all = block[..EDID_LENGTH - 1]
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum_all.wrapping_add(check) == 0 {
        Ok(Edid {
            header,
            descriptors,
            num_extr,
            bytes: block.to_vec(),
        })
    } else {
        Err(EdidParseError::InvalidChecksum)
    }
}

#[derive(Error, Debug)]
pub enum EdidParseError {
    #[error("Checksum is invalid, data corrupt!")]
    InvalidChecksum,
    #[error("EDID must be {EDID_LENGTH} bytes, got {0}")]
    TooShort(usize),
    #[error("Parsing data failed: {0}")]
    NomParserError(String),
}

impl<T> From<nom::Err<T>> for EdidParseError
where
    T: core::fmt::Debug,
{
    fn from(value: nom::Err<T>) -> Self {
        EdidParseError::NomParserError(format!("{value:?}"))
    }
}

/// Builds a valid EDID block with the given identity.
#[cfg(test)]
pub(crate) fn sample_edid(mfg: &str, model: &str, serial: &str) -> Vec<u8> {
    fn text_descriptor(tag: u8, text: &str) -> Vec<u8> {
        let mut d = vec![0, 0, 0, tag, 0];
        let mut text = text.as_bytes().to_vec();
        text.truncate(13);
        if text.len() < 13 {
            text.push(0x0A);
        }
        text.resize(13, b' ');
        d.extend(text);
        d
    }

    let letters: Vec<u16> = mfg.bytes().map(|b| (b - b'A' + 1) as u16).collect();
    let vendor = letters[0] << 10 | letters[1] << 5 | letters[2];
    let mut edid = vec![0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
    edid.extend(vendor.to_be_bytes());
    edid.extend(0x1234u16.to_le_bytes());
    edid.extend(42u32.to_le_bytes());
    edid.extend([1, 30, 1, 4]);
    edid.resize(54, 0x01);
    edid.extend([0x01; 18]);
    edid.extend(text_descriptor(0xFC, model));
    edid.extend(text_descriptor(0xFF, serial));
    edid.extend(text_descriptor(0xFD, ""));
    edid.push(0);
    let sum = edid.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    edid.push(0u8.wrapping_sub(sum));
    edid
}
