//! Splitting a capability string into its top level `tag(...)` entries.

use nom::{
    bytes::complete::{tag as literal, take, take_while1},
    character::complete::{char, multispace0, u32},
    error::{Error, ErrorKind},
    sequence::{delimited, preceded},
    Err, IResult, Parser,
};

use super::{CapabilitiesParseError, Value};

/// Takes everything up to the parenthesis closing an already opened one.
fn balanced(i: &[u8]) -> IResult<&[u8], &[u8]> {
    let mut depth = 0usize;
    for (pos, c) in i.iter().enumerate() {
        match c {
            b'(' => depth += 1,
            b')' if depth == 0 => return Ok((&i[pos..], &i[..pos])),
            b')' => depth -= 1,
            _ => {}
        }
    }
    Err(Err::Error(Error::new(i, ErrorKind::Eof)))
}

fn is_tag_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// `tag bin(len(data))`
fn binary_entry(i: &[u8]) -> IResult<&[u8], &[u8]> {
    let (i, len) = preceded(multispace0, preceded(literal("bin("), u32)).parse(i)?;
    let (i, data) = delimited(char('('), take(len as usize), char(')')).parse(i)?;
    let (i, _) = char(')')(i)?;
    Ok((i, data))
}

fn entry(i: &[u8]) -> IResult<&[u8], Value<'_>> {
    let (i, tag) = preceded(multispace0, take_while1(is_tag_char)).parse(i)?;
    // tag characters are ASCII
    let tag = std::str::from_utf8(tag).unwrap_or_default();
    if let Ok((i, data)) = binary_entry(i) {
        return Ok((i, Value::Binary { tag, data }));
    }
    let (i, value) = preceded(multispace0, delimited(char('('), balanced, char(')'))).parse(i)?;
    Ok((i, Value::String { tag, value }))
}

/// Finds the body of a capability string, without the optional enclosing
/// parentheses.
fn body(capability_string: &[u8]) -> Result<&[u8], CapabilitiesParseError> {
    let trimmed = capability_string
        .iter()
        .rposition(|c| !c.is_ascii_whitespace() && *c != 0)
        .map(|end| &capability_string[..=end])
        .unwrap_or_default();
    let start = trimmed
        .iter()
        .position(|c| !c.is_ascii_whitespace())
        .unwrap_or(trimmed.len());
    let trimmed = &trimmed[start..];

    match trimmed.split_first() {
        Some((b'(', inner)) => match balanced(inner) {
            Ok((rest, body)) => {
                if rest.len() > 1 {
                    log::debug!(
                        "ignoring trailing data after capabilities: {}",
                        rest[1..].escape_ascii()
                    );
                }
                Ok(body)
            }
            Err(_) => Err(CapabilitiesParseError::UnbalancedParentheses),
        },
        _ => Ok(trimmed),
    }
}

/// Iterator over the top level entries of a capability string.
pub struct ValueParser<'i> {
    input: Result<&'i [u8], Option<CapabilitiesParseError>>,
}

impl<'i> ValueParser<'i> {
    pub fn new(capability_string: &'i [u8]) -> Self {
        Self {
            input: body(capability_string).map_err(Some),
        }
    }
}

impl<'i> Iterator for ValueParser<'i> {
    type Item = Result<Value<'i>, CapabilitiesParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        let input = match &mut self.input {
            Ok(input) => input,
            Err(err) => return err.take().map(Err),
        };
        let remaining = multispace0::<_, Error<&[u8]>>(*input)
            .map(|(i, _)| i)
            .unwrap_or(*input);
        if remaining.is_empty() {
            return None;
        }
        match entry(remaining) {
            Ok((rest, value)) => {
                *input = rest;
                Some(Ok(value))
            }
            Err(err) => {
                let failed = match err {
                    Err::Error(e) | Err::Failure(e) => e,
                    Err::Incomplete(_) => Error::new(remaining, ErrorKind::Complete),
                };
                self.input = Err(None);
                Some(Err(match failed.code {
                    ErrorKind::Eof => CapabilitiesParseError::UnbalancedParentheses,
                    _ => CapabilitiesParseError::Malformed(failed.input.escape_ascii().to_string()),
                }))
            }
        }
    }
}
