//! WARC-style name-value fields.
//!
//! The container is a multimap where multiple values may be associated with
//! the same case-insensitive name. Parsing is strict: each line must match
//! `Name: Value\r\n` with a colon-space separator and no folding.

use std::fmt::Display;
use std::io::Write;

use nom::{
    bytes::complete::{tag, take_while, take_while1},
    combinator::all_consuming,
    error::VerboseError,
    multi::many0,
    sequence::{separated_pair, terminated},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, WarcError};

/// Returns whether the byte is a header token character.
pub(crate) fn is_token(c: u8) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

/// Multimap of name-value fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap {
    pairs: Vec<FieldPair>,
}

impl FieldMap {
    /// Creates an empty `FieldMap`.
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns whether the container has no fields.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator of all fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldPair> {
        self.pairs.iter()
    }

    /// Returns whether a field with the given name exists in the container.
    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the first field value for the given name.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();

        self.pairs
            .iter()
            .find(|pair| pair.name.normalized == name)
            .map(|pair| pair.value.as_str())
    }

    /// Returns all the field values for the given name.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        let name = name.to_ascii_lowercase();

        self.pairs
            .iter()
            .filter(move |pair| pair.name.normalized == name)
            .map(|pair| pair.value.as_str())
    }

    /// Add a field preserving any fields matching the given name.
    pub fn append<N, V>(&mut self, name: N, value: V)
    where
        N: Into<FieldName>,
        V: Into<String>,
    {
        self.pairs.push(FieldPair {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Remove any existing field with the given name and add the given field.
    pub fn insert<N, V>(&mut self, name: N, value: V)
    where
        N: Into<FieldName>,
        V: Into<String>,
    {
        let name = name.into();
        self.pairs
            .retain(|pair| pair.name.normalized != name.normalized);
        self.pairs.push(FieldPair {
            name,
            value: value.into(),
        });
    }
}

impl Display for FieldMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for pair in self.pairs.iter() {
            f.write_str(&pair.name.text)?;
            f.write_str(": ")?;
            f.write_str(&pair.value)?;
            f.write_str("\r\n")?;
        }

        Ok(())
    }
}

/// Represents a single name-value field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldPair {
    /// The name or key.
    pub name: FieldName,
    /// The value.
    pub value: String,
}

/// Represents the name portion of a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldName {
    normalized: String,

    /// Name in its original case.
    pub text: String,
}

impl FieldName {
    /// Returns the lowercase form used for comparisons.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

impl From<&str> for FieldName {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<String> for FieldName {
    fn from(value: String) -> Self {
        Self {
            normalized: value.to_ascii_lowercase(),
            text: value,
        }
    }
}

impl From<FieldName> for String {
    fn from(name: FieldName) -> Self {
        name.text
    }
}

impl Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

fn field_line<'a>(input: &'a [u8]) -> IResult<&'a [u8], FieldPair, VerboseError<&'a [u8]>> {
    let (remain, (name, value)) = terminated(
        separated_pair(
            take_while1(is_token),
            tag(b": ".as_slice()),
            take_while(|c: u8| c != b'\r' && c != b'\n'),
        ),
        tag(b"\r\n".as_slice()),
    )(input)?;

    Ok((
        remain,
        FieldPair {
            name: FieldName::from(String::from_utf8_lossy(name).into_owned()),
            value: String::from_utf8_lossy(value).into_owned(),
        },
    ))
}

/// Decode a header block (without the terminating blank line) into fields.
pub fn parse_fields(input: &[u8]) -> Result<FieldMap, ParseError> {
    match all_consuming(many0(field_line))(input) {
        Ok((_, pairs)) => Ok(FieldMap { pairs }),
        Err(error) => Err(ParseError::from_nom(input, &error)),
    }
}

/// Format fields to their wire form, validating names and values.
///
/// Returns the number of bytes written.
pub fn format_fields<W: Write>(fields: &FieldMap, mut dest: W) -> Result<usize, WarcError> {
    let mut num_bytes = 0;

    for pair in fields.iter() {
        let name = pair.name.text.as_bytes();
        let value = pair.value.as_bytes();

        if name.is_empty() || !name.iter().copied().all(is_token) {
            return Err(WarcError::UnencodableField {
                name: pair.name.text.clone(),
            });
        }

        if value.iter().any(|&c| c == b'\r' || c == b'\n') {
            return Err(WarcError::UnencodableField {
                name: pair.name.text.clone(),
            });
        }

        dest.write_all(name)?;
        dest.write_all(b": ")?;
        dest.write_all(value)?;
        dest.write_all(b"\r\n")?;
        num_bytes += name.len() + value.len() + 4;
    }

    Ok(num_bytes)
}
