//! Record headers and typed field access.
//!
//! Header fields are kept as a raw multimap which always survives a
//! syntactically well-framed parse. The typed accessors validate on demand:
//! an absent field surfaces as [`WarcError::MissingWarcHeader`] and a
//! malformed value as [`WarcError::WarcHeaderBadValue`], so damaged archives
//! can still be inspected through the raw fields.

use chrono::{DateTime, SecondsFormat, Utc};
use nom::{
    bytes::complete::tag,
    character::complete::digit1,
    combinator::{all_consuming, recognize},
    sequence::{terminated, tuple},
};

use crate::error::{ParseError, WarcError};
use crate::fields::FieldMap;
use crate::uuid as uuidutil;

/// Well-known field names.
pub mod names {
    /// Record type field.
    pub const WARC_TYPE: &str = "WARC-Type";
    /// Record creation date field.
    pub const WARC_DATE: &str = "WARC-Date";
    /// Record identifier field.
    pub const WARC_RECORD_ID: &str = "WARC-Record-ID";
    /// Identifier of the segment's warcinfo record.
    pub const WARC_WARCINFO_ID: &str = "WARC-Warcinfo-ID";
    /// Body length field.
    pub const CONTENT_LENGTH: &str = "Content-Length";
    /// Body media type field.
    pub const CONTENT_TYPE: &str = "Content-Type";
}

/// WARC record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// Archive segment metadata record.
    Warcinfo,
    /// Full protocol response.
    Response,
    /// Resource without protocol framing.
    Resource,
    /// Full protocol request.
    Request,
    /// Metadata about another record.
    Metadata,
    /// Revisit of previously archived content.
    Revisit,
    /// Converted rendition of another record.
    Conversion,
    /// Continuation of a segmented record.
    Continuation,
    /// A type token not defined by the format.
    Unknown,
}

impl RecordType {
    /// Returns the field value for the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Warcinfo => "warcinfo",
            RecordType::Response => "response",
            RecordType::Resource => "resource",
            RecordType::Request => "request",
            RecordType::Metadata => "metadata",
            RecordType::Revisit => "revisit",
            RecordType::Conversion => "conversion",
            RecordType::Continuation => "continuation",
            RecordType::Unknown => "unknown",
        }
    }
}

impl From<&str> for RecordType {
    fn from(value: &str) -> Self {
        match value {
            "warcinfo" => RecordType::Warcinfo,
            "response" => RecordType::Response,
            "resource" => RecordType::Resource,
            "request" => RecordType::Request,
            "metadata" => RecordType::Metadata,
            "revisit" => RecordType::Revisit,
            "conversion" => RecordType::Conversion,
            "continuation" => RecordType::Continuation,
            _ => RecordType::Unknown,
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed record header.
#[derive(Debug, Clone)]
pub struct RecordHeader {
    version: String,
    fields: FieldMap,
    content_length: u64,
    offset: u64,
}

impl RecordHeader {
    pub(crate) fn new(version: String, fields: FieldMap, content_length: u64, offset: u64) -> Self {
        Self {
            version,
            fields,
            content_length,
            offset,
        }
    }

    /// Returns the WARC record version, such as `WARC/1.1`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the position of the record in the raw input stream.
    ///
    /// For compressed input this is the offset of the record's gzip member.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the parsed name-value fields.
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Returns the length of the body of the record.
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Returns the record type.
    pub fn record_type(&self) -> Result<RecordType, WarcError> {
        let value = self.get_required(names::WARC_TYPE)?;

        Ok(RecordType::from(value))
    }

    /// Returns the record ID parsed from its `urn:uuid` form.
    pub fn record_id(&self) -> Result<uuid::Uuid, WarcError> {
        let value = self.get_required(names::WARC_RECORD_ID)?;

        uuidutil::parse_urn(value).map_err(|error| WarcError::WarcHeaderBadValue {
            name: names::WARC_RECORD_ID,
            source: Some(Box::new(error)),
        })
    }

    /// Returns the record date.
    pub fn date(&self) -> Result<DateTime<Utc>, WarcError> {
        let value = self.get_required(names::WARC_DATE)?;

        DateTime::parse_from_rfc3339(value)
            .map(|date| date.with_timezone(&Utc))
            .map_err(|error| WarcError::WarcHeaderBadValue {
                name: names::WARC_DATE,
                source: Some(Box::new(error)),
            })
    }

    /// Returns the ID of the segment's warcinfo record, if present.
    pub fn warcinfo_id(&self) -> Result<Option<uuid::Uuid>, WarcError> {
        match self.fields.get(names::WARC_WARCINFO_ID) {
            Some(value) => uuidutil::parse_urn(value).map(Some).map_err(|error| {
                WarcError::WarcHeaderBadValue {
                    name: names::WARC_WARCINFO_ID,
                    source: Some(Box::new(error)),
                }
            }),
            None => Ok(None),
        }
    }

    /// Returns the body media type, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.fields.get(names::CONTENT_TYPE)
    }

    fn get_required(&self, name: &'static str) -> Result<&str, WarcError> {
        self.fields
            .get(name)
            .ok_or(WarcError::MissingWarcHeader { name })
    }
}

/// Parse a version line such as `WARC/1.1\r\n` including its terminator.
pub(crate) fn parse_version(line: &[u8]) -> Result<String, ParseError> {
    let result = all_consuming(terminated(
        recognize(tuple((
            tag(b"WARC/".as_slice()),
            digit1,
            tag(b".".as_slice()),
            digit1,
        ))),
        tag(b"\r\n".as_slice()),
    ))(line);

    match result {
        Ok((_, version)) => Ok(String::from_utf8_lossy(version).into_owned()),
        Err(error) => Err(ParseError::from_nom(line, &error)),
    }
}

/// Format a date in the UTC form used by `WARC-Date`.
pub(crate) fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}
