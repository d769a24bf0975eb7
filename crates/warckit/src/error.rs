//! Errors related to this crate.

use std::fmt::Display;

use nom::error::{VerboseError, VerboseErrorKind};
use thiserror::Error;

/// Errors during parsing, formatting, or streaming of WARC files.
#[derive(Error, Debug)]
pub enum WarcError {
    /// Not structurally a WARC file: bad version line, malformed header
    /// line, missing or non-numeric `Content-Length`, or bad record trailer.
    #[error("invalid WARC data at offset {offset}")]
    InvalidWarc {
        /// Number of bytes read from the (uncompressed) input stream.
        offset: u64,
        /// Source of the error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A typed accessor was used on a record that does not carry the field.
    #[error("missing WARC header field '{name}'")]
    MissingWarcHeader {
        /// Name of the field.
        name: &'static str,
    },

    /// A typed accessor was used on a field with a syntactically invalid
    /// value. The raw string remains available through the field map.
    #[error("invalid value for WARC header field '{name}'")]
    WarcHeaderBadValue {
        /// Name of the field.
        name: &'static str,
        /// Source of the error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A stale record body was read after its reader advanced on a source
    /// that cannot seek back to the body.
    #[error("record body is stale and the source is not seekable")]
    NotSeekable,

    /// Body bytes exceed the declared record length, or body bytes were
    /// written while no record was open. The offending chunk is not written.
    #[error("record body overflow: {attempted} bytes written, {remaining} remaining")]
    CurrentBlockOverflow {
        /// Size of the rejected chunk.
        attempted: u64,
        /// Body bytes still owed to the open record.
        remaining: u64,
    },

    /// A new record was started while the previous body is unfinished.
    #[error("previous record body is not terminated: {remaining} bytes remaining")]
    PreviousBlockNotTerminated {
        /// Body bytes still owed to the open record.
        remaining: u64,
    },

    /// A caller-supplied header collides with a generated header or repeats
    /// a name within the reserved `WARC-*`/`Content-*` namespaces.
    #[error("duplicate header field '{name}'")]
    DuplicateHeader {
        /// Name of the field.
        name: String,
    },

    /// A field name or value contains bytes that cannot be emitted.
    #[error("field '{name}' cannot be encoded")]
    UnencodableField {
        /// Name of the field.
        name: String,
    },

    /// IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Error during parsing indicating malformed or invalid character sequences.
#[derive(Debug, Error)]
pub struct ParseError {
    offset: u64,
    fragment: Vec<u8>,
    message: String,
}

impl ParseError {
    /// Builds a `ParseError` out of a nom error, locating the offset of the
    /// failure and keeping a short fragment of the surrounding input.
    pub(crate) fn from_nom(input: &[u8], error: &nom::Err<VerboseError<&[u8]>>) -> Self {
        let (offset, message) = match error {
            nom::Err::Incomplete(_) => (input.len() as u64, "incomplete input".to_string()),
            nom::Err::Error(inner) | nom::Err::Failure(inner) => match inner.errors.first() {
                Some((remaining, kind)) => {
                    let offset = (input.len() - remaining.len()) as u64;
                    let message = match kind {
                        VerboseErrorKind::Context(context) => (*context).to_string(),
                        VerboseErrorKind::Char(c) => format!("expected '{}'", c),
                        VerboseErrorKind::Nom(kind) => kind.description().to_string(),
                    };

                    (offset, message)
                }
                None => (0, "malformed input".to_string()),
            },
        };

        let fragment_start = (offset as usize).saturating_sub(8);
        let fragment_end = input.len().min(offset as usize + 8);

        Self {
            offset,
            fragment: input[fragment_start..fragment_end].to_vec(),
            message,
        }
    }

    /// Offset where the final error occurred in the input.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{} at offset {}, near `{}`",
            self.message,
            self.offset,
            String::from_utf8_lossy(&self.fragment).escape_debug()
        ))
    }
}

impl WarcError {
    pub(crate) fn invalid(
        offset: u64,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        WarcError::InvalidWarc {
            offset,
            source: Some(source.into()),
        }
    }
}
