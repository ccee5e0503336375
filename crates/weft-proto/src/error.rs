//! Error type for the wire codec.
//!
//! Codec faults are strongly typed so that callers can distinguish framing
//! damage (fatal for the frame) from per-payload-object decode failures
//! (surfaced alongside their siblings, never fatal). I/O lives a layer up;
//! the codec itself is pure over byte slices.

use thiserror::Error;

/// Errors produced while encoding or decoding wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The 27-byte frame header line is structurally invalid.
    #[error("malformed frame header line")]
    MalformedHeader,

    /// A body item line did not have the expected shape.
    #[error("malformed item line: {0}")]
    MalformedItem(String),

    /// A body item line began with an unrecognized verb.
    #[error("unknown item verb: {0:?}")]
    UnknownVerb(String),

    /// A decimal field could not be parsed.
    #[error("bad decimal field: {0:?}")]
    BadDecimal(String),

    /// The body ended before its declared content.
    #[error("frame body truncated")]
    Truncated,

    /// Bytes remained after the `end` terminator.
    #[error("{0} bytes left over after frame terminator")]
    TrailingBytes(usize),

    /// A frame command code was not four printable ASCII bytes.
    #[error("bad command code: {0:?}")]
    BadCommand(String),

    /// A dotted-quad type tag could not be parsed.
    #[error("bad dotted form: {0:?}")]
    BadDotForm(String),

    /// A text payload object held invalid UTF-8.
    #[error("payload object is not valid utf-8")]
    BadUtf8,

    /// A metadata tuple failed to encode or decode.
    #[error("bad metadata tuple: {0}")]
    BadMetadataTuple(String),

    /// A base64 header form failed to decode.
    #[error("bad base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A decoded key, signature, or hash had the wrong length.
    #[error("expected {expected} bytes, got {actual}")]
    BadByteLength {
        /// Required length in bytes.
        expected: usize,
        /// Length actually decoded.
        actual: usize,
    },
}
